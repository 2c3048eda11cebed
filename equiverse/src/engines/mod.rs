//! The reference equivalence engines.
//!
//! Four engines with different proof strategies and guarantees:
//!
//! | Engine | Complete | Sound | Strength |
//! |--------|----------|-------|----------|
//! | [`ConstructionChecker`] | yes | yes | settles any verdict, slowest |
//! | [`AlternatingChecker`] | yes | yes | fast when circuits are close |
//! | [`SimulationChecker`] | no | up to fidelity threshold | finds counter-examples quickly |
//! | [`ZxChecker`] | no | for its equivalence claims | fast structural reductions |
//!
//! All engines implement the [`crate::task::EngineTask`] contract and can be
//! moved into isolated workers.

pub mod alternating;
pub mod construction;
pub mod scheme;
pub mod simulation;
pub mod zx;

pub use alternating::AlternatingChecker;
pub use construction::ConstructionChecker;
pub use simulation::SimulationChecker;
pub use zx::ZxChecker;

use gatewise::{completed_pairs, Circuit, Operation, Qubit, StateVector};
use num_complex::Complex64;

use crate::error::EngineError;

/// Rewrite a circuit's unitary operations onto logical wire labels by pulling
/// the initial layout through each gate. Fails on non-unitary remnants.
pub(crate) fn relabeled_unitary_ops(circ: &Circuit) -> Result<Vec<Operation>, EngineError> {
    let pairs = completed_pairs(&circ.initial_layout, circ.num_qubits());
    let mut ops = Vec::with_capacity(circ.num_ops());
    for op in &circ.ops {
        if !op.is_unitary() {
            return Err(EngineError::InvalidArgument(format!(
                "circuit still contains a non-unitary operation: {op}"
            )));
        }
        let mut relabeled = op.clone();
        relabeled.remap_qubits(|w| pairs[w].1);
        ops.push(relabeled);
    }
    Ok(ops)
}

/// The net logical permutation a circuit's layouts impose: logical `l` at
/// entry ends up as logical `sigma(l)` at exit.
pub(crate) fn net_permutation(circ: &Circuit) -> Vec<Qubit> {
    let n = circ.num_qubits();
    let layout = completed_pairs(&circ.initial_layout, n);
    let output = completed_pairs(&circ.output_permutation, n);
    let mut sigma = vec![0; n];
    for &(p, l) in &layout {
        sigma[l] = output[p].1;
    }
    sigma
}

/// Union of the ancillary logical qubits of both circuits, as a bit mask.
pub(crate) fn ancillary_mask(qc1: &Circuit, qc2: &Circuit) -> usize {
    let mut mask = 0usize;
    for q in 0..qc1.num_qubits() {
        if qc1.is_ancillary(q) {
            mask |= 1 << q;
        }
    }
    for q in 0..qc2.num_qubits() {
        if qc2.is_ancillary(q) {
            mask |= 1 << q;
        }
    }
    mask
}

/// Logical qubits that are garbage in neither circuit.
pub(crate) fn non_garbage_qubits(qc1: &Circuit, qc2: &Circuit) -> Vec<Qubit> {
    (0..qc1.num_qubits())
        .filter(|&q| !qc1.is_garbage(q) && !qc2.is_garbage(q))
        .collect()
}

/// Reduced density matrix over `keep` (row-major, dimension `2^keep.len()`),
/// tracing out all other qubits.
pub(crate) fn reduced_density(state: &StateVector, keep: &[Qubit]) -> Vec<Complex64> {
    let n = state.num_qubits();
    let dropped: Vec<Qubit> = (0..n).filter(|q| !keep.contains(q)).collect();
    let kdim = 1usize << keep.len();
    let gdim = 1usize << dropped.len();

    let index_of = |kept_bits: usize, dropped_bits: usize| {
        let mut idx = 0usize;
        for (pos, &q) in keep.iter().enumerate() {
            if kept_bits & (1 << pos) != 0 {
                idx |= 1 << q;
            }
        }
        for (pos, &q) in dropped.iter().enumerate() {
            if dropped_bits & (1 << pos) != 0 {
                idx |= 1 << q;
            }
        }
        idx
    };

    let mut rho = vec![Complex64::new(0.0, 0.0); kdim * kdim];
    for a in 0..kdim {
        for b in 0..kdim {
            let mut sum = Complex64::new(0.0, 0.0);
            for g in 0..gdim {
                sum += state.amps[index_of(a, g)] * state.amps[index_of(b, g)].conj();
            }
            rho[a * kdim + b] = sum;
        }
    }
    rho
}

/// Whether two states agree on the `keep` subsystem within `tol`.
pub(crate) fn states_equal_reduced(
    s1: &StateVector,
    s2: &StateVector,
    keep: &[Qubit],
    tol: f64,
) -> bool {
    let rho1 = reduced_density(s1, keep);
    let rho2 = reduced_density(s2, keep);
    rho1.iter()
        .zip(rho2.iter())
        .all(|(a, b)| (a - b).norm() <= tol)
}

/// Run a circuit on a logical-basis input state: map to wires through the
/// initial layout, apply the operations, and map back through the output
/// permutation.
pub(crate) fn run_on_state(
    circ: &Circuit,
    input: &StateVector,
) -> Result<StateVector, EngineError> {
    let n = circ.num_qubits();
    let layout = completed_pairs(&circ.initial_layout, n);
    let output = completed_pairs(&circ.output_permutation, n);

    let mut state = input.clone();
    // logical bit l moves to the wire carrying it
    let mut to_wire = vec![0; n];
    for &(p, l) in &layout {
        to_wire[l] = p;
    }
    state.permute_qubits(|l| to_wire[l]);

    for op in &circ.ops {
        if !op.is_unitary() {
            return Err(EngineError::InvalidArgument(format!(
                "circuit still contains a non-unitary operation: {op}"
            )));
        }
        state.apply(op)?;
    }

    let mut to_logical = vec![0; n];
    for &(p, l) in &output {
        to_logical[p] = l;
    }
    state.permute_qubits(|p| to_logical[p]);
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatewise::Permutation;

    #[test]
    fn net_permutation_composes_layouts() {
        let mut circ = Circuit::new(2);
        circ.output_permutation = [(0, 1), (1, 0)].into_iter().collect::<Permutation>();
        assert_eq!(net_permutation(&circ), vec![1, 0]);
    }

    #[test]
    fn run_on_state_respects_output_permutation() {
        let mut circ = Circuit::new(2);
        circ.x(0);
        circ.output_permutation = [(0, 1), (1, 0)].into_iter().collect::<Permutation>();
        let input = StateVector::zero_state(2);
        let output = run_on_state(&circ, &input).unwrap();
        // x hit wire 0, which is declared logical 1 at exit
        let expected = StateVector::basis_state(2, &[false, true]);
        assert!((output.fidelity(&expected) - 1.0).abs() < 1e-10);
    }

    #[test]
    fn reduced_density_of_product_state_is_pure() {
        let mut state = StateVector::zero_state(2);
        state
            .apply(&Operation::unitary(gatewise::Gate::H, [0]))
            .unwrap();
        let rho = reduced_density(&state, &[0]);
        // |+⟩⟨+| on the kept qubit
        for entry in &rho {
            assert!((entry.re - 0.5).abs() < 1e-10);
            assert!(entry.im.abs() < 1e-10);
        }
    }

    #[test]
    fn reduced_density_ignores_garbage_difference() {
        // states differing only by X on the dropped qubit
        let s1 = StateVector::basis_state(2, &[false, false]);
        let s2 = StateVector::basis_state(2, &[false, true]);
        assert!(states_equal_reduced(&s1, &s2, &[0], 1e-10));
        assert!(!states_equal_reduced(&s1, &s2, &[1], 1e-10));
    }
}
