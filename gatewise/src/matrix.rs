//! Dense state-vector and unitary math for small circuits.
//!
//! The equivalence engines operate on exact complex amplitudes. All
//! comparisons go through the process-wide numeric tolerance, which the
//! manager sets once from its configuration.

use std::f64::consts::FRAC_1_SQRT_2;
use std::sync::atomic::{AtomicU64, Ordering};

use num_complex::Complex64;

use crate::circuit::{CircuitError, Permutation};
use crate::gate::{Gate, Operation, Qubit};

const DEFAULT_TOLERANCE: f64 = 1e-13;

static TOLERANCE_BITS: AtomicU64 = AtomicU64::new(0);

/// Set the process-wide numeric tolerance used by amplitude comparisons.
pub fn set_tolerance(tolerance: f64) {
    TOLERANCE_BITS.store(tolerance.to_bits(), Ordering::Relaxed);
}

/// The current process-wide numeric tolerance.
#[must_use]
pub fn tolerance() -> f64 {
    let bits = TOLERANCE_BITS.load(Ordering::Relaxed);
    if bits == 0 {
        DEFAULT_TOLERANCE
    } else {
        f64::from_bits(bits)
    }
}

/// Single-qubit basis states used for random stimuli.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Basis1Q {
    Zero,
    One,
    Plus,
    Minus,
    Right,
    Left,
}

impl Basis1Q {
    #[must_use]
    pub fn amplitudes(self) -> [Complex64; 2] {
        let h = Complex64::new(FRAC_1_SQRT_2, 0.0);
        match self {
            Basis1Q::Zero => [Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0)],
            Basis1Q::One => [Complex64::new(0.0, 0.0), Complex64::new(1.0, 0.0)],
            Basis1Q::Plus => [h, h],
            Basis1Q::Minus => [h, -h],
            Basis1Q::Right => [h, Complex64::new(0.0, FRAC_1_SQRT_2)],
            Basis1Q::Left => [h, Complex64::new(0.0, -FRAC_1_SQRT_2)],
        }
    }
}

/// 2×2 matrix of a single-target gate, row-major.
fn gate_matrix2(gate: &Gate) -> Result<[[Complex64; 2]; 2], CircuitError> {
    let c = |re: f64, im: f64| Complex64::new(re, im);
    let angle = |a: &crate::gate::Angle| {
        a.value()
            .ok_or_else(|| CircuitError::NonUnitary(format!("symbolic gate {gate}")))
    };
    Ok(match gate {
        Gate::X => [[c(0.0, 0.0), c(1.0, 0.0)], [c(1.0, 0.0), c(0.0, 0.0)]],
        Gate::Y => [[c(0.0, 0.0), c(0.0, -1.0)], [c(0.0, 1.0), c(0.0, 0.0)]],
        Gate::Z => [[c(1.0, 0.0), c(0.0, 0.0)], [c(0.0, 0.0), c(-1.0, 0.0)]],
        Gate::H => [
            [c(FRAC_1_SQRT_2, 0.0), c(FRAC_1_SQRT_2, 0.0)],
            [c(FRAC_1_SQRT_2, 0.0), c(-FRAC_1_SQRT_2, 0.0)],
        ],
        Gate::S => [[c(1.0, 0.0), c(0.0, 0.0)], [c(0.0, 0.0), c(0.0, 1.0)]],
        Gate::Sdg => [[c(1.0, 0.0), c(0.0, 0.0)], [c(0.0, 0.0), c(0.0, -1.0)]],
        Gate::T => [
            [c(1.0, 0.0), c(0.0, 0.0)],
            [c(0.0, 0.0), Complex64::from_polar(1.0, std::f64::consts::FRAC_PI_4)],
        ],
        Gate::Tdg => [
            [c(1.0, 0.0), c(0.0, 0.0)],
            [c(0.0, 0.0), Complex64::from_polar(1.0, -std::f64::consts::FRAC_PI_4)],
        ],
        Gate::Sx => [
            [c(0.5, 0.5), c(0.5, -0.5)],
            [c(0.5, -0.5), c(0.5, 0.5)],
        ],
        Gate::Sxdg => [
            [c(0.5, -0.5), c(0.5, 0.5)],
            [c(0.5, 0.5), c(0.5, -0.5)],
        ],
        Gate::Rx(a) => {
            let half = angle(a)? / 2.0;
            [
                [c(half.cos(), 0.0), c(0.0, -half.sin())],
                [c(0.0, -half.sin()), c(half.cos(), 0.0)],
            ]
        }
        Gate::Ry(a) => {
            let half = angle(a)? / 2.0;
            [
                [c(half.cos(), 0.0), c(-half.sin(), 0.0)],
                [c(half.sin(), 0.0), c(half.cos(), 0.0)],
            ]
        }
        Gate::Rz(a) => {
            let half = angle(a)? / 2.0;
            [
                [Complex64::from_polar(1.0, -half), c(0.0, 0.0)],
                [c(0.0, 0.0), Complex64::from_polar(1.0, half)],
            ]
        }
        Gate::Phase(a) => [
            [c(1.0, 0.0), c(0.0, 0.0)],
            [c(0.0, 0.0), Complex64::from_polar(1.0, angle(a)?)],
        ],
        Gate::GPhase(_) | Gate::Swap => {
            return Err(CircuitError::NonUnitary(format!(
                "gate {gate} has no single-qubit matrix"
            )))
        }
    })
}

fn control_mask(controls: &[Qubit]) -> u64 {
    controls.iter().fold(0u64, |mask, &q| mask | (1u64 << q))
}

/// Mutate `amps` in place by the operation, treated as acting on wire indices.
fn apply_to_amplitudes(
    amps: &mut [Complex64],
    op: &Operation,
    inverse: bool,
) -> Result<(), CircuitError> {
    let Operation::Unitary {
        gate,
        controls,
        targets,
    } = op
    else {
        return Err(CircuitError::NonUnitary(format!(
            "cannot apply non-unitary operation: {op}"
        )));
    };
    let gate = if inverse { gate.inverse() } else { gate.clone() };
    let cmask = control_mask(controls);

    match gate {
        Gate::GPhase(ref a) => {
            let theta = a
                .value()
                .ok_or_else(|| CircuitError::NonUnitary("symbolic gphase".into()))?;
            let phase = Complex64::from_polar(1.0, theta);
            for (idx, amp) in amps.iter_mut().enumerate() {
                if (idx as u64) & cmask == cmask {
                    *amp *= phase;
                }
            }
        }
        Gate::Swap => {
            let (a, b) = (targets[0], targets[1]);
            let (abit, bbit) = (1u64 << a, 1u64 << b);
            for idx in 0..amps.len() as u64 {
                if idx & cmask == cmask && idx & abit != 0 && idx & bbit == 0 {
                    let partner = (idx & !abit) | bbit;
                    amps.swap(idx as usize, partner as usize);
                }
            }
        }
        ref g => {
            let m = gate_matrix2(g)?;
            let t = targets[0];
            let tbit = 1u64 << t;
            for idx in 0..amps.len() as u64 {
                if idx & tbit == 0 && idx & cmask == cmask {
                    let lo = idx as usize;
                    let hi = (idx | tbit) as usize;
                    let (a0, a1) = (amps[lo], amps[hi]);
                    amps[lo] = m[0][0] * a0 + m[0][1] * a1;
                    amps[hi] = m[1][0] * a0 + m[1][1] * a1;
                }
            }
        }
    }
    Ok(())
}

/// A dense state vector over `num_qubits` wires.
#[derive(Clone, Debug, PartialEq)]
#[must_use]
pub struct StateVector {
    num_qubits: usize,
    pub amps: Vec<Complex64>,
}

impl StateVector {
    pub fn zero_state(num_qubits: usize) -> StateVector {
        let mut amps = vec![Complex64::new(0.0, 0.0); 1 << num_qubits];
        amps[0] = Complex64::new(1.0, 0.0);
        StateVector { num_qubits, amps }
    }

    /// Computational basis state with the given bit per qubit.
    pub fn basis_state(num_qubits: usize, bits: &[bool]) -> StateVector {
        let index = bits
            .iter()
            .enumerate()
            .fold(0usize, |idx, (q, &b)| if b { idx | (1 << q) } else { idx });
        let mut amps = vec![Complex64::new(0.0, 0.0); 1 << num_qubits];
        amps[index] = Complex64::new(1.0, 0.0);
        StateVector { num_qubits, amps }
    }

    /// Build a state directly from raw amplitudes.
    ///
    /// # Panics
    ///
    /// Debug-asserts that `amps` has length `2^num_qubits`.
    pub fn from_amplitudes(num_qubits: usize, amps: Vec<Complex64>) -> StateVector {
        debug_assert_eq!(amps.len(), 1 << num_qubits);
        StateVector { num_qubits, amps }
    }

    /// Tensor product of single-qubit basis states, qubit 0 least significant.
    pub fn product_state(states: &[Basis1Q]) -> StateVector {
        let num_qubits = states.len();
        let mut amps = vec![Complex64::new(1.0, 0.0)];
        for state in states {
            let [a0, a1] = state.amplitudes();
            let mut next = vec![Complex64::new(0.0, 0.0); amps.len() * 2];
            for (idx, amp) in amps.iter().enumerate() {
                next[idx] = amp * a0;
                next[idx + amps.len()] = amp * a1;
            }
            amps = next;
        }
        StateVector { num_qubits, amps }
    }

    #[must_use]
    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    pub fn apply(&mut self, op: &Operation) -> Result<(), CircuitError> {
        apply_to_amplitudes(&mut self.amps, op, false)
    }

    pub fn apply_inverse(&mut self, op: &Operation) -> Result<(), CircuitError> {
        apply_to_amplitudes(&mut self.amps, op, true)
    }

    /// Relabel wires: the amplitude of index `i` moves to the index whose bit
    /// `map(p)` equals bit `p` of `i`.
    pub fn permute_qubits(&mut self, map: impl Fn(Qubit) -> Qubit) {
        let mut next = vec![Complex64::new(0.0, 0.0); self.amps.len()];
        for (idx, amp) in self.amps.iter().enumerate() {
            let mut target = 0usize;
            for p in 0..self.num_qubits {
                if idx & (1 << p) != 0 {
                    target |= 1 << map(p);
                }
            }
            next[target] = *amp;
        }
        self.amps = next;
    }

    /// ⟨self|other⟩.
    #[must_use]
    pub fn inner(&self, other: &StateVector) -> Complex64 {
        self.amps
            .iter()
            .zip(other.amps.iter())
            .map(|(a, b)| a.conj() * b)
            .sum()
    }

    /// |⟨self|other⟩|².
    #[must_use]
    pub fn fidelity(&self, other: &StateVector) -> f64 {
        self.inner(other).norm_sqr()
    }

    /// Probability distribution over the kept qubits, marginalizing the rest.
    #[must_use]
    pub fn marginal_probabilities(&self, keep: &[Qubit]) -> Vec<f64> {
        let mut probs = vec![0.0; 1 << keep.len()];
        for (idx, amp) in self.amps.iter().enumerate() {
            let mut key = 0usize;
            for (pos, &q) in keep.iter().enumerate() {
                if idx & (1 << q) != 0 {
                    key |= 1 << pos;
                }
            }
            probs[key] += amp.norm_sqr();
        }
        probs
    }
}

/// A dense unitary over `num_qubits` wires, row-major.
#[derive(Clone, Debug, PartialEq)]
#[must_use]
pub struct Unitary {
    num_qubits: usize,
    dim: usize,
    data: Vec<Complex64>,
}

impl Unitary {
    pub fn identity(num_qubits: usize) -> Unitary {
        let dim = 1 << num_qubits;
        let mut data = vec![Complex64::new(0.0, 0.0); dim * dim];
        for i in 0..dim {
            data[i * dim + i] = Complex64::new(1.0, 0.0);
        }
        Unitary {
            num_qubits,
            dim,
            data,
        }
    }

    #[must_use]
    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    #[must_use]
    pub fn dim(&self) -> usize {
        self.dim
    }

    #[must_use]
    pub fn at(&self, row: usize, col: usize) -> Complex64 {
        self.data[row * self.dim + col]
    }

    /// Left-apply a gate: `U ← G · U`.
    pub fn apply_left(&mut self, op: &Operation) -> Result<(), CircuitError> {
        let dim = self.dim;
        // transform each column as a state vector
        let mut column = vec![Complex64::new(0.0, 0.0); dim];
        for col in 0..dim {
            for row in 0..dim {
                column[row] = self.data[row * dim + col];
            }
            apply_to_amplitudes(&mut column, op, false)?;
            for row in 0..dim {
                self.data[row * dim + col] = column[row];
            }
        }
        Ok(())
    }

    /// Right-apply the inverse of a gate: `U ← U · G⁻¹`.
    ///
    /// Right-multiplying by G⁻¹ = G† transforms each row like the conjugated
    /// gate transforms a state: (U·G†)[r,:] = (G·U[r,:]†)†.
    pub fn apply_right_inverse(&mut self, op: &Operation) -> Result<(), CircuitError> {
        let dim = self.dim;
        let mut row_vec = vec![Complex64::new(0.0, 0.0); dim];
        for row in 0..dim {
            for col in 0..dim {
                row_vec[col] = self.data[row * dim + col].conj();
            }
            apply_to_amplitudes(&mut row_vec, op, false)?;
            for col in 0..dim {
                self.data[row * dim + col] = row_vec[col].conj();
            }
        }
        Ok(())
    }

    /// Permute the input (column) index space: column `x` of the result is
    /// column `map(x)` of the original, where `map` permutes basis indices.
    fn permute_columns(&mut self, map: impl Fn(usize) -> usize) {
        let dim = self.dim;
        let mut next = vec![Complex64::new(0.0, 0.0); dim * dim];
        for row in 0..dim {
            for col in 0..dim {
                next[row * dim + col] = self.data[row * dim + map(col)];
            }
        }
        self.data = next;
    }

    /// Permute the output (row) index space: row `map(w)` of the result is
    /// row `w` of the original.
    fn permute_rows(&mut self, map: impl Fn(usize) -> usize) {
        let dim = self.dim;
        let mut next = vec![Complex64::new(0.0, 0.0); dim * dim];
        for row in 0..dim {
            let target = map(row);
            for col in 0..dim {
                next[target * dim + col] = self.data[row * dim + col];
            }
        }
        self.data = next;
    }

    /// Compose the initial layout into the unitary: `U ← U · P_in`, where
    /// `P_in` maps a logical basis state to the wire basis state with wire
    /// `p` carrying logical `layout(p)`.
    pub fn apply_initial_layout(&mut self, layout: &Permutation) {
        let n = self.num_qubits;
        let pairs: Vec<(Qubit, Qubit)> = completed_pairs(layout, n);
        self.permute_columns(|logical_idx| {
            let mut wire_idx = 0usize;
            for &(p, l) in &pairs {
                if logical_idx & (1 << l) != 0 {
                    wire_idx |= 1 << p;
                }
            }
            wire_idx
        });
    }

    /// Compose the output permutation into the unitary: `U ← P_out · U`,
    /// mapping wire `p` to logical `perm(p)` at exit.
    pub fn apply_output_permutation(&mut self, perm: &Permutation) {
        let n = self.num_qubits;
        let pairs: Vec<(Qubit, Qubit)> = completed_pairs(perm, n);
        self.permute_rows(|wire_idx| {
            let mut logical_idx = 0usize;
            for &(p, l) in &pairs {
                if wire_idx & (1 << p) != 0 {
                    logical_idx |= 1 << l;
                }
            }
            logical_idx
        });
    }

    /// Normalized Frobenius distance from the identity.
    #[must_use]
    pub fn distance_from_identity(&self) -> f64 {
        let dim = self.dim;
        let mut sum = 0.0;
        for row in 0..dim {
            for col in 0..dim {
                let expected = if row == col {
                    Complex64::new(1.0, 0.0)
                } else {
                    Complex64::new(0.0, 0.0)
                };
                sum += (self.data[row * dim + col] - expected).norm_sqr();
            }
        }
        (sum / dim as f64).sqrt()
    }

    /// If the unitary equals `e^{iφ}·I` within `tol`, the phase `e^{iφ}`.
    #[must_use]
    pub fn phase_if_identity(&self, tol: f64) -> Option<Complex64> {
        let dim = self.dim;
        let phase = self.data[0];
        if (phase.norm() - 1.0).abs() > tol {
            return None;
        }
        for row in 0..dim {
            for col in 0..dim {
                let entry = self.data[row * dim + col];
                let expected = if row == col { phase } else { Complex64::new(0.0, 0.0) };
                if (entry - expected).norm() > tol {
                    return None;
                }
            }
        }
        Some(phase)
    }

    /// Extract column `col` as a state vector.
    #[must_use]
    pub fn column(&self, col: usize) -> StateVector {
        let amps = (0..self.dim).map(|row| self.at(row, col)).collect();
        StateVector {
            num_qubits: self.num_qubits,
            amps,
        }
    }
}

/// Complete a possibly partial physical→logical map over `n` wires: missing
/// wires are assigned the unused logical indices in increasing order.
#[must_use]
pub fn completed_pairs(perm: &Permutation, n: usize) -> Vec<(Qubit, Qubit)> {
    let mut used_logical = vec![false; n];
    let mut assigned = vec![None; n];
    for (p, l) in perm.iter() {
        if p < n && l < n {
            assigned[p] = Some(l);
            used_logical[l] = true;
        }
    }
    let mut free = (0..n).filter(|&l| !used_logical[l]);
    (0..n)
        .map(|p| {
            let l = assigned[p].unwrap_or_else(|| free.next().unwrap_or(p));
            (p, l)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::Circuit;

    fn close(a: Complex64, b: Complex64) -> bool {
        (a - b).norm() < 1e-10
    }

    #[test]
    fn hadamard_creates_superposition() {
        let mut state = StateVector::zero_state(1);
        state.apply(&Operation::unitary(Gate::H, [0])).unwrap();
        assert!(close(state.amps[0], Complex64::new(FRAC_1_SQRT_2, 0.0)));
        assert!(close(state.amps[1], Complex64::new(FRAC_1_SQRT_2, 0.0)));
    }

    #[test]
    fn bell_state_amplitudes() {
        let mut state = StateVector::zero_state(2);
        state.apply(&Operation::unitary(Gate::H, [0])).unwrap();
        state
            .apply(&Operation::controlled(Gate::X, [0], [1]))
            .unwrap();
        assert!(close(state.amps[0], Complex64::new(FRAC_1_SQRT_2, 0.0)));
        assert!(close(state.amps[3], Complex64::new(FRAC_1_SQRT_2, 0.0)));
        assert!(close(state.amps[1], Complex64::new(0.0, 0.0)));
        assert!(close(state.amps[2], Complex64::new(0.0, 0.0)));
    }

    #[test]
    fn apply_then_inverse_is_identity() {
        let ops = [
            Operation::unitary(Gate::H, [0]),
            Operation::unitary(Gate::T, [1]),
            Operation::controlled(Gate::X, [0], [1]),
            Operation::unitary(Gate::Rz(crate::gate::Angle::Fixed(0.7)), [0]),
            Operation::unitary(Gate::Swap, [0, 1]),
        ];
        let mut state = StateVector::zero_state(2);
        state.apply(&Operation::unitary(Gate::H, [0])).unwrap();
        let reference = state.clone();
        for op in &ops {
            state.apply(op).unwrap();
        }
        for op in ops.iter().rev() {
            state.apply_inverse(op).unwrap();
        }
        assert!((state.fidelity(&reference) - 1.0).abs() < 1e-10);
    }

    #[test]
    fn swap_exchanges_amplitudes() {
        let mut state = StateVector::basis_state(2, &[true, false]);
        state.apply(&Operation::unitary(Gate::Swap, [0, 1])).unwrap();
        assert!(close(state.amps[2], Complex64::new(1.0, 0.0)));
    }

    #[test]
    fn product_state_matches_basis_state() {
        let product = StateVector::product_state(&[Basis1Q::One, Basis1Q::Zero]);
        let basis = StateVector::basis_state(2, &[true, false]);
        assert!((product.fidelity(&basis) - 1.0).abs() < 1e-10);
    }

    #[test]
    fn unitary_left_application_matches_state() {
        let mut u = Unitary::identity(2);
        u.apply_left(&Operation::unitary(Gate::H, [0])).unwrap();
        u.apply_left(&Operation::controlled(Gate::X, [0], [1]))
            .unwrap();
        let from_unitary = u.column(0);

        let mut state = StateVector::zero_state(2);
        state.apply(&Operation::unitary(Gate::H, [0])).unwrap();
        state
            .apply(&Operation::controlled(Gate::X, [0], [1]))
            .unwrap();
        assert!((from_unitary.fidelity(&state) - 1.0).abs() < 1e-10);
    }

    #[test]
    fn left_then_right_inverse_returns_to_identity() {
        let ops = [
            Operation::unitary(Gate::H, [0]),
            Operation::controlled(Gate::X, [0], [1]),
            Operation::unitary(Gate::T, [1]),
        ];
        let mut u = Unitary::identity(2);
        for op in &ops {
            u.apply_left(op).unwrap();
        }
        // right-multiplying by the ops' inverses in circuit order yields
        // U · U† = I
        for op in &ops {
            u.apply_right_inverse(op).unwrap();
        }
        let phase = u.phase_if_identity(1e-10).expect("identity expected");
        assert!(close(phase, Complex64::new(1.0, 0.0)));
    }

    #[test]
    fn global_phase_detected() {
        let mut u = Unitary::identity(1);
        u.apply_left(&Operation::unitary(
            Gate::GPhase(crate::gate::Angle::Fixed(0.3)),
            [],
        ))
        .unwrap();
        let phase = u.phase_if_identity(1e-10).expect("phased identity");
        assert!((phase.arg() - 0.3).abs() < 1e-10);
        assert!(u.distance_from_identity() > 1e-3);
    }

    #[test]
    fn marginals_ignore_dropped_qubits() {
        let mut state = StateVector::zero_state(2);
        state.apply(&Operation::unitary(Gate::H, [0])).unwrap();
        state.apply(&Operation::unitary(Gate::X, [1])).unwrap();
        let probs = state.marginal_probabilities(&[0]);
        assert!((probs[0] - 0.5).abs() < 1e-10);
        assert!((probs[1] - 0.5).abs() < 1e-10);
    }

    #[test]
    fn layout_composition_reorders_columns() {
        // swap-as-layout: wire 0 carries logical 1 and vice versa
        let mut circ = Circuit::new(2);
        circ.x(0);
        let mut u = Unitary::identity(2);
        for op in &circ.ops {
            u.apply_left(op).unwrap();
        }
        let layout: Permutation = [(0, 1), (1, 0)].into_iter().collect();
        u.apply_initial_layout(&layout);
        u.apply_output_permutation(&layout);
        // with both maps swapped, X on wire 0 acts on logical 1
        let state = u.column(0);
        let expected = StateVector::basis_state(2, &[false, true]);
        assert!((state.fidelity(&expected) - 1.0).abs() < 1e-10);
    }

    #[test]
    fn completed_pairs_fills_missing_wires() {
        let partial: Permutation = [(1, 0)].into_iter().collect();
        let pairs = completed_pairs(&partial, 3);
        assert_eq!(pairs, vec![(0, 1), (1, 0), (2, 2)]);
    }

    #[test]
    fn tolerance_defaults_and_overrides() {
        assert!(tolerance() > 0.0);
        set_tolerance(1e-9);
        assert!((tolerance() - 1e-9).abs() < 1e-20);
        set_tolerance(DEFAULT_TOLERANCE);
    }
}
