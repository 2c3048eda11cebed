//! Circuit normalization: the deterministic preprocessing applied to both
//! circuits at manager construction. After normalization the circuits have
//! the same register width, with width differences reconciled as ancillae.

use gatewise::{passes, Circuit, Qubit};

use crate::config::Optimizations;
use crate::error::EngineError;

/// Run the configured optimization passes on both circuits.
///
/// Dynamic circuits (mid-circuit measurements or resets) are only admitted
/// when `transform_dynamic_circuit` is set, in which case resets become
/// fresh ancillary qubits and measurements are deferred to the end.
pub(crate) fn run_optimization_passes(
    qc1: &mut Circuit,
    qc2: &mut Circuit,
    optimizations: &Optimizations,
) -> Result<(), EngineError> {
    if qc1.is_empty() && qc2.is_empty() {
        return Ok(());
    }

    let dynamic1 = qc1.is_dynamic();
    let dynamic2 = qc2.is_dynamic();
    if dynamic1 || dynamic2 {
        if !optimizations.transform_dynamic_circuit {
            return Err(EngineError::InvalidArgument(
                "one of the circuits contains mid-circuit non-unitary primitives; \
                 verifying such circuits requires `transform_dynamic_circuit=true`"
                    .into(),
            ));
        }
        if dynamic1 {
            passes::eliminate_resets(qc1);
            passes::defer_measurements(qc1)?;
        }
        if dynamic2 {
            passes::eliminate_resets(qc2);
            passes::defer_measurements(qc2)?;
        }
    }

    // reconstruct SWAPs first so the permutation passes can see them
    if optimizations.reconstruct_swaps {
        passes::swap_reconstruction(qc1);
        passes::swap_reconstruction(qc2);
    }

    if optimizations.backpropagate_output_permutation {
        passes::backpropagate_output_permutation(qc1);
        passes::backpropagate_output_permutation(qc2);
    }

    if optimizations.elide_permutations {
        passes::elide_permutations(qc1);
        passes::elide_permutations(qc2);
    }

    if optimizations.fuse_single_qubit_gates {
        passes::fuse_single_qubit_gates(qc1);
        passes::fuse_single_qubit_gates(qc2);
    }

    if optimizations.remove_diagonal_gates_before_measure {
        passes::remove_diagonal_gates_before_measure(qc1);
        passes::remove_diagonal_gates_before_measure(qc2);
    }

    if optimizations.reorder_operations {
        passes::reorder_operations(qc1);
        passes::reorder_operations(qc2);
    }

    // the checked functionality must be unitary
    passes::remove_final_measurements(qc1);
    passes::remove_final_measurements(qc2);

    Ok(())
}

/// A qubit may only be stripped when doing so cannot change the declared
/// output permutation: either the output permutation does not mention it at
/// all, or it maps the qubit's wire straight back to its own logical index.
fn safe_to_remove(circ: &Circuit, physical: Qubit, logical: Qubit) -> bool {
    let physical_used = circ.output_permutation.contains_physical(physical);
    let logical_used = circ.output_permutation.contains_logical(logical);
    (!physical_used && !logical_used)
        || (physical_used && circ.output_permutation.get(physical) == Some(logical))
}

/// Strip idle qubits, walking the larger circuit's layout from the highest
/// physical index downward. A qubit that exists only in the larger circuit
/// is dropped there alone; a qubit idle in both circuits is dropped from
/// both. Logical indices above each removed one are re-compacted.
pub(crate) fn strip_idle_qubits(qc1: &mut Circuit, qc2: &mut Circuit) -> Result<(), EngineError> {
    let (larger, smaller) = if qc1.num_qubits() > qc2.num_qubits() {
        (qc1, qc2)
    } else {
        (qc2, qc1)
    };
    let mut qubit_difference = larger.num_qubits() - smaller.num_qubits();
    let layout_snapshot: Vec<(Qubit, Qubit)> = larger.initial_layout.iter().collect();

    for &(physical, _) in layout_snapshot.iter().rev() {
        if !larger.is_idle_qubit(physical) {
            continue;
        }
        let Some(logical) = larger.initial_layout.get(physical) else {
            continue;
        };

        let mut removed_from_smaller = false;

        let only_in_larger = qubit_difference > 0
            && (smaller.num_qubits() == 0
                || logical > smaller.initial_layout.max_logical().unwrap_or(0));

        if only_in_larger {
            if !safe_to_remove(larger, physical, logical) {
                continue;
            }
            larger.remove_qubit(logical)?;
            qubit_difference -= 1;
        } else {
            let Some(physical_smaller) = smaller.initial_layout.physical_of_logical(logical)
            else {
                continue;
            };
            if !smaller.is_idle_qubit(physical_smaller) {
                continue;
            }
            if !safe_to_remove(larger, physical, logical)
                || !safe_to_remove(smaller, physical_smaller, logical)
            {
                continue;
            }
            larger.remove_qubit(logical)?;
            smaller.remove_qubit(logical)?;
            removed_from_smaller = true;
        }

        larger.initial_layout.decrement_logical_above(logical);
        larger.output_permutation.decrement_logical_above(logical);
        if removed_from_smaller {
            smaller.initial_layout.decrement_logical_above(logical);
            smaller.output_permutation.decrement_logical_above(logical);
        }
    }
    Ok(())
}

/// Reconcile a remaining width difference as ancillae: the extra top logical
/// qubits of the larger circuit become ancillary (keeping their garbage
/// flags), and the smaller circuit gains a matching ancillary register whose
/// qubits are all garbage.
pub(crate) fn setup_ancillaries_and_garbage(qc1: &mut Circuit, qc2: &mut Circuit) {
    let (larger, smaller) = if qc1.num_qubits() > qc2.num_qubits() {
        (qc1, qc2)
    } else {
        (qc2, qc1)
    };
    let difference = larger.num_qubits() - smaller.num_qubits();
    if difference == 0 {
        return;
    }

    for q in smaller.num_qubits()..larger.num_qubits() {
        larger.set_logical_qubit_ancillary(q);
    }
    smaller.add_ancillary_register(difference);
    for q in smaller.num_qubits() - difference..smaller.num_qubits() {
        smaller.set_logical_qubit_garbage(q);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_reject_dynamic_circuits_by_default() {
        let mut qc1 = Circuit::new(1);
        qc1.reset(0);
        let mut qc2 = Circuit::new(1);
        let err = run_optimization_passes(&mut qc1, &mut qc2, &Optimizations::default());
        assert!(matches!(err, Err(EngineError::InvalidArgument(_))));
    }

    #[test]
    fn dynamic_circuits_are_transformed_when_enabled() {
        let mut qc1 = Circuit::new(1);
        qc1.x(0);
        qc1.reset(0);
        qc1.h(0);
        let mut qc2 = Circuit::new(1);
        qc2.h(0);

        let opts = Optimizations {
            transform_dynamic_circuit: true,
            ..Optimizations::default()
        };
        run_optimization_passes(&mut qc1, &mut qc2, &opts).unwrap();
        assert!(!qc1.is_dynamic());
        assert_eq!(qc1.num_qubits(), 2);
    }

    #[test]
    fn final_measurements_are_always_stripped() {
        let mut qc1 = Circuit::new(1);
        qc1.h(0);
        qc1.measure(0, 0);
        let mut qc2 = Circuit::new(1);
        qc2.h(0);
        run_optimization_passes(&mut qc1, &mut qc2, &Optimizations::default()).unwrap();
        assert_eq!(qc1.num_ops(), 1);
    }

    #[test]
    fn idle_qubit_only_in_larger_circuit_is_stripped() {
        let mut qc1 = Circuit::new(3);
        qc1.h(0);
        qc1.cx(0, 1);
        let mut qc2 = Circuit::new(2);
        qc2.h(0);
        qc2.cx(0, 1);

        strip_idle_qubits(&mut qc1, &mut qc2).unwrap();
        assert_eq!(qc1.num_qubits(), 2);
        assert_eq!(qc2.num_qubits(), 2);
    }

    #[test]
    fn qubit_idle_in_both_circuits_is_stripped_from_both() {
        let mut qc1 = Circuit::new(2);
        qc1.h(0);
        let mut qc2 = Circuit::new(2);
        qc2.h(0);

        strip_idle_qubits(&mut qc1, &mut qc2).unwrap();
        assert_eq!(qc1.num_qubits(), 1);
        assert_eq!(qc2.num_qubits(), 1);
    }

    #[test]
    fn output_permutation_protects_qubits_from_stripping() {
        let mut qc1 = Circuit::new(2);
        qc1.h(0);
        let mut qc2 = Circuit::new(2);
        qc2.h(0);
        // wire 1 is declared to output logical 0, so it cannot be dropped
        qc1.output_permutation = [(0, 1), (1, 0)].into_iter().collect();

        strip_idle_qubits(&mut qc1, &mut qc2).unwrap();
        assert_eq!(qc1.num_qubits(), 2);
    }

    #[test]
    fn ancilla_reconciliation_equalizes_widths() {
        let mut qc1 = Circuit::new(3);
        qc1.h(0);
        qc1.cx(0, 2);
        let mut qc2 = Circuit::new(2);
        qc2.h(0);

        setup_ancillaries_and_garbage(&mut qc1, &mut qc2);
        assert_eq!(qc1.num_qubits(), qc2.num_qubits());
        assert_eq!(qc1.num_ancillary_qubits(), 1);
        assert_eq!(qc2.num_ancillary_qubits(), 1);
        assert!(qc1.is_ancillary(2));
        assert!(qc2.is_garbage(2));
        assert_eq!(qc1.num_qubits_without_ancillae(), 2);
        assert_eq!(qc2.num_qubits_without_ancillae(), 2);
    }

    #[test]
    fn garbage_flags_survive_reconciliation() {
        let mut qc1 = Circuit::new(2);
        qc1.h(0);
        qc1.z(1);
        qc1.set_logical_qubit_garbage(1);
        let mut qc2 = Circuit::new(1);
        qc2.h(0);

        setup_ancillaries_and_garbage(&mut qc1, &mut qc2);
        assert!(qc1.is_garbage(1));
        assert!(qc1.is_ancillary(1));
        assert!(qc2.is_garbage(1));
    }
}
