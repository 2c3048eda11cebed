//! Circuit optimization passes applied during equivalence-check preprocessing.
//!
//! Each pass is a standalone function over a mutable [`Circuit`]. The passes
//! preserve the circuit's functionality (up to the declared layouts and
//! garbage flags), which is what makes them admissible before an equivalence
//! check.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

use crate::circuit::{Circuit, CircuitError, Permutation};
use crate::gate::{Angle, Gate, Operation, Qubit};
use crate::matrix::tolerance;

/// Substitute every reset with a fresh ancillary qubit.
///
/// The pre-reset wire keeps carrying its state, but its output is re-declared
/// as garbage; the continuation of the circuit runs on the fresh qubit, which
/// starts in |0⟩ exactly like a freshly reset wire.
pub fn eliminate_resets(circ: &mut Circuit) {
    if !circ
        .ops
        .iter()
        .any(|op| matches!(op, Operation::Reset { .. }))
    {
        return;
    }

    let original_qubits = circ.num_qubits();
    let mut current: Vec<Qubit> = (0..original_qubits).collect();
    let ops = std::mem::take(&mut circ.ops);
    let mut new_ops = Vec::with_capacity(ops.len());

    for mut op in ops {
        if let Operation::Reset { qubit } = op {
            let fresh = circ.add_qubit();
            circ.set_logical_qubit_ancillary(fresh);
            current[qubit] = fresh;
        } else {
            op.remap_qubits(|w| current[w]);
            new_ops.push(op);
        }
    }
    circ.ops = new_ops;

    // Re-route the output permutation: the data wire `p` fed into the circuit
    // ends up on `current[p]`. Superseded wires hold discarded intermediate
    // states; they get the remaining logical indices and are flagged garbage.
    let old_out = std::mem::replace(&mut circ.output_permutation, Permutation::default());
    let mut routed_wires = HashSet::new();
    let mut routed_logicals = HashSet::new();
    let mut new_out = Permutation::default();
    for (p, l) in old_out.iter() {
        if p < original_qubits {
            new_out.insert(current[p], l);
            routed_wires.insert(current[p]);
            routed_logicals.insert(l);
        }
    }
    let mut free_logicals =
        (0..circ.num_qubits()).filter(|l| !routed_logicals.contains(l));
    for wire in 0..circ.num_qubits() {
        if !routed_wires.contains(&wire) {
            if let Some(l) = free_logicals.next() {
                new_out.insert(wire, l);
                circ.set_logical_qubit_garbage(l);
            }
        }
    }
    circ.output_permutation = new_out;
}

/// Move all measurements to the end of the circuit.
///
/// Fails when a measured qubit is acted upon afterwards; without classically
/// controlled operations there is no sound rewrite for that shape.
pub fn defer_measurements(circ: &mut Circuit) -> Result<(), CircuitError> {
    for (i, op) in circ.ops.iter().enumerate() {
        if let Operation::Measure { qubit, .. } = op {
            let blocked = circ.ops[i + 1..]
                .iter()
                .any(|later| !matches!(later, Operation::Measure { .. }) && later.acts_on(*qubit));
            if blocked {
                return Err(CircuitError::MeasurementNotDeferrable(*qubit));
            }
        }
    }
    let (measures, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut circ.ops)
        .into_iter()
        .partition(|op| matches!(op, Operation::Measure { .. }));
    circ.ops = rest;
    circ.ops.extend(measures);
    Ok(())
}

fn as_cx(op: &Operation) -> Option<(Qubit, Qubit)> {
    if let Operation::Unitary {
        gate: Gate::X,
        controls,
        targets,
    } = op
    {
        if controls.len() == 1 && targets.len() == 1 {
            return Some((controls[0], targets[0]));
        }
    }
    None
}

/// Collapse `cx(a,b); cx(b,a); cx(a,b)` triples into a single swap.
pub fn swap_reconstruction(circ: &mut Circuit) {
    let ops = std::mem::take(&mut circ.ops);
    let mut new_ops: Vec<Operation> = Vec::with_capacity(ops.len());
    let mut i = 0;
    while i < ops.len() {
        if i + 2 < ops.len() {
            if let (Some((a, b)), Some((c, d)), Some((e, f))) =
                (as_cx(&ops[i]), as_cx(&ops[i + 1]), as_cx(&ops[i + 2]))
            {
                if (c, d) == (b, a) && (e, f) == (a, b) {
                    new_ops.push(Operation::unitary(Gate::Swap, [a, b]));
                    i += 3;
                    continue;
                }
            }
        }
        new_ops.push(ops[i].clone());
        i += 1;
    }
    circ.ops = new_ops;
}

/// Absorb trailing swaps into the output permutation.
pub fn backpropagate_output_permutation(circ: &mut Circuit) {
    loop {
        let Some(Operation::Unitary {
            gate: Gate::Swap,
            controls,
            targets,
        }) = circ.ops.last()
        else {
            break;
        };
        if !controls.is_empty() {
            break;
        }
        let (a, b) = (targets[0], targets[1]);
        let (Some(la), Some(lb)) = (
            circ.output_permutation.get(a),
            circ.output_permutation.get(b),
        ) else {
            break;
        };
        circ.output_permutation.insert(a, lb);
        circ.output_permutation.insert(b, la);
        circ.ops.pop();
    }
}

/// Remove every swap by rewiring subsequent operations, composing the
/// accumulated wire permutation into the output permutation.
pub fn elide_permutations(circ: &mut Circuit) {
    let n = circ.num_qubits();
    let mut perm: Vec<Qubit> = (0..n).collect();
    let ops = std::mem::take(&mut circ.ops);
    let mut new_ops = Vec::with_capacity(ops.len());

    for mut op in ops {
        op.remap_qubits(|w| perm[w]);
        if let Operation::Unitary {
            gate: Gate::Swap,
            controls,
            targets,
        } = &op
        {
            if controls.is_empty() {
                let (a, b) = (targets[0], targets[1]);
                for w in &mut perm {
                    if *w == a {
                        *w = b;
                    } else if *w == b {
                        *w = a;
                    }
                }
                continue;
            }
        }
        new_ops.push(op);
    }
    circ.ops = new_ops;

    let old_out = std::mem::replace(&mut circ.output_permutation, Permutation::default());
    let mut new_out = Permutation::default();
    for (p, l) in old_out.iter() {
        let wire = if p < n { perm[p] } else { p };
        new_out.insert(wire, l);
    }
    circ.output_permutation = new_out;
}

fn single_qubit_target(op: &Operation) -> Option<Qubit> {
    if let Operation::Unitary {
        gate,
        controls,
        targets,
    } = op
    {
        if controls.is_empty() && targets.len() == 1 && gate.num_targets() == 1 {
            return Some(targets[0]);
        }
    }
    None
}

fn merged_gate(first: &Gate, second: &Gate) -> Option<Option<Gate>> {
    // inverse pairs cancel outright
    if *second == first.inverse() {
        return Some(None);
    }
    // same-axis fixed rotations merge
    if let (Some(axis1), Some(axis2)) = (first.rotation_axis(), second.rotation_axis()) {
        if axis1 == axis2 {
            if let (Some(Angle::Fixed(a)), Some(Angle::Fixed(b))) =
                (first.rotation_angle().cloned(), second.rotation_angle().cloned())
            {
                let sum = a + b;
                if sum.abs() < tolerance() {
                    return Some(None);
                }
                let merged = match axis1 {
                    'x' => Gate::Rx(Angle::Fixed(sum)),
                    'y' => Gate::Ry(Angle::Fixed(sum)),
                    'z' => Gate::Rz(Angle::Fixed(sum)),
                    'p' => Gate::Phase(Angle::Fixed(sum)),
                    _ => Gate::GPhase(Angle::Fixed(sum)),
                };
                return Some(Some(merged));
            }
        }
    }
    None
}

/// Fuse consecutive single-qubit gates: inverse pairs cancel and same-axis
/// rotations merge. Runs to a fixpoint.
pub fn fuse_single_qubit_gates(circ: &mut Circuit) {
    let mut changed = true;
    while changed {
        changed = false;
        'scan: for i in 0..circ.ops.len() {
            let Some(q) = single_qubit_target(&circ.ops[i]) else {
                continue;
            };
            for j in i + 1..circ.ops.len() {
                if !circ.ops[j].acts_on(q) {
                    continue;
                }
                if single_qubit_target(&circ.ops[j]) != Some(q) {
                    break;
                }
                let (Operation::Unitary { gate: g1, .. }, Operation::Unitary { gate: g2, .. }) =
                    (&circ.ops[i], &circ.ops[j])
                else {
                    break;
                };
                match merged_gate(g1, g2) {
                    Some(None) => {
                        circ.ops.remove(j);
                        circ.ops.remove(i);
                        changed = true;
                        break 'scan;
                    }
                    Some(Some(merged)) => {
                        circ.ops[i] = Operation::unitary(merged, [q]);
                        circ.ops.remove(j);
                        changed = true;
                        break 'scan;
                    }
                    None => break,
                }
            }
        }
    }
}

/// Drop diagonal gates whose every qubit is only measured afterwards.
pub fn remove_diagonal_gates_before_measure(circ: &mut Circuit) {
    let mut changed = true;
    while changed {
        changed = false;
        for i in 0..circ.ops.len() {
            let op = &circ.ops[i];
            if !op.is_diagonal() || op.qubits().is_empty() {
                continue;
            }
            let removable = op.qubits().iter().all(|&q| {
                circ.ops[i + 1..]
                    .iter()
                    .find(|later| later.acts_on(q))
                    .is_some_and(|later| matches!(later, Operation::Measure { .. }))
            });
            if removable {
                circ.ops.remove(i);
                changed = true;
                break;
            }
        }
    }
}

/// Deterministically reorder operations: a dataflow-respecting topological
/// order picking the ready operation with the smallest wire first. Circuits
/// that are equal up to commuting independent operations end up identical.
pub fn reorder_operations(circ: &mut Circuit) {
    let ops = std::mem::take(&mut circ.ops);
    let count = ops.len();
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); count];
    let mut indegree = vec![0usize; count];
    let mut last_on_wire: Vec<Option<usize>> = vec![None; circ.num_qubits()];

    for (i, op) in ops.iter().enumerate() {
        let mut preds = HashSet::new();
        for q in op.qubits() {
            if let Some(prev) = last_on_wire[q] {
                preds.insert(prev);
            }
            last_on_wire[q] = Some(i);
        }
        for prev in preds {
            successors[prev].push(i);
            indegree[i] += 1;
        }
    }

    let key = |op: &Operation, idx: usize| {
        let wire = op.qubits().iter().copied().min().unwrap_or(usize::MAX);
        Reverse((wire, idx))
    };
    let mut ready: BinaryHeap<Reverse<(usize, usize)>> = (0..count)
        .filter(|&i| indegree[i] == 0)
        .map(|i| key(&ops[i], i))
        .collect();

    let mut order = Vec::with_capacity(count);
    while let Some(Reverse((_, idx))) = ready.pop() {
        order.push(idx);
        for &next in &successors[idx] {
            indegree[next] -= 1;
            if indegree[next] == 0 {
                ready.push(key(&ops[next], next));
            }
        }
    }
    circ.ops = order.into_iter().map(|i| ops[i].clone()).collect();
}

/// Strip the trailing measurement block.
pub fn remove_final_measurements(circ: &mut Circuit) {
    let ops = std::mem::take(&mut circ.ops);
    circ.ops = ops
        .iter()
        .enumerate()
        .filter(|(i, op)| {
            if let Operation::Measure { qubit, .. } = op {
                ops[i + 1..]
                    .iter()
                    .any(|later| !matches!(later, Operation::Measure { .. }) && later.acts_on(*qubit))
            } else {
                true
            }
        })
        .map(|(_, op)| op.clone())
        .collect();
}
