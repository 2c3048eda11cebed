use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::gate::{Angle, Bit, Gate, Operation, Qubit};

#[derive(Debug, Error)]
pub enum CircuitError {
    #[error("logical qubit {0} is not present in the initial layout")]
    UnknownLogicalQubit(Qubit),
    #[error("physical qubit {0} is not idle")]
    QubitNotIdle(Qubit),
    #[error("operation addresses qubit {0} outside the register of width {1}")]
    QubitOutOfRange(Qubit, usize),
    #[error("measurement on qubit {0} is followed by further operations on it")]
    MeasurementNotDeferrable(Qubit),
    #[error("non-unitary application: {0}")]
    NonUnitary(String),
}

/// An ordered physical→logical qubit map, as used for the initial layout and
/// the output permutation of a circuit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Permutation {
    map: BTreeMap<Qubit, Qubit>,
}

impl Permutation {
    #[must_use]
    pub fn identity(n: usize) -> Permutation {
        Permutation {
            map: (0..n).map(|q| (q, q)).collect(),
        }
    }

    #[must_use]
    pub fn get(&self, physical: Qubit) -> Option<Qubit> {
        self.map.get(&physical).copied()
    }

    pub fn insert(&mut self, physical: Qubit, logical: Qubit) {
        self.map.insert(physical, logical);
    }

    pub fn remove(&mut self, physical: Qubit) -> Option<Qubit> {
        self.map.remove(&physical)
    }

    #[must_use]
    pub fn contains_physical(&self, physical: Qubit) -> bool {
        self.map.contains_key(&physical)
    }

    #[must_use]
    pub fn contains_logical(&self, logical: Qubit) -> bool {
        self.map.values().any(|&l| l == logical)
    }

    #[must_use]
    pub fn physical_of_logical(&self, logical: Qubit) -> Option<Qubit> {
        self.map
            .iter()
            .find(|(_, &l)| l == logical)
            .map(|(&p, _)| p)
    }

    /// Largest logical index in the map.
    #[must_use]
    pub fn max_logical(&self) -> Option<Qubit> {
        self.map.values().copied().max()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (Qubit, Qubit)> + '_ {
        self.map.iter().map(|(&p, &l)| (p, l))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Decrement every logical index strictly above `logical`.
    pub fn decrement_logical_above(&mut self, logical: Qubit) {
        for l in self.map.values_mut() {
            if *l > logical {
                *l -= 1;
            }
        }
    }

    /// Shift physical indices strictly above `physical` down by one.
    pub fn contract_physical(&mut self, physical: Qubit) {
        let map = std::mem::take(&mut self.map);
        self.map = map
            .into_iter()
            .map(|(p, l)| if p > physical { (p - 1, l) } else { (p, l) })
            .collect();
    }

    /// Shift physical indices at or above `physical` up by one.
    pub fn expand_physical(&mut self, physical: Qubit) {
        let map = std::mem::take(&mut self.map);
        self.map = map
            .into_iter()
            .map(|(p, l)| if p >= physical { (p + 1, l) } else { (p, l) })
            .collect();
    }
}

impl FromIterator<(Qubit, Qubit)> for Permutation {
    fn from_iter<I: IntoIterator<Item = (Qubit, Qubit)>>(iter: I) -> Self {
        Permutation {
            map: iter.into_iter().collect(),
        }
    }
}

/// A quantum circuit: an ordered list of operations on physical wires,
/// together with the physical→logical maps at entry (`initial_layout`) and
/// exit (`output_permutation`) and per-logical-qubit ancillary/garbage flags.
#[derive(Clone, Debug, Default, PartialEq)]
#[must_use]
pub struct Circuit {
    num_qubits: usize,
    pub ops: Vec<Operation>,
    pub initial_layout: Permutation,
    pub output_permutation: Permutation,
    ancillary: Vec<bool>,
    garbage: Vec<bool>,
}

impl Circuit {
    pub fn new(num_qubits: usize) -> Circuit {
        Circuit {
            num_qubits,
            ops: Vec::new(),
            initial_layout: Permutation::identity(num_qubits),
            output_permutation: Permutation::identity(num_qubits),
            ancillary: vec![false; num_qubits],
            garbage: vec![false; num_qubits],
        }
    }

    #[must_use]
    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    #[must_use]
    pub fn num_ops(&self) -> usize {
        self.ops.len()
    }

    /// A circuit is empty when it contains no operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn push(&mut self, op: Operation) {
        self.ops.push(op);
    }

    // Builder shorthands used pervasively in tests and stimuli generation.

    pub fn h(&mut self, q: Qubit) {
        self.push(Operation::unitary(Gate::H, [q]));
    }

    pub fn x(&mut self, q: Qubit) {
        self.push(Operation::unitary(Gate::X, [q]));
    }

    pub fn y(&mut self, q: Qubit) {
        self.push(Operation::unitary(Gate::Y, [q]));
    }

    pub fn z(&mut self, q: Qubit) {
        self.push(Operation::unitary(Gate::Z, [q]));
    }

    pub fn s(&mut self, q: Qubit) {
        self.push(Operation::unitary(Gate::S, [q]));
    }

    pub fn t(&mut self, q: Qubit) {
        self.push(Operation::unitary(Gate::T, [q]));
    }

    pub fn rz(&mut self, theta: f64, q: Qubit) {
        self.push(Operation::unitary(Gate::Rz(Angle::Fixed(theta)), [q]));
    }

    pub fn cx(&mut self, control: Qubit, target: Qubit) {
        self.push(Operation::controlled(Gate::X, [control], [target]));
    }

    pub fn cz(&mut self, control: Qubit, target: Qubit) {
        self.push(Operation::controlled(Gate::Z, [control], [target]));
    }

    pub fn swap(&mut self, a: Qubit, b: Qubit) {
        self.push(Operation::unitary(Gate::Swap, [a, b]));
    }

    pub fn gphase(&mut self, theta: f64) {
        self.push(Operation::unitary(Gate::GPhase(Angle::Fixed(theta)), []));
    }

    pub fn measure(&mut self, qubit: Qubit, bit: Bit) {
        self.push(Operation::Measure { qubit, bit });
    }

    pub fn reset(&mut self, qubit: Qubit) {
        self.push(Operation::Reset { qubit });
    }

    /// True when no operation acts on the physical wire.
    #[must_use]
    pub fn is_idle_qubit(&self, physical: Qubit) -> bool {
        !self.ops.iter().any(|op| op.acts_on(physical))
    }

    /// A circuit is dynamic when it contains resets or mid-circuit
    /// measurements (measurements not part of the trailing measurement block).
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        let mut tail = self.ops.len();
        while tail > 0 && matches!(self.ops[tail - 1], Operation::Measure { .. }) {
            tail -= 1;
        }
        self.ops[..tail]
            .iter()
            .any(|op| matches!(op, Operation::Measure { .. } | Operation::Reset { .. }))
    }

    #[must_use]
    pub fn is_variable_free(&self) -> bool {
        !self.ops.iter().any(Operation::is_symbolic)
    }

    #[must_use]
    pub fn is_ancillary(&self, logical: Qubit) -> bool {
        self.ancillary.get(logical).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn is_garbage(&self, logical: Qubit) -> bool {
        self.garbage.get(logical).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn num_ancillary_qubits(&self) -> usize {
        self.ancillary.iter().filter(|&&a| a).count()
    }

    #[must_use]
    pub fn num_garbage_qubits(&self) -> usize {
        self.garbage.iter().filter(|&&g| g).count()
    }

    #[must_use]
    pub fn num_qubits_without_ancillae(&self) -> usize {
        self.num_qubits - self.num_ancillary_qubits()
    }

    pub fn set_logical_qubit_garbage(&mut self, logical: Qubit) {
        if logical < self.num_qubits {
            self.garbage[logical] = true;
        }
    }

    pub fn set_logical_qubit_ancillary(&mut self, logical: Qubit) {
        if logical < self.num_qubits {
            self.ancillary[logical] = true;
        }
    }

    /// Remove an idle logical qubit from the circuit.
    ///
    /// Returns the physical wire it was mapped to and, if that wire carried an
    /// output permutation entry, the logical index recorded there. Wire
    /// indices above the removed wire are contracted; logical indices above
    /// the removed one are left to the caller (they stay valid when the
    /// removed qubit carries the maximum logical index).
    pub fn remove_qubit(
        &mut self,
        logical: Qubit,
    ) -> Result<(Qubit, Option<Qubit>), CircuitError> {
        let physical = self
            .initial_layout
            .physical_of_logical(logical)
            .ok_or(CircuitError::UnknownLogicalQubit(logical))?;
        if !self.is_idle_qubit(physical) {
            return Err(CircuitError::QubitNotIdle(physical));
        }

        self.initial_layout.remove(physical);
        let output_entry = self.output_permutation.remove(physical);
        self.initial_layout.contract_physical(physical);
        self.output_permutation.contract_physical(physical);

        for op in &mut self.ops {
            op.remap_qubits(|w| if w > physical { w - 1 } else { w });
        }

        self.ancillary.remove(logical);
        self.garbage.remove(logical);
        self.num_qubits -= 1;

        Ok((physical, output_entry))
    }

    /// Re-add a previously removed qubit as an ancillary at wire `physical`.
    ///
    /// The new qubit gets the next logical index. `output_logical` restores
    /// the output permutation entry the wire carried before removal.
    pub fn add_ancillary_qubit(&mut self, physical: Qubit, output_logical: Option<Qubit>) {
        self.initial_layout.expand_physical(physical);
        self.output_permutation.expand_physical(physical);

        for op in &mut self.ops {
            op.remap_qubits(|w| if w >= physical { w + 1 } else { w });
        }

        let logical = self.num_qubits;
        self.initial_layout.insert(physical, logical);
        if let Some(out) = output_logical {
            self.output_permutation.insert(physical, out);
        }
        self.ancillary.push(true);
        self.garbage.push(false);
        self.num_qubits += 1;
    }

    /// Append `width` fresh ancillary qubits at the top of the register.
    pub fn add_ancillary_register(&mut self, width: usize) {
        for _ in 0..width {
            let q = self.num_qubits;
            self.initial_layout.insert(q, q);
            self.output_permutation.insert(q, q);
            self.ancillary.push(true);
            self.garbage.push(false);
            self.num_qubits += 1;
        }
    }

    /// Append a fresh non-ancillary qubit, returning its wire index.
    pub(crate) fn add_qubit(&mut self) -> Qubit {
        let q = self.num_qubits;
        self.initial_layout.insert(q, q);
        self.output_permutation.insert(q, q);
        self.ancillary.push(false);
        self.garbage.push(false);
        self.num_qubits += 1;
        q
    }

    /// Validate that all operations stay within the register.
    pub fn validate(&self) -> Result<(), CircuitError> {
        for op in &self.ops {
            for q in op.qubits() {
                if q >= self.num_qubits {
                    return Err(CircuitError::QubitOutOfRange(q, self.num_qubits));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Circuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "circuit on {} qubits:", self.num_qubits)?;
        for op in &self.ops {
            writeln!(f, "  {op}")?;
        }
        Ok(())
    }
}
