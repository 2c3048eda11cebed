use std::collections::HashMap;
use std::fmt;

use smallvec::{smallvec, SmallVec};

pub type Qubit = usize;
pub type Bit = usize;

/// A rotation angle, either a concrete value or a named symbolic parameter
/// scaled by a constant factor.
#[derive(Clone, Debug, PartialEq)]
pub enum Angle {
    Fixed(f64),
    Symbolic { name: String, factor: f64 },
}

impl Angle {
    /// The concrete value, if the angle is not symbolic.
    #[must_use]
    pub fn value(&self) -> Option<f64> {
        match self {
            Angle::Fixed(theta) => Some(*theta),
            Angle::Symbolic { .. } => None,
        }
    }

    #[must_use]
    pub fn is_symbolic(&self) -> bool {
        matches!(self, Angle::Symbolic { .. })
    }

    /// Substitute symbolic parameters with concrete values. Parameters missing
    /// from `bindings` are bound to zero.
    #[must_use]
    pub fn instantiate(&self, bindings: &HashMap<String, f64>) -> Angle {
        match self {
            Angle::Fixed(theta) => Angle::Fixed(*theta),
            Angle::Symbolic { name, factor } => {
                Angle::Fixed(factor * bindings.get(name).copied().unwrap_or(0.0))
            }
        }
    }

    #[must_use]
    pub fn negated(&self) -> Angle {
        match self {
            Angle::Fixed(theta) => Angle::Fixed(-theta),
            Angle::Symbolic { name, factor } => Angle::Symbolic {
                name: name.clone(),
                factor: -factor,
            },
        }
    }
}

impl fmt::Display for Angle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Angle::Fixed(theta) => write!(f, "{theta}"),
            Angle::Symbolic { name, factor } => write!(f, "{factor}*{name}"),
        }
    }
}

/// The gate alphabet understood by the engines and the optimization passes.
///
/// `GPhase` acts on no qubits and multiplies the state by a global phase.
#[derive(Clone, Debug, PartialEq)]
pub enum Gate {
    X,
    Y,
    Z,
    H,
    S,
    Sdg,
    T,
    Tdg,
    Sx,
    Sxdg,
    Rx(Angle),
    Ry(Angle),
    Rz(Angle),
    Phase(Angle),
    GPhase(Angle),
    Swap,
}

impl Gate {
    /// Lowercase identifier, as used in gate-cost profiles.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Gate::X => "x",
            Gate::Y => "y",
            Gate::Z => "z",
            Gate::H => "h",
            Gate::S => "s",
            Gate::Sdg => "sdg",
            Gate::T => "t",
            Gate::Tdg => "tdg",
            Gate::Sx => "sx",
            Gate::Sxdg => "sxdg",
            Gate::Rx(_) => "rx",
            Gate::Ry(_) => "ry",
            Gate::Rz(_) => "rz",
            Gate::Phase(_) => "p",
            Gate::GPhase(_) => "gphase",
            Gate::Swap => "swap",
        }
    }

    /// Number of target qubits the gate acts on.
    #[must_use]
    pub fn num_targets(&self) -> usize {
        match self {
            Gate::Swap => 2,
            Gate::GPhase(_) => 0,
            _ => 1,
        }
    }

    /// True for gates that are diagonal in the computational basis.
    #[must_use]
    pub fn is_diagonal(&self) -> bool {
        matches!(
            self,
            Gate::Z
                | Gate::S
                | Gate::Sdg
                | Gate::T
                | Gate::Tdg
                | Gate::Rz(_)
                | Gate::Phase(_)
                | Gate::GPhase(_)
        )
    }

    #[must_use]
    pub fn is_symbolic(&self) -> bool {
        match self {
            Gate::Rx(a) | Gate::Ry(a) | Gate::Rz(a) | Gate::Phase(a) | Gate::GPhase(a) => {
                a.is_symbolic()
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn inverse(&self) -> Gate {
        match self {
            Gate::X => Gate::X,
            Gate::Y => Gate::Y,
            Gate::Z => Gate::Z,
            Gate::H => Gate::H,
            Gate::S => Gate::Sdg,
            Gate::Sdg => Gate::S,
            Gate::T => Gate::Tdg,
            Gate::Tdg => Gate::T,
            Gate::Sx => Gate::Sxdg,
            Gate::Sxdg => Gate::Sx,
            Gate::Rx(a) => Gate::Rx(a.negated()),
            Gate::Ry(a) => Gate::Ry(a.negated()),
            Gate::Rz(a) => Gate::Rz(a.negated()),
            Gate::Phase(a) => Gate::Phase(a.negated()),
            Gate::GPhase(a) => Gate::GPhase(a.negated()),
            Gate::Swap => Gate::Swap,
        }
    }

    #[must_use]
    pub fn instantiate(&self, bindings: &HashMap<String, f64>) -> Gate {
        match self {
            Gate::Rx(a) => Gate::Rx(a.instantiate(bindings)),
            Gate::Ry(a) => Gate::Ry(a.instantiate(bindings)),
            Gate::Rz(a) => Gate::Rz(a.instantiate(bindings)),
            Gate::Phase(a) => Gate::Phase(a.instantiate(bindings)),
            Gate::GPhase(a) => Gate::GPhase(a.instantiate(bindings)),
            other => other.clone(),
        }
    }

    /// The rotation axis for mergeable rotation gates.
    #[must_use]
    pub fn rotation_axis(&self) -> Option<char> {
        match self {
            Gate::Rx(_) => Some('x'),
            Gate::Ry(_) => Some('y'),
            Gate::Rz(_) => Some('z'),
            Gate::Phase(_) => Some('p'),
            Gate::GPhase(_) => Some('g'),
            _ => None,
        }
    }

    #[must_use]
    pub fn rotation_angle(&self) -> Option<&Angle> {
        match self {
            Gate::Rx(a) | Gate::Ry(a) | Gate::Rz(a) | Gate::Phase(a) | Gate::GPhase(a) => Some(a),
            _ => None,
        }
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rotation_angle() {
            Some(angle) => write!(f, "{}({angle})", self.name()),
            None => f.write_str(self.name()),
        }
    }
}

/// A single circuit operation addressing physical wires.
#[derive(Clone, Debug, PartialEq)]
pub enum Operation {
    Unitary {
        gate: Gate,
        controls: SmallVec<[Qubit; 2]>,
        targets: SmallVec<[Qubit; 2]>,
    },
    Measure {
        qubit: Qubit,
        bit: Bit,
    },
    Reset {
        qubit: Qubit,
    },
}

impl Operation {
    #[must_use]
    pub fn unitary(gate: Gate, targets: impl IntoIterator<Item = Qubit>) -> Operation {
        Operation::Unitary {
            gate,
            controls: smallvec![],
            targets: targets.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn controlled(
        gate: Gate,
        controls: impl IntoIterator<Item = Qubit>,
        targets: impl IntoIterator<Item = Qubit>,
    ) -> Operation {
        Operation::Unitary {
            gate,
            controls: controls.into_iter().collect(),
            targets: targets.into_iter().collect(),
        }
    }

    /// All wires touched by this operation, controls first.
    #[must_use]
    pub fn qubits(&self) -> SmallVec<[Qubit; 4]> {
        match self {
            Operation::Unitary {
                controls, targets, ..
            } => controls.iter().chain(targets.iter()).copied().collect(),
            Operation::Measure { qubit, .. } | Operation::Reset { qubit } => smallvec![*qubit],
        }
    }

    #[must_use]
    pub fn acts_on(&self, wire: Qubit) -> bool {
        self.qubits().contains(&wire)
    }

    #[must_use]
    pub fn is_unitary(&self) -> bool {
        matches!(self, Operation::Unitary { .. })
    }

    /// Diagonal operations commute with computational-basis measurements.
    /// A controlled gate is diagonal iff its base gate is.
    #[must_use]
    pub fn is_diagonal(&self) -> bool {
        match self {
            Operation::Unitary { gate, .. } => gate.is_diagonal(),
            _ => false,
        }
    }

    #[must_use]
    pub fn is_symbolic(&self) -> bool {
        match self {
            Operation::Unitary { gate, .. } => gate.is_symbolic(),
            _ => false,
        }
    }

    /// The inverse operation. `None` for non-unitary operations.
    #[must_use]
    pub fn inverse(&self) -> Option<Operation> {
        match self {
            Operation::Unitary {
                gate,
                controls,
                targets,
            } => Some(Operation::Unitary {
                gate: gate.inverse(),
                controls: controls.clone(),
                targets: targets.clone(),
            }),
            _ => None,
        }
    }

    #[must_use]
    pub fn instantiate(&self, bindings: &HashMap<String, f64>) -> Operation {
        match self {
            Operation::Unitary {
                gate,
                controls,
                targets,
            } => Operation::Unitary {
                gate: gate.instantiate(bindings),
                controls: controls.clone(),
                targets: targets.clone(),
            },
            other => other.clone(),
        }
    }

    /// Rewrite every wire index through `map`.
    pub fn remap_qubits(&mut self, map: impl Fn(Qubit) -> Qubit) {
        match self {
            Operation::Unitary {
                controls, targets, ..
            } => {
                for q in controls.iter_mut().chain(targets.iter_mut()) {
                    *q = map(*q);
                }
            }
            Operation::Measure { qubit, .. } | Operation::Reset { qubit } => *qubit = map(*qubit),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Unitary {
                gate,
                controls,
                targets,
            } => {
                for _ in controls {
                    f.write_str("c")?;
                }
                write!(f, "{gate} {controls:?}{targets:?}")
            }
            Operation::Measure { qubit, bit } => write!(f, "measure {qubit} -> {bit}"),
            Operation::Reset { qubit } => write!(f, "reset {qubit}"),
        }
    }
}
