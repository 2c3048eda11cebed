//! Quantum circuit primitives for equivalence checking.
//!
//! `gatewise` provides the circuit representation the `equiverse` portfolio
//! operates on, together with the preprocessing passes and the dense linear
//! algebra its reference engines use.
//!
//! # Overview
//!
//! - [`Circuit`]: an ordered operation list over physical wires with two
//!   physical→logical maps (`initial_layout`, `output_permutation`) and
//!   per-qubit ancillary/garbage flags.
//! - [`passes`]: functionality-preserving rewrites applied before a check
//!   (swap reconstruction, permutation elision, single-qubit fusion,
//!   measurement handling, deterministic reordering).
//! - [`matrix`]: exact state-vector and unitary math with a process-wide
//!   numeric tolerance.
//! - [`random`]: seeded random Clifford circuits for stabilizer stimuli.
//!
//! # Quick Start
//!
//! ```
//! use gatewise::{Circuit, StateVector};
//!
//! let mut circ = Circuit::new(2);
//! circ.h(0);
//! circ.cx(0, 1);
//!
//! let mut state = StateVector::zero_state(2);
//! for op in &circ.ops {
//!     state.apply(op).unwrap();
//! }
//! assert!((state.amps[0].norm_sqr() - 0.5).abs() < 1e-12);
//! ```

pub mod circuit;
pub mod gate;
pub mod matrix;
pub mod passes;
pub mod random;

pub use circuit::{Circuit, CircuitError, Permutation};
pub use gate::{Angle, Bit, Gate, Operation, Qubit};
pub use matrix::{
    completed_pairs, set_tolerance, tolerance, Basis1Q, StateVector, Unitary,
};
pub use random::random_clifford_circuit;
