//! Random circuit generation for stimuli.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::circuit::Circuit;
use crate::gate::{Gate, Operation};

/// Generate a random Clifford circuit on `num_qubits` qubits with `depth`
/// layers. Each layer applies a random single-qubit Clifford to every qubit
/// followed by a random two-qubit Clifford on a random adjacent-free pair.
///
/// Simulating the result on |0…0⟩ yields a random stabilizer state.
pub fn random_clifford_circuit(num_qubits: usize, depth: usize, seed: u64) -> Circuit {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut circ = Circuit::new(num_qubits);

    for _ in 0..depth.max(1) {
        for q in 0..num_qubits {
            let gate = match rng.gen_range(0..6) {
                0 => Gate::H,
                1 => Gate::S,
                2 => Gate::Sdg,
                3 => Gate::X,
                4 => Gate::Z,
                _ => Gate::Sx,
            };
            circ.push(Operation::unitary(gate, [q]));
        }
        if num_qubits >= 2 {
            let a = rng.gen_range(0..num_qubits);
            let mut b = rng.gen_range(0..num_qubits);
            while b == a {
                b = rng.gen_range(0..num_qubits);
            }
            match rng.gen_range(0..3) {
                0 => circ.cx(a, b),
                1 => circ.cz(a, b),
                _ => circ.swap(a, b),
            }
        }
    }
    circ
}
