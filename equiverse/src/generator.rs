//! Random stimuli generation for the simulation engine.

use std::collections::HashSet;

use gatewise::{random_clifford_circuit, Basis1Q, StateVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::StateType;
use crate::error::EngineError;

/// Generates random initial states for simulation trials.
///
/// The generator is the only mutable resource shared across simulation
/// trials within one run: the orchestrator samples from it before handing a
/// trial to a worker, so workers never touch it after spawn.
#[derive(Clone, Debug)]
pub struct StateGenerator {
    seed: u64,
    rng: StdRng,
    generated_basis_states: HashSet<u64>,
}

impl StateGenerator {
    /// Create a generator; a seed of zero draws from OS entropy.
    #[must_use]
    pub fn new(seed: u64) -> StateGenerator {
        let rng = if seed == 0 {
            StdRng::from_entropy()
        } else {
            StdRng::seed_from_u64(seed)
        };
        StateGenerator {
            seed,
            rng,
            generated_basis_states: HashSet::new(),
        }
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Forget all previously generated computational basis states.
    pub fn clear(&mut self) {
        self.generated_basis_states.clear();
    }

    /// Draw a random state on `total_qubits` wires. The top
    /// `ancillary_qubits` wires are fixed to |0⟩.
    pub fn random_state(
        &mut self,
        total_qubits: usize,
        ancillary_qubits: usize,
        state_type: StateType,
    ) -> Result<StateVector, EngineError> {
        match state_type {
            StateType::ComputationalBasis => {
                self.random_computational_basis_state(total_qubits, ancillary_qubits)
            }
            StateType::Random1QBasis => Ok(self.random_1q_basis_state(total_qubits, ancillary_qubits)),
            StateType::Stabilizer => self.random_stabilizer_state(total_qubits, ancillary_qubits),
        }
    }

    fn random_computational_basis_state(
        &mut self,
        total_qubits: usize,
        ancillary_qubits: usize,
    ) -> Result<StateVector, EngineError> {
        let random_qubits = total_qubits - ancillary_qubits;
        let mut bits = vec![false; total_qubits];

        if random_qubits <= 63 {
            let max_states = 1u64 << random_qubits;
            if self.generated_basis_states.len() as u64 == max_states {
                return Err(EngineError::RuntimeError(
                    "all unique computational basis states exhausted".into(),
                ));
            }
            let mut candidate = self.rng.gen_range(0..max_states);
            while !self.generated_basis_states.insert(candidate) {
                candidate = self.rng.gen_range(0..max_states);
            }
            for (i, bit) in bits.iter_mut().enumerate().take(random_qubits) {
                *bit = candidate & (1u64 << i) != 0;
            }
        } else {
            // beyond the unique-state bookkeeping range: independent chunks
            let chunks = random_qubits.div_ceil(64);
            let words: Vec<u64> = (0..chunks).map(|_| self.rng.gen()).collect();
            for (i, bit) in bits.iter_mut().enumerate().take(random_qubits) {
                *bit = words[i / 64] & (1u64 << (i % 64)) != 0;
            }
        }

        Ok(StateVector::basis_state(total_qubits, &bits))
    }

    fn random_1q_basis_state(&mut self, total_qubits: usize, ancillary_qubits: usize) -> StateVector {
        let random_qubits = total_qubits - ancillary_qubits;
        let states: Vec<Basis1Q> = (0..total_qubits)
            .map(|q| {
                if q >= random_qubits {
                    Basis1Q::Zero
                } else {
                    match self.rng.gen_range(0..6) {
                        0 => Basis1Q::Zero,
                        1 => Basis1Q::One,
                        2 => Basis1Q::Plus,
                        3 => Basis1Q::Minus,
                        4 => Basis1Q::Right,
                        _ => Basis1Q::Left,
                    }
                }
            })
            .collect();
        StateVector::product_state(&states)
    }

    fn random_stabilizer_state(
        &mut self,
        total_qubits: usize,
        ancillary_qubits: usize,
    ) -> Result<StateVector, EngineError> {
        let random_qubits = total_qubits - ancillary_qubits;
        let depth = ((random_qubits.max(2) as f64).log2().round() as usize).max(1);
        let circuit = random_clifford_circuit(random_qubits, depth, self.rng.gen());

        let mut state = StateVector::zero_state(random_qubits);
        for op in &circuit.ops {
            state.apply(op).map_err(EngineError::from)?;
        }

        if ancillary_qubits == 0 {
            return Ok(state);
        }
        // extend with |0⟩ ancillae on the top wires
        let mut amps = vec![num_complex::Complex64::new(0.0, 0.0); 1 << total_qubits];
        amps[..state.amps.len()].copy_from_slice(&state.amps);
        Ok(StateVector::from_amplitudes(total_qubits, amps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_generation_is_reproducible() {
        let mut a = StateGenerator::new(7);
        let mut b = StateGenerator::new(7);
        for _ in 0..4 {
            let sa = a.random_state(3, 0, StateType::Stabilizer).unwrap();
            let sb = b.random_state(3, 0, StateType::Stabilizer).unwrap();
            assert_eq!(sa.amps, sb.amps);
        }
    }

    #[test]
    fn computational_basis_states_are_unique() {
        let mut generator = StateGenerator::new(11);
        let mut seen = HashSet::new();
        for _ in 0..8 {
            let state = generator
                .random_state(3, 0, StateType::ComputationalBasis)
                .unwrap();
            let index = state
                .amps
                .iter()
                .position(|a| a.norm_sqr() > 0.5)
                .expect("basis state");
            assert!(seen.insert(index), "state {index} drawn twice");
        }
        // all 2^3 unique states have been drawn
        assert!(generator
            .random_state(3, 0, StateType::ComputationalBasis)
            .is_err());
    }

    #[test]
    fn clear_resets_uniqueness_tracking() {
        let mut generator = StateGenerator::new(5);
        for _ in 0..2 {
            generator
                .random_state(1, 0, StateType::ComputationalBasis)
                .unwrap();
        }
        assert!(generator
            .random_state(1, 0, StateType::ComputationalBasis)
            .is_err());
        generator.clear();
        assert!(generator
            .random_state(1, 0, StateType::ComputationalBasis)
            .is_ok());
    }

    #[test]
    fn ancillary_wires_stay_zero() {
        let mut generator = StateGenerator::new(3);
        for state_type in [
            StateType::ComputationalBasis,
            StateType::Random1QBasis,
            StateType::Stabilizer,
        ] {
            let state = generator.random_state(3, 1, state_type).unwrap();
            // amplitudes with the top wire set must vanish
            for idx in 4..8 {
                assert!(
                    state.amps[idx].norm_sqr() < 1e-12,
                    "{state_type}: ancilla wire excited at index {idx}"
                );
            }
        }
    }

    #[test]
    fn stabilizer_states_are_normalized() {
        let mut generator = StateGenerator::new(13);
        let state = generator.random_state(4, 0, StateType::Stabilizer).unwrap();
        let norm: f64 = state.amps.iter().map(|a| a.norm_sqr()).sum();
        assert!((norm - 1.0).abs() < 1e-9);
    }
}
