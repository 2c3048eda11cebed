use std::time::Instant;

use gatewise::{Circuit, StateVector};
use num_complex::Complex64;
use serde_json::json;

use crate::config::Configuration;
use crate::engines::{non_garbage_qubits, run_on_state, states_equal_reduced};
use crate::error::EngineError;
use crate::generator::StateGenerator;
use crate::task::{CancelToken, EngineTask};
use crate::verdict::{EngineKind, Verdict};

/// A witness of non-equivalence: the stimulus and the two diverging outputs.
#[derive(Clone, Debug)]
pub struct CounterExample {
    pub input: StateVector,
    pub output1: StateVector,
    pub output2: StateVector,
}

/// The simulation checker: runs both circuits on one random stimulus and
/// compares the outputs by fidelity. A mismatch disproves equivalence; a
/// match is only evidence, never proof.
#[derive(Debug)]
pub struct SimulationChecker {
    qc1: Circuit,
    qc2: Circuit,
    config: Configuration,
    initial_state: Option<StateVector>,
    counter_example: Option<CounterExample>,
    cancel: Option<CancelToken>,
    equivalence: Verdict,
    runtime: f64,
}

impl SimulationChecker {
    #[must_use]
    pub fn new(qc1: &Circuit, qc2: &Circuit, config: &Configuration) -> SimulationChecker {
        SimulationChecker {
            qc1: qc1.clone(),
            qc2: qc2.clone(),
            config: config.clone(),
            initial_state: None,
            counter_example: None,
            cancel: None,
            equivalence: Verdict::NoInformation,
            runtime: 0.0,
        }
    }

    /// Draw the stimulus for the next trial from the shared generator.
    pub fn set_random_initial_state(
        &mut self,
        generator: &mut StateGenerator,
    ) -> Result<(), EngineError> {
        let total = self.qc1.num_qubits();
        let ancillary = self
            .qc1
            .num_ancillary_qubits()
            .max(self.qc2.num_ancillary_qubits());
        let state =
            generator.random_state(total, ancillary, self.config.simulation.state_type)?;
        self.initial_state = Some(state);
        Ok(())
    }

    /// The counter-example witnessed by the last failing trial, if any.
    ///
    /// Lives only in this process; it does not survive the isolation
    /// boundary in parallel mode.
    #[must_use]
    pub fn counter_example(&self) -> Option<&CounterExample> {
        self.counter_example.as_ref()
    }

    pub fn execute(&mut self) -> Result<Verdict, EngineError> {
        let start = Instant::now();
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            self.equivalence = Verdict::NoInformation;
            return Ok(self.equivalence);
        }

        let input = self.initial_state.clone().ok_or_else(|| {
            EngineError::LogicError("simulation trial started without a stimulus".into())
        })?;

        let output1 = run_on_state(&self.qc1, &input)?;
        let output2 = run_on_state(&self.qc2, &input)?;

        let threshold = self.config.simulation.fidelity_threshold;
        let garbage_present =
            self.qc1.num_garbage_qubits() > 0 || self.qc2.num_garbage_qubits() > 0;

        self.equivalence = if self.config.functionality.check_partial_equivalence
            && garbage_present
        {
            let keep = non_garbage_qubits(&self.qc1, &self.qc2);
            if states_equal_reduced(&output1, &output2, &keep, threshold) {
                Verdict::ProbablyEquivalent
            } else {
                Verdict::NotEquivalent
            }
        } else {
            let overlap = output1.inner(&output2);
            if (overlap - Complex64::new(1.0, 0.0)).norm() < threshold {
                Verdict::Equivalent
            } else if (overlap.norm_sqr() - 1.0).abs() < threshold {
                // phase-only difference on this stimulus; evidence, not proof
                Verdict::ProbablyEquivalent
            } else {
                Verdict::NotEquivalent
            }
        };

        if self.equivalence == Verdict::NotEquivalent {
            self.counter_example = Some(CounterExample {
                input,
                output1,
                output2,
            });
        }

        self.runtime += start.elapsed().as_secs_f64();
        Ok(self.equivalence)
    }

    #[must_use]
    pub fn json_report(&self) -> serde_json::Value {
        json!({
            "checker": "simulation",
            "equivalence": self.equivalence.as_str(),
            "runtime": self.runtime,
            "state_type": self.config.simulation.state_type.as_str(),
        })
    }
}

impl EngineTask for SimulationChecker {
    fn kind(&self) -> EngineKind {
        EngineKind::Simulation
    }

    fn run(mut self: Box<Self>) -> Result<Verdict, EngineError> {
        self.execute()
    }

    fn report(&self) -> serde_json::Value {
        self.json_report()
    }

    fn seed(&mut self, generator: &mut StateGenerator) {
        // exhaustion of unique stimuli is prevented by the manager's clamp;
        // a failure here surfaces as a missing stimulus in execute()
        let _ = self.set_random_initial_state(generator);
    }

    fn bind_cancel(&mut self, token: CancelToken) {
        self.cancel = Some(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StateType;

    fn run_trial(qc1: &Circuit, qc2: &Circuit, state_type: StateType, seed: u64) -> Verdict {
        let mut config = Configuration::default();
        config.simulation.state_type = state_type;
        let mut generator = StateGenerator::new(seed);
        let mut checker = SimulationChecker::new(qc1, qc2, &config);
        checker.set_random_initial_state(&mut generator).unwrap();
        checker.execute().unwrap()
    }

    #[test]
    fn identical_circuits_match_on_any_stimulus() {
        let mut a = Circuit::new(2);
        a.h(0);
        a.cx(0, 1);
        for state_type in [
            StateType::ComputationalBasis,
            StateType::Random1QBasis,
            StateType::Stabilizer,
        ] {
            for seed in 1..4 {
                assert_eq!(
                    run_trial(&a, &a.clone(), state_type, seed),
                    Verdict::Equivalent
                );
            }
        }
    }

    #[test]
    fn x_versus_y_is_caught_and_witnessed() {
        let mut a = Circuit::new(1);
        a.x(0);
        let mut b = Circuit::new(1);
        b.y(0);

        let mut config = Configuration::default();
        let mut generator = StateGenerator::new(3);
        let mut checker = SimulationChecker::new(&a, &b, &config);
        checker.set_random_initial_state(&mut generator).unwrap();
        // x and y differ by a phase on basis states; pick a stimulus that
        // exposes the relative phase
        config.simulation.state_type = StateType::Random1QBasis;

        // computational stimuli see only a phase difference
        let verdict = checker.execute().unwrap();
        assert_ne!(verdict, Verdict::NotEquivalent);

        // superposition stimuli expose it
        let mut caught = false;
        let mut gen2 = StateGenerator::new(5);
        for _ in 0..16 {
            let mut trial = SimulationChecker::new(&a, &b, &config);
            trial.set_random_initial_state(&mut gen2).unwrap();
            if trial.execute().unwrap() == Verdict::NotEquivalent {
                assert!(trial.counter_example().is_some());
                caught = true;
                break;
            }
        }
        assert!(caught, "no stimulus exposed x vs y");
    }

    #[test]
    fn missing_stimulus_is_a_logic_error() {
        let a = Circuit::new(1);
        let config = Configuration::default();
        let mut checker = SimulationChecker::new(&a, &a.clone(), &config);
        assert!(matches!(
            checker.execute(),
            Err(EngineError::LogicError(_))
        ));
    }

    #[test]
    fn garbage_qubits_are_ignored_under_partial_equivalence() {
        let mut a = Circuit::new(2);
        a.x(0);
        let mut b = Circuit::new(2);
        b.x(0);
        b.z(1);
        b.x(1);

        let mut config = Configuration::default();
        config.functionality.check_partial_equivalence = true;
        config.simulation.state_type = StateType::Stabilizer;
        a.set_logical_qubit_garbage(1);
        b.set_logical_qubit_garbage(1);

        let mut generator = StateGenerator::new(9);
        let mut checker = SimulationChecker::new(&a, &b, &config);
        checker.set_random_initial_state(&mut generator).unwrap();
        let verdict = checker.execute().unwrap();
        assert_ne!(verdict, Verdict::NotEquivalent);
    }
}
