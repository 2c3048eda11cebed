//! The manager facade: owns the normalized circuits, the configuration, and
//! the results of a run.

use std::time::{Duration, Instant};

use gatewise::{set_tolerance, Circuit};

use crate::config::{ApplicationSchemeType, Configuration, CostProfile};
use crate::error::EngineError;
use crate::generator::StateGenerator;
use crate::normalize;
use crate::results::Results;
use crate::runner::{
    execute_with_timeout, parallel, sequential, SequentialRunTask, SymbolicRunTask,
};
use crate::selector;
use crate::verdict::Verdict;

/// Coordinates the portfolio of equivalence engines for one circuit pair.
///
/// Construction captures and normalizes both circuits; [`run`](Self::run)
/// dispatches to the sequential or parallel strategy and fills in the
/// [`Results`].
#[derive(Debug)]
pub struct EquivalenceCheckingManager {
    qc1: Circuit,
    qc2: Circuit,
    configuration: Configuration,
    state_generator: StateGenerator,
    results: Results,
    symbolic: bool,
}

impl EquivalenceCheckingManager {
    /// Capture, preprocess, and reconcile the two circuits.
    ///
    /// Runs the configured optimization passes (variable-free circuits
    /// only), strips idle qubits, reconciles width differences as ancillae,
    /// and applies the construction-time selector rules.
    pub fn new(
        circ1: &Circuit,
        circ2: &Circuit,
        config: Configuration,
    ) -> Result<EquivalenceCheckingManager, EngineError> {
        let start = Instant::now();
        let mut configuration = config;

        set_tolerance(configuration.execution.numerical_tolerance);

        let mut qc1 = circ1.clone();
        let mut qc2 = circ2.clone();
        let variable_free = qc1.is_variable_free() && qc2.is_variable_free();

        if variable_free {
            normalize::run_optimization_passes(&mut qc1, &mut qc2, &configuration.optimizations)?;
        }
        normalize::strip_idle_qubits(&mut qc1, &mut qc2)?;
        normalize::setup_ancillaries_and_garbage(&mut qc1, &mut qc2);

        if qc1.num_qubits_without_ancillae() != qc2.num_qubits_without_ancillae() {
            tracing::warn!(
                "circuits have different numbers of primary inputs; proceed with caution"
            );
        }

        if configuration.execution.set_all_ancillae_garbage {
            for q in 0..qc1.num_qubits() {
                if qc1.is_ancillary(q) {
                    qc1.set_logical_qubit_garbage(q);
                }
            }
            for q in 0..qc2.num_qubits() {
                if qc2.is_ancillary(q) {
                    qc2.set_logical_qubit_garbage(q);
                }
            }
        }

        selector::reconcile(&mut configuration, &qc1, &qc2);

        let state_generator = StateGenerator::new(configuration.simulation.seed);

        let results = Results {
            preprocessing_time: start.elapsed().as_secs_f64(),
            ..Results::default()
        };

        Ok(EquivalenceCheckingManager {
            qc1,
            qc2,
            configuration,
            state_generator,
            results,
            symbolic: !variable_free,
        })
    }

    /// Execute the equivalence check.
    pub fn run(&mut self) -> Result<(), EngineError> {
        self.results.equivalence = Verdict::NoInformation;

        let garbage_present =
            self.qc1.num_garbage_qubits() > 0 || self.qc2.num_garbage_qubits() > 0;

        if !self.configuration.anything_to_execute() {
            tracing::warn!("nothing to execute; check the configuration");
            return Ok(());
        }

        if self.qc1.is_empty() && self.qc2.is_empty() {
            self.results.equivalence = Verdict::Equivalent;
            return Ok(());
        }

        if self.symbolic {
            self.check_symbolic()?;
        } else if !self.configuration.execution.parallel
            || self.configuration.execution.nthreads <= 1
            || self.configuration.only_single_task()
        {
            self.check_sequential()?;
        } else {
            self.check_parallel()?;
        }

        if !self.configuration.functionality.check_partial_equivalence
            && garbage_present
            && self.results.equivalence == Verdict::NotEquivalent
        {
            tracing::warn!(
                "at least one circuit has garbage qubits, but partial equivalence checking \
                 is turned off; enable it to take the garbage qubits into account"
            );
        }
        Ok(())
    }

    fn timeout(&self) -> Option<Duration> {
        (self.configuration.execution.timeout_seconds > 0.0)
            .then(|| Duration::from_secs_f64(self.configuration.execution.timeout_seconds))
    }

    fn check_sequential(&mut self) -> Result<(), EngineError> {
        let start = Instant::now();

        self.results.equivalence = match self.timeout() {
            None => sequential::run_sequential(
                &self.qc1,
                &self.qc2,
                &mut self.configuration,
                &mut self.state_generator,
                &mut self.results,
            )?,
            Some(timeout) => {
                // bound the whole sequential run with one isolated worker;
                // per-trial counters and reports stay behind in the worker
                let task = SequentialRunTask {
                    qc1: self.qc1.clone(),
                    qc2: self.qc2.clone(),
                    config: self.configuration.clone(),
                    generator: self.state_generator.clone(),
                };
                execute_with_timeout(Box::new(task), timeout)?
            }
        };

        self.results.check_time = start.elapsed().as_secs_f64();
        Ok(())
    }

    fn check_parallel(&mut self) -> Result<(), EngineError> {
        let start = Instant::now();
        let outcome = parallel::run_parallel(
            &self.qc1,
            &self.qc2,
            &mut self.configuration,
            &mut self.state_generator,
            &mut self.results,
        );
        self.results.check_time = start.elapsed().as_secs_f64();
        outcome
    }

    fn check_symbolic(&mut self) -> Result<(), EngineError> {
        let start = Instant::now();

        self.results.equivalence = match self.timeout() {
            None => sequential::run_symbolic(
                &self.qc1,
                &self.qc2,
                &self.configuration,
                &mut self.results,
            )?,
            Some(timeout) => {
                let task = SymbolicRunTask {
                    qc1: self.qc1.clone(),
                    qc2: self.qc2.clone(),
                    config: self.configuration.clone(),
                };
                execute_with_timeout(Box::new(task), timeout)?
            }
        };

        self.results.check_time = start.elapsed().as_secs_f64();
        Ok(())
    }

    /// The final verdict of the last run.
    #[must_use]
    pub fn equivalence(&self) -> Verdict {
        self.results.equivalence
    }

    /// The results of the last run.
    #[must_use]
    pub fn results(&self) -> &Results {
        &self.results
    }

    /// Mutable access to the configuration, for adjustments before `run`.
    pub fn configuration(&mut self) -> &mut Configuration {
        &mut self.configuration
    }

    /// The first circuit after normalization.
    #[must_use]
    pub fn first_circuit(&self) -> &Circuit {
        &self.qc1
    }

    /// The second circuit after normalization.
    #[must_use]
    pub fn second_circuit(&self) -> &Circuit {
        &self.qc2
    }

    /// Forget all results and generator state, keeping the circuits.
    pub fn reset(&mut self) {
        self.state_generator.clear();
        self.results = Results::default();
    }

    /// Disable every checker.
    pub fn disable_all_checkers(&mut self) {
        self.configuration.execution.run_construction_checker = false;
        self.configuration.execution.run_zx_checker = false;
        self.configuration.execution.run_simulation_checker = false;
        self.configuration.execution.run_alternating_checker = false;
    }

    /// Set the application scheme for every checker that supports one.
    pub fn set_application_scheme(&mut self, scheme: ApplicationSchemeType) {
        self.configuration.application.construction_scheme = scheme;
        self.configuration.application.simulation_scheme = scheme;
        self.configuration.application.alternating_scheme = scheme;
    }

    /// Install a gate-cost profile, forcing the gate-cost scheme everywhere.
    pub fn set_gate_cost_profile(&mut self, profile: CostProfile) {
        self.set_application_scheme(ApplicationSchemeType::GateCost);
        self.configuration.application.profile = Some(profile);
    }
}
