//! The sequential and parallel execution strategies.
//!
//! Both runners feed engine verdicts through the [`crate::lattice`] and stop
//! as soon as a fusion is decisive; they differ only in how engine tasks are
//! scheduled and isolated.

pub(crate) mod parallel;
pub(crate) mod sequential;

use std::time::Duration;

use gatewise::Circuit;

use crate::config::Configuration;
use crate::error::EngineError;
use crate::generator::StateGenerator;
use crate::isolator::{PlatformIsolator, TaskIsolator};
use crate::lattice::FuseContext;
use crate::task::EngineTask;
use crate::verdict::{EngineKind, Verdict};

/// Context for a fusion step, derived from the run's bookkeeping.
pub(crate) fn fuse_context(
    config: &Configuration,
    performed_simulations: u64,
) -> FuseContext {
    let simulations_finished = !config.execution.run_simulation_checker
        || performed_simulations >= config.simulation.max_sims;
    FuseContext {
        simulations_finished,
        only_zx: config.only_zx_checker_configured(),
        only_simulation: config.only_simulation_checker_configured(),
    }
}

/// Run one task in an isolated worker bounded by `timeout`. Used to put a
/// hard deadline on otherwise-sequential work.
pub(crate) fn execute_with_timeout(
    task: Box<dyn EngineTask>,
    timeout: Duration,
) -> Result<Verdict, EngineError> {
    let mut isolator = PlatformIsolator::default();
    if !isolator.spawn(0, task) {
        tracing::error!("failed to spawn a worker for the timed check");
        return Ok(Verdict::NoInformation);
    }

    match isolator.wait_any(Some(timeout)) {
        None => {
            isolator.terminate_all();
            Ok(Verdict::NoInformation)
        }
        Some(outcome) => {
            if let Some(exception) = outcome.exception {
                isolator.terminate_all();
                return Err(exception.into_error("exception in isolated checker"));
            }
            if outcome.completed {
                Ok(outcome.verdict)
            } else {
                Ok(Verdict::NoInformation)
            }
        }
    }
}

/// A whole sequential run packaged as one task, so the manager can bound it
/// with the task isolator. Only the final verdict crosses the boundary;
/// per-trial counters and reports stay in the worker.
pub(crate) struct SequentialRunTask {
    pub qc1: Circuit,
    pub qc2: Circuit,
    pub config: Configuration,
    pub generator: StateGenerator,
}

impl EngineTask for SequentialRunTask {
    fn kind(&self) -> EngineKind {
        // the composite runs several engines; the kind is irrelevant because
        // its verdict is consumed directly, never fused by kind
        EngineKind::Construction
    }

    fn run(self: Box<Self>) -> Result<Verdict, EngineError> {
        let mut this = *self;
        let mut results = crate::results::Results::default();
        sequential::run_sequential(
            &this.qc1,
            &this.qc2,
            &mut this.config,
            &mut this.generator,
            &mut results,
        )
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({ "checker": "sequential" })
    }
}

/// The symbolic flow packaged as one task for the same purpose.
pub(crate) struct SymbolicRunTask {
    pub qc1: Circuit,
    pub qc2: Circuit,
    pub config: Configuration,
}

impl EngineTask for SymbolicRunTask {
    fn kind(&self) -> EngineKind {
        EngineKind::Zx
    }

    fn run(self: Box<Self>) -> Result<Verdict, EngineError> {
        let mut results = crate::results::Results::default();
        sequential::run_symbolic(&self.qc1, &self.qc2, &self.config, &mut results)
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({ "checker": "symbolic" })
    }
}
