//! Concurrent execution through the task isolator.
//!
//! Workers are spawned in a fixed order (alternating, construction, ZX, then
//! simulation trials) up to the effective worker budget, verdicts are fused
//! in completion order, and finished simulation slots are refilled until the
//! trial budget is exhausted. Every decisive fusion rule is order
//! independent, which is what makes the completion-order fusion sound.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use gatewise::Circuit;

use crate::config::Configuration;
use crate::engines::{AlternatingChecker, ConstructionChecker, SimulationChecker, ZxChecker};
use crate::error::EngineError;
use crate::generator::StateGenerator;
use crate::isolator::{PlatformIsolator, TaskIsolator};
use crate::lattice::fuse;
use crate::results::Results;
use crate::runner::fuse_context;
use crate::selector;
use crate::task::EngineTask;
use crate::verdict::{EngineKind, Verdict};

/// Build a fresh simulation trial, drawing its stimulus from the shared
/// generator before the task leaves this process.
fn make_simulation_task(
    qc1: &Circuit,
    qc2: &Circuit,
    config: &Configuration,
    generator: &mut StateGenerator,
) -> Result<Box<dyn EngineTask>, EngineError> {
    let mut task = SimulationChecker::new(qc1, qc2, config);
    task.set_random_initial_state(generator)?;
    Ok(Box::new(task))
}

pub(crate) fn run_parallel(
    qc1: &Circuit,
    qc2: &Circuit,
    config: &mut Configuration,
    generator: &mut StateGenerator,
    results: &mut Results,
) -> Result<(), EngineError> {
    let deadline = (config.execution.timeout_seconds > 0.0)
        .then(|| Instant::now() + Duration::from_secs_f64(config.execution.timeout_seconds));

    let plan = selector::plan(config, qc1, qc2);
    let max_workers = u64::from(config.execution.nthreads.max(1));
    if let Ok(available) = std::thread::available_parallelism() {
        if max_workers > available.get() as u64 {
            tracing::warn!(
                "requesting more workers than the platform reports cores; \
                 over-subscription may hurt performance"
            );
        }
    }
    let effective = max_workers.min(plan.task_count());

    let mut isolator = PlatformIsolator::default();
    let mut kinds: HashMap<u64, EngineKind> = HashMap::new();
    let mut next_id = 0u64;

    let enqueue = |isolator: &mut PlatformIsolator,
                       kinds: &mut HashMap<u64, EngineKind>,
                       next_id: &mut u64,
                       kind: EngineKind,
                       task: Box<dyn EngineTask>|
     -> bool {
        let id = *next_id;
        if isolator.spawn(id, task) {
            kinds.insert(id, kind);
            *next_id += 1;
            true
        } else {
            tracing::error!("failed to spawn {kind} worker");
            false
        }
    };

    if plan.alternating {
        enqueue(
            &mut isolator,
            &mut kinds,
            &mut next_id,
            EngineKind::Alternating,
            Box::new(AlternatingChecker::new(qc1, qc2, config)),
        );
    }
    if plan.construction {
        enqueue(
            &mut isolator,
            &mut kinds,
            &mut next_id,
            EngineKind::Construction,
            Box::new(ConstructionChecker::new(qc1, qc2, config)),
        );
    }
    if plan.zx {
        enqueue(
            &mut isolator,
            &mut kinds,
            &mut next_id,
            EngineKind::Zx,
            Box::new(ZxChecker::new(qc1, qc2, config)),
        );
    }
    if plan.simulations > 0 {
        let slots_left = effective.saturating_sub(isolator.running() as u64);
        let to_start = slots_left.min(plan.simulations);
        for _ in 0..to_start {
            let task = make_simulation_task(qc1, qc2, config, generator)?;
            if enqueue(
                &mut isolator,
                &mut kinds,
                &mut next_id,
                EngineKind::Simulation,
                task,
            ) {
                results.started_simulations += 1;
            }
        }
    }

    while isolator.running() > 0 {
        let remaining = match deadline {
            None => None,
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    isolator.terminate_all();
                    return Ok(());
                }
                Some(deadline - now)
            }
        };

        let Some(outcome) = isolator.wait_any(remaining) else {
            // deadline elapsed; keep whatever has been accumulated
            isolator.terminate_all();
            return Ok(());
        };

        if let Some(exception) = outcome.exception {
            isolator.terminate_all();
            return Err(exception.into_error("exception in parallel checker"));
        }

        if !outcome.completed {
            tracing::warn!(id = outcome.id, "worker did not complete");
            continue;
        }

        let Some(kind) = kinds.get(&outcome.id).copied() else {
            tracing::warn!(id = outcome.id, "outcome from an unknown worker");
            continue;
        };

        if kind == EngineKind::Zx
            && outcome.verdict == Verdict::NoInformation
            && config.only_zx_checker_configured()
        {
            tracing::warn!(
                "only the ZX checker was configured, but it could not conclude anything; \
                 it is not complete in general — consider enabling other checkers"
            );
        }

        if kind == EngineKind::Simulation {
            results.performed_simulations += 1;
        }

        let action = fuse(
            results.equivalence,
            kind,
            outcome.verdict,
            fuse_context(config, results.performed_simulations),
        );
        results.equivalence = action.next;
        if action.decisive {
            isolator.terminate_all();
            return Ok(());
        }

        // refill the simulation slot when trials remain
        if kind == EngineKind::Simulation
            && results.performed_simulations < config.simulation.max_sims
            && results.started_simulations < config.simulation.max_sims
            && (isolator.running() as u64) < effective
        {
            let task = make_simulation_task(qc1, qc2, config, generator)?;
            if enqueue(
                &mut isolator,
                &mut kinds,
                &mut next_id,
                EngineKind::Simulation,
                task,
            ) {
                results.started_simulations += 1;
            }
        }
    }

    isolator.terminate_all();
    Ok(())
}
