//! Single-threaded execution in a fixed priority order.

use gatewise::Circuit;

use crate::config::Configuration;
use crate::engines::{AlternatingChecker, ConstructionChecker, SimulationChecker, ZxChecker};
use crate::error::EngineError;
use crate::generator::StateGenerator;
use crate::lattice::fuse;
use crate::results::Results;
use crate::runner::fuse_context;
use crate::selector;
use crate::verdict::{EngineKind, Verdict};

/// Run the eligible engines one by one: simulation trials first (they find
/// counter-examples fast), then the decision-diagram style checkers, then
/// the ZX reduction. Returns as soon as a fusion is decisive.
pub(crate) fn run_sequential(
    qc1: &Circuit,
    qc2: &Circuit,
    config: &mut Configuration,
    generator: &mut StateGenerator,
    results: &mut Results,
) -> Result<Verdict, EngineError> {
    let only_zx_requested = config.only_zx_checker_configured();
    let plan = selector::plan(config, qc1, qc2);
    let mut current = Verdict::NoInformation;

    if plan.simulations > 0 {
        let mut checker = SimulationChecker::new(qc1, qc2, config);
        while results.performed_simulations < config.simulation.max_sims {
            checker.set_random_initial_state(generator)?;
            results.started_simulations += 1;
            let verdict = checker.execute()?;
            results.performed_simulations += 1;

            if verdict == Verdict::NotEquivalent {
                if let Some(cex) = checker.counter_example() {
                    results.counter_example = Some(cex.clone());
                }
                results.checker_results.push(checker.json_report());
                return Ok(Verdict::NotEquivalent);
            }

            let action = fuse(
                current,
                EngineKind::Simulation,
                verdict,
                fuse_context(config, results.performed_simulations),
            );
            current = action.next;
            if action.decisive {
                results.checker_results.push(checker.json_report());
                return Ok(current);
            }
        }
        results.checker_results.push(checker.json_report());
        if config.only_simulation_checker_configured() {
            return Ok(current);
        }
    }

    if plan.alternating {
        let mut checker = AlternatingChecker::new(qc1, qc2, config);
        let verdict = checker.execute()?;
        results.checker_results.push(checker.json_report());
        let action = fuse(
            current,
            EngineKind::Alternating,
            verdict,
            fuse_context(config, results.performed_simulations),
        );
        current = action.next;
        if action.decisive {
            return Ok(current);
        }
    }

    if plan.construction {
        let mut checker = ConstructionChecker::new(qc1, qc2, config);
        let verdict = checker.execute()?;
        results.checker_results.push(checker.json_report());
        let action = fuse(
            current,
            EngineKind::Construction,
            verdict,
            fuse_context(config, results.performed_simulations),
        );
        current = action.next;
        if action.decisive {
            return Ok(current);
        }
    }

    if plan.zx {
        let mut checker = ZxChecker::new(qc1, qc2, config);
        let verdict = checker.execute()?;
        results.performed_instantiations += checker.performed_instantiations();
        results.checker_results.push(checker.json_report());
        let action = fuse(
            current,
            EngineKind::Zx,
            verdict,
            fuse_context(config, results.performed_simulations),
        );
        current = action.next;
        if verdict == Verdict::NoInformation && config.only_zx_checker_configured() {
            tracing::warn!(
                "only the ZX checker was configured, but it could not conclude anything; \
                 it is not complete in general — consider enabling other checkers"
            );
        }
        if action.decisive {
            return Ok(current);
        }
    } else if only_zx_requested {
        tracing::warn!(
            "only the ZX checker was configured, but the circuits are not ZX-transformable"
        );
        return Ok(Verdict::NoInformation);
    }

    Ok(current)
}

/// The symbolic flow: exactly one ZX task, or nothing.
pub(crate) fn run_symbolic(
    qc1: &Circuit,
    qc2: &Circuit,
    config: &Configuration,
    results: &mut Results,
) -> Result<Verdict, EngineError> {
    if !selector::symbolic_eligible(qc1, qc2) {
        tracing::warn!(
            "parameterized circuits cannot be transformed to ZX diagrams; nothing to run"
        );
        return Ok(Verdict::NoInformation);
    }
    let mut checker = ZxChecker::new(qc1, qc2, config);
    let verdict = checker.execute()?;
    results.performed_instantiations += checker.performed_instantiations();
    results.checker_results.push(checker.json_report());
    Ok(verdict)
}
