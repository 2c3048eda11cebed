//! Engine eligibility: which engines can run on the normalized circuits.

use gatewise::Circuit;

use crate::config::{Configuration, StateType};
use crate::engines::{AlternatingChecker, ZxChecker};

/// The multiset of tasks a run will execute.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct EnginePlan {
    pub alternating: bool,
    pub construction: bool,
    pub zx: bool,
    pub simulations: u64,
}

impl EnginePlan {
    pub(crate) fn task_count(&self) -> u64 {
        u64::from(self.alternating) + u64::from(self.construction) + u64::from(self.zx)
            + self.simulations
    }
}

/// Construction-time reconciliation: downgrade the alternating checker when
/// it cannot handle the circuits, and clamp the number of simulations so no
/// unique computational basis state can be sampled twice.
pub(crate) fn reconcile(config: &mut Configuration, qc1: &Circuit, qc2: &Circuit) {
    if config.execution.run_alternating_checker && !AlternatingChecker::can_handle(qc1, qc2) {
        tracing::warn!(
            "alternating checker cannot handle the circuits; falling back to the construction checker"
        );
        config.execution.run_alternating_checker = false;
        config.execution.run_construction_checker = true;
    }

    if config.execution.run_simulation_checker
        && config.simulation.state_type == StateType::ComputationalBasis
    {
        let nq = qc1.num_qubits_without_ancillae();
        if nq <= 63 {
            let unique_states = 1u64 << nq;
            if config.simulation.max_sims > unique_states {
                config.simulation.max_sims = unique_states;
            }
        }
    }
}

/// Run-time eligibility. Disables the ZX checker in the configuration when
/// the circuits are not ZX-transformable, so the "only ZX" and "only
/// simulation" queries reflect what actually runs.
pub(crate) fn plan(config: &mut Configuration, qc1: &Circuit, qc2: &Circuit) -> EnginePlan {
    if config.execution.run_zx_checker && !ZxChecker::can_handle(qc1, qc2) {
        tracing::warn!("circuits cannot be transformed to ZX diagrams; disabling the ZX checker");
        config.execution.run_zx_checker = false;
    }
    EnginePlan {
        alternating: config.execution.run_alternating_checker,
        construction: config.execution.run_construction_checker,
        zx: config.execution.run_zx_checker,
        simulations: if config.execution.run_simulation_checker {
            config.simulation.max_sims
        } else {
            0
        },
    }
}

/// The symbolic flow runs exactly one ZX task, or nothing at all.
pub(crate) fn symbolic_eligible(qc1: &Circuit, qc2: &Circuit) -> bool {
    ZxChecker::can_handle(qc1, qc2)
}
