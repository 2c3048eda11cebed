//! The verdict fusion lattice.
//!
//! A single pure function decides how a freshly reported engine verdict
//! combines with the verdict accumulated so far, and whether the combination
//! is decisive (no further engine can change it). Both runners share this
//! function, which is what keeps their semantics aligned without sharing
//! control flow.

use crate::verdict::{EngineKind, Verdict};

/// Result of fusing one engine verdict into the accumulated one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FuseAction {
    pub next: Verdict,
    pub decisive: bool,
}

impl FuseAction {
    fn decided(next: Verdict) -> FuseAction {
        FuseAction {
            next,
            decisive: true,
        }
    }

    fn open(next: Verdict) -> FuseAction {
        FuseAction {
            next,
            decisive: false,
        }
    }
}

/// Run-state the lattice needs but does not own. The runners keep the
/// counters; the lattice stays free of I/O and state.
#[derive(Clone, Copy, Debug, Default)]
pub struct FuseContext {
    /// Every configured simulation trial has completed (including the one
    /// whose verdict is being fused, if it is a simulation).
    pub simulations_finished: bool,
    /// The ZX engine is the only one configured.
    pub only_zx: bool,
    /// The simulation engine is the only one configured.
    pub only_simulation: bool,
}

/// Fuse a new engine verdict into the current one. Rules apply in order.
#[must_use]
pub fn fuse(current: Verdict, kind: EngineKind, new: Verdict, ctx: FuseContext) -> FuseAction {
    let complete_checker = matches!(kind, EngineKind::Construction | EngineKind::Alternating);

    // 1. Non-equivalence from any sound engine is final.
    if new == Verdict::NotEquivalent {
        return FuseAction::decided(Verdict::NotEquivalent);
    }

    // 2./3. The complete checkers settle equivalence outright.
    if complete_checker && new == Verdict::Equivalent {
        return FuseAction::decided(Verdict::Equivalent);
    }
    if complete_checker && new == Verdict::EquivalentUpToGlobalPhase {
        return FuseAction::decided(Verdict::EquivalentUpToGlobalPhase);
    }

    if kind == EngineKind::Zx {
        // 4. Equivalence claims from the ZX engine are trustworthy.
        if matches!(
            new,
            Verdict::Equivalent | Verdict::EquivalentUpToGlobalPhase
        ) {
            return FuseAction::decided(new);
        }

        // 5. "Probably not equivalent" is weighed against the simulations.
        if new == Verdict::ProbablyNotEquivalent {
            if current == Verdict::ProbablyEquivalent {
                if ctx.simulations_finished {
                    // contradictory evidence, give up
                    return FuseAction::decided(Verdict::NoInformation);
                }
                return FuseAction::open(Verdict::ProbablyNotEquivalent);
            }
            if current == Verdict::NoInformation && ctx.only_zx {
                return FuseAction::decided(Verdict::ProbablyNotEquivalent);
            }
            return FuseAction::open(Verdict::ProbablyNotEquivalent);
        }
    }

    // 6. A passing simulation trial raises confidence, unless it contradicts
    //    a standing ZX suspicion after the last trial.
    if kind == EngineKind::Simulation
        && matches!(new, Verdict::Equivalent | Verdict::ProbablyEquivalent)
    {
        if current == Verdict::ProbablyNotEquivalent && ctx.simulations_finished {
            return FuseAction::decided(Verdict::NoInformation);
        }
        return FuseAction {
            next: Verdict::ProbablyEquivalent,
            decisive: ctx.only_simulation && ctx.simulations_finished,
        };
    }

    // 7. A non-ZX engine reporting nothing keeps the state.
    if new == Verdict::NoInformation && kind != EngineKind::Zx {
        return FuseAction::open(current);
    }

    // 8. Everything else leaves the accumulated verdict untouched.
    FuseAction::open(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const KINDS: [EngineKind; 4] = [
        EngineKind::Construction,
        EngineKind::Simulation,
        EngineKind::Alternating,
        EngineKind::Zx,
    ];

    fn ctx() -> FuseContext {
        FuseContext::default()
    }

    #[test]
    fn not_equivalent_short_circuits_from_any_engine() {
        for kind in KINDS {
            for current in Verdict::ALL {
                let action = fuse(current, kind, Verdict::NotEquivalent, ctx());
                assert_eq!(action, FuseAction::decided(Verdict::NotEquivalent));
            }
        }
    }

    #[test]
    fn complete_checkers_settle_equivalence() {
        for kind in [EngineKind::Construction, EngineKind::Alternating] {
            assert_eq!(
                fuse(Verdict::NoInformation, kind, Verdict::Equivalent, ctx()),
                FuseAction::decided(Verdict::Equivalent)
            );
            assert_eq!(
                fuse(
                    Verdict::ProbablyNotEquivalent,
                    kind,
                    Verdict::EquivalentUpToGlobalPhase,
                    ctx()
                ),
                FuseAction::decided(Verdict::EquivalentUpToGlobalPhase)
            );
        }
    }

    #[test]
    fn zx_equivalence_claims_are_decisive() {
        assert_eq!(
            fuse(Verdict::NoInformation, EngineKind::Zx, Verdict::Equivalent, ctx()),
            FuseAction::decided(Verdict::Equivalent)
        );
        assert_eq!(
            fuse(
                Verdict::ProbablyEquivalent,
                EngineKind::Zx,
                Verdict::EquivalentUpToGlobalPhase,
                ctx()
            ),
            FuseAction::decided(Verdict::EquivalentUpToGlobalPhase)
        );
    }

    #[test]
    fn zx_suspicion_against_finished_simulations_collapses() {
        let context = FuseContext {
            simulations_finished: true,
            ..ctx()
        };
        assert_eq!(
            fuse(
                Verdict::ProbablyEquivalent,
                EngineKind::Zx,
                Verdict::ProbablyNotEquivalent,
                context
            ),
            FuseAction::decided(Verdict::NoInformation)
        );
    }

    #[test]
    fn zx_suspicion_with_pending_simulations_keeps_running() {
        assert_eq!(
            fuse(
                Verdict::ProbablyEquivalent,
                EngineKind::Zx,
                Verdict::ProbablyNotEquivalent,
                ctx()
            ),
            FuseAction::open(Verdict::ProbablyNotEquivalent)
        );
    }

    #[test]
    fn lone_zx_suspicion_is_decisive() {
        let context = FuseContext {
            only_zx: true,
            ..ctx()
        };
        assert_eq!(
            fuse(
                Verdict::NoInformation,
                EngineKind::Zx,
                Verdict::ProbablyNotEquivalent,
                context
            ),
            FuseAction::decided(Verdict::ProbablyNotEquivalent)
        );
        // with other engines around it stays open
        assert_eq!(
            fuse(
                Verdict::NoInformation,
                EngineKind::Zx,
                Verdict::ProbablyNotEquivalent,
                ctx()
            ),
            FuseAction::open(Verdict::ProbablyNotEquivalent)
        );
    }

    #[test]
    fn simulation_success_raises_confidence() {
        let action = fuse(
            Verdict::NoInformation,
            EngineKind::Simulation,
            Verdict::Equivalent,
            ctx(),
        );
        assert_eq!(action, FuseAction::open(Verdict::ProbablyEquivalent));
    }

    #[test]
    fn last_simulation_under_sim_only_config_is_decisive() {
        let context = FuseContext {
            simulations_finished: true,
            only_simulation: true,
            ..ctx()
        };
        let action = fuse(
            Verdict::ProbablyEquivalent,
            EngineKind::Simulation,
            Verdict::Equivalent,
            context,
        );
        assert_eq!(action, FuseAction::decided(Verdict::ProbablyEquivalent));
    }

    #[test]
    fn simulation_against_standing_zx_suspicion_collapses_when_done() {
        let context = FuseContext {
            simulations_finished: true,
            ..ctx()
        };
        assert_eq!(
            fuse(
                Verdict::ProbablyNotEquivalent,
                EngineKind::Simulation,
                Verdict::Equivalent,
                context
            ),
            FuseAction::decided(Verdict::NoInformation)
        );
    }

    #[test]
    fn no_information_from_dd_engines_keeps_current() {
        for kind in [
            EngineKind::Construction,
            EngineKind::Alternating,
            EngineKind::Simulation,
        ] {
            let action = fuse(
                Verdict::ProbablyEquivalent,
                kind,
                Verdict::NoInformation,
                ctx(),
            );
            assert_eq!(action, FuseAction::open(Verdict::ProbablyEquivalent));
        }
    }

    proptest! {
        /// Rule 1 dominates every state and context.
        #[test]
        fn not_equivalent_dominates(
            current_idx in 0usize..7,
            kind_idx in 0usize..4,
            sims_done in any::<bool>(),
            only_zx in any::<bool>(),
            only_sim in any::<bool>(),
        ) {
            let action = fuse(
                Verdict::ALL[current_idx],
                KINDS[kind_idx],
                Verdict::NotEquivalent,
                FuseContext {
                    simulations_finished: sims_done,
                    only_zx,
                    only_simulation: only_sim,
                },
            );
            prop_assert_eq!(action.next, Verdict::NotEquivalent);
            prop_assert!(action.decisive);
        }

        /// The lattice never resurrects certainty: a decisive fusion of two
        /// decisive inputs yields the same verdict regardless of order, for
        /// the order-independent decisive rules (1, 2, 3, 4).
        #[test]
        fn decisive_rules_ignore_current(
            current_idx in 0usize..7,
        ) {
            let current = Verdict::ALL[current_idx];
            for (kind, new) in [
                (EngineKind::Construction, Verdict::Equivalent),
                (EngineKind::Alternating, Verdict::EquivalentUpToGlobalPhase),
                (EngineKind::Zx, Verdict::Equivalent),
                (EngineKind::Zx, Verdict::EquivalentUpToGlobalPhase),
            ] {
                let action = fuse(current, kind, new, FuseContext::default());
                prop_assert_eq!(action.next, new);
                prop_assert!(action.decisive);
            }
        }
    }
}
