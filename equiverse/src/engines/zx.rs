use std::collections::HashSet;
use std::f64::consts::TAU;
use std::time::Instant;

use gatewise::{Angle, Circuit, Gate, Operation};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

use crate::config::Configuration;
use crate::engines::{ancillary_mask, net_permutation, relabeled_unitary_ops};
use crate::error::EngineError;
use crate::generator::StateGenerator;
use crate::task::{CancelToken, EngineTask};
use crate::verdict::{EngineKind, Verdict};

/// The ZX-calculus style checker: rewrites the miter of the two circuits
/// towards the identity. Reaching the identity proves equivalence; getting
/// stuck proves nothing, so the negative verdict is only "probably".
///
/// For parameterized circuits the miter is checked at the all-zero
/// instantiation plus a configurable number of random instantiations.
#[derive(Debug)]
pub struct ZxChecker {
    qc1: Circuit,
    qc2: Circuit,
    config: Configuration,
    cancel: Option<CancelToken>,
    equivalence: Verdict,
    runtime: f64,
    performed_instantiations: u64,
}

struct RewriteOutcome {
    reduced: bool,
    global_phase: f64,
}

impl ZxChecker {
    #[must_use]
    pub fn new(qc1: &Circuit, qc2: &Circuit, config: &Configuration) -> ZxChecker {
        ZxChecker {
            qc1: qc1.clone(),
            qc2: qc2.clone(),
            config: config.clone(),
            cancel: None,
            equivalence: Verdict::NoInformation,
            runtime: 0.0,
            performed_instantiations: 0,
        }
    }

    /// A circuit is expressible as a ZX diagram when it is purely unitary
    /// with at most singly-controlled gates.
    #[must_use]
    pub fn transformable(circ: &Circuit) -> bool {
        circ.ops.iter().all(|op| match op {
            Operation::Unitary { controls, .. } => controls.len() <= 1,
            _ => false,
        })
    }

    #[must_use]
    pub fn can_handle(qc1: &Circuit, qc2: &Circuit) -> bool {
        ZxChecker::transformable(qc1) && ZxChecker::transformable(qc2)
    }

    #[must_use]
    pub fn performed_instantiations(&self) -> u64 {
        self.performed_instantiations
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    /// The miter gate list: circuit one followed by the inverted circuit two,
    /// both relabeled onto logical wires.
    fn miter_ops(&self) -> Result<Vec<Operation>, EngineError> {
        let mut ops = relabeled_unitary_ops(&self.qc1)?;
        let ops2 = relabeled_unitary_ops(&self.qc2)?;
        for op in ops2.iter().rev() {
            let inverse = op.inverse().ok_or_else(|| {
                EngineError::InvalidArgument(format!("non-invertible operation: {op}"))
            })?;
            ops.push(inverse);
        }
        Ok(ops)
    }

    /// Cancel the first pair of operations that are mutually inverse and
    /// separated only by operations on disjoint wires.
    fn cancel_one_inverse_pair(ops: &mut Vec<Operation>) -> bool {
        for i in 0..ops.len() {
            let support = ops[i].qubits();
            for j in i + 1..ops.len() {
                let shares_wire = support.iter().any(|&q| ops[j].acts_on(q));
                if !shares_wire {
                    continue;
                }
                if Some(ops[j].clone()) == ops[i].inverse()
                    && ops[j].qubits() == support
                {
                    ops.remove(j);
                    ops.remove(i);
                    return true;
                }
                break;
            }
        }
        false
    }

    /// Merge the first pair of same-axis uncontrolled rotations on the same
    /// wire separated only by disjoint operations.
    fn merge_one_rotation_pair(ops: &mut Vec<Operation>) -> bool {
        for i in 0..ops.len() {
            let Operation::Unitary {
                gate: g1,
                controls: c1,
                targets: t1,
            } = &ops[i]
            else {
                continue;
            };
            if !c1.is_empty() || t1.len() != 1 {
                continue;
            }
            let (Some(axis1), Some(Angle::Fixed(a1))) =
                (g1.rotation_axis(), g1.rotation_angle().cloned())
            else {
                continue;
            };
            let wire = t1[0];
            for j in i + 1..ops.len() {
                if !ops[j].acts_on(wire) {
                    continue;
                }
                let Operation::Unitary {
                    gate: g2,
                    controls: c2,
                    targets: t2,
                } = &ops[j]
                else {
                    break;
                };
                if !c2.is_empty() || t2.len() != 1 {
                    break;
                }
                if g2.rotation_axis() == Some(axis1) {
                    if let Some(Angle::Fixed(a2)) = g2.rotation_angle().cloned() {
                        let merged = match axis1 {
                            'x' => Gate::Rx(Angle::Fixed(a1 + a2)),
                            'y' => Gate::Ry(Angle::Fixed(a1 + a2)),
                            'z' => Gate::Rz(Angle::Fixed(a1 + a2)),
                            _ => Gate::Phase(Angle::Fixed(a1 + a2)),
                        };
                        ops[i] = Operation::unitary(merged, [wire]);
                        ops.remove(j);
                        return true;
                    }
                }
                break;
            }
        }
        false
    }

    /// Rewrite the instantiated miter towards the empty word.
    fn rewrite(&self, mut ops: Vec<Operation>, zero_tolerance: f64) -> RewriteOutcome {
        let mut global_phase = 0.0;
        loop {
            if self.cancelled() {
                return RewriteOutcome {
                    reduced: false,
                    global_phase,
                };
            }
            let before = ops.len();

            // pull out global phases and elide null rotations
            ops.retain(|op| {
                if let Operation::Unitary { gate, controls, .. } = op {
                    if controls.is_empty() {
                        if let Gate::GPhase(Angle::Fixed(theta)) = gate {
                            global_phase += *theta;
                            return false;
                        }
                        if let Some(Angle::Fixed(theta)) = gate.rotation_angle() {
                            if theta.abs() <= zero_tolerance
                                && !matches!(gate, Gate::GPhase(_))
                            {
                                return false;
                            }
                        }
                    }
                }
                true
            });

            while Self::cancel_one_inverse_pair(&mut ops) {}
            while Self::merge_one_rotation_pair(&mut ops) {}

            if ops.len() == before {
                break;
            }
        }
        RewriteOutcome {
            reduced: ops.is_empty(),
            global_phase,
        }
    }

    fn parameter_names(ops: &[Operation]) -> Vec<String> {
        let mut names = HashSet::new();
        for op in ops {
            if let Operation::Unitary { gate, .. } = op {
                if let Some(Angle::Symbolic { name, .. }) = gate.rotation_angle() {
                    names.insert(name.clone());
                }
            }
        }
        let mut sorted: Vec<String> = names.into_iter().collect();
        sorted.sort();
        sorted
    }

    fn verdict_from(&self, outcome: &RewriteOutcome) -> Verdict {
        if !outcome.reduced {
            return Verdict::ProbablyNotEquivalent;
        }
        if ancillary_mask(&self.qc1, &self.qc2) != 0 {
            // with ancillae the reduction only certifies the functionality up
            // to a phase on the ancilla-zero subspace
            return Verdict::EquivalentUpToGlobalPhase;
        }
        let residual = outcome.global_phase.rem_euclid(TAU);
        let tol = self.config.functionality.trace_threshold;
        if residual < tol || (TAU - residual) < tol {
            Verdict::Equivalent
        } else {
            Verdict::EquivalentUpToGlobalPhase
        }
    }

    pub fn execute(&mut self) -> Result<Verdict, EngineError> {
        let start = Instant::now();
        if net_permutation(&self.qc1) != net_permutation(&self.qc2) {
            // a residual wire permutation can never rewrite to the identity
            self.equivalence = Verdict::ProbablyNotEquivalent;
            self.runtime += start.elapsed().as_secs_f64();
            return Ok(self.equivalence);
        }

        let miter = self.miter_ops()?;
        let symbolic = miter.iter().any(Operation::is_symbolic);

        if !symbolic {
            let outcome = self.rewrite(miter, gatewise::tolerance());
            self.equivalence = if self.cancelled() {
                Verdict::NoInformation
            } else {
                self.verdict_from(&outcome)
            };
            self.runtime += start.elapsed().as_secs_f64();
            return Ok(self.equivalence);
        }

        let names = Self::parameter_names(&miter);
        let zero_tolerance = self.config.parameterized.parameterized_tolerance;
        let mut rng = if self.config.simulation.seed == 0 {
            StdRng::from_entropy()
        } else {
            StdRng::seed_from_u64(self.config.simulation.seed)
        };

        let mut verdict = Verdict::NoInformation;
        let runs = 1 + self.config.parameterized.additional_instantiations;
        for instantiation in 0..runs {
            let bindings: std::collections::HashMap<String, f64> = names
                .iter()
                .map(|name| {
                    let value = if instantiation == 0 {
                        0.0
                    } else {
                        rng.gen_range(0.0..TAU)
                    };
                    (name.clone(), value)
                })
                .collect();
            let instantiated: Vec<Operation> =
                miter.iter().map(|op| op.instantiate(&bindings)).collect();
            self.performed_instantiations += 1;

            let outcome = self.rewrite(instantiated, zero_tolerance.max(gatewise::tolerance()));
            if self.cancelled() {
                verdict = Verdict::NoInformation;
                break;
            }
            let this = self.verdict_from(&outcome);
            if this == Verdict::ProbablyNotEquivalent {
                verdict = this;
                break;
            }
            // keep the weakest positive claim across instantiations
            verdict = match (verdict, this) {
                (Verdict::NoInformation, v) => v,
                (Verdict::Equivalent, Verdict::EquivalentUpToGlobalPhase)
                | (Verdict::EquivalentUpToGlobalPhase, _) => {
                    Verdict::EquivalentUpToGlobalPhase
                }
                (v, _) => v,
            };
        }

        self.equivalence = verdict;
        self.runtime += start.elapsed().as_secs_f64();
        Ok(self.equivalence)
    }

    #[must_use]
    pub fn json_report(&self) -> serde_json::Value {
        json!({
            "checker": "zx",
            "equivalence": self.equivalence.as_str(),
            "runtime": self.runtime,
            "performed_instantiations": self.performed_instantiations,
        })
    }
}

impl EngineTask for ZxChecker {
    fn kind(&self) -> EngineKind {
        EngineKind::Zx
    }

    fn run(mut self: Box<Self>) -> Result<Verdict, EngineError> {
        self.execute()
    }

    fn report(&self) -> serde_json::Value {
        self.json_report()
    }

    fn seed(&mut self, _generator: &mut StateGenerator) {}

    fn bind_cancel(&mut self, token: CancelToken) {
        self.cancel = Some(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(qc1: &Circuit, qc2: &Circuit) -> Verdict {
        let config = Configuration::default();
        let mut checker = ZxChecker::new(qc1, qc2, &config);
        checker.execute().unwrap()
    }

    #[test]
    fn identical_circuits_reduce_to_identity() {
        let mut a = Circuit::new(2);
        a.h(0);
        a.cx(0, 1);
        a.rz(0.4, 1);
        assert_eq!(check(&a, &a.clone()), Verdict::Equivalent);
    }

    #[test]
    fn rotation_splits_still_reduce() {
        let mut a = Circuit::new(1);
        a.rz(0.7, 0);
        let mut b = Circuit::new(1);
        b.rz(0.3, 0);
        b.rz(0.4, 0);
        assert_eq!(check(&a, &b), Verdict::Equivalent);
    }

    #[test]
    fn cancellation_commutes_across_disjoint_wires() {
        let mut a = Circuit::new(2);
        a.h(0);
        a.x(1);
        let mut b = Circuit::new(2);
        b.x(1);
        b.h(0);
        assert_eq!(check(&a, &b), Verdict::Equivalent);
    }

    #[test]
    fn different_circuits_are_only_probably_not_equivalent() {
        let mut a = Circuit::new(1);
        a.x(0);
        let mut b = Circuit::new(1);
        b.y(0);
        assert_eq!(check(&a, &b), Verdict::ProbablyNotEquivalent);
    }

    #[test]
    fn global_phase_is_classified() {
        let mut a = Circuit::new(1);
        a.h(0);
        let mut b = Circuit::new(1);
        b.h(0);
        b.gphase(1.0);
        assert_eq!(check(&a, &b), Verdict::EquivalentUpToGlobalPhase);
    }

    #[test]
    fn toffoli_is_not_transformable() {
        let mut a = Circuit::new(3);
        a.push(Operation::controlled(Gate::X, [0, 1], [2]));
        assert!(!ZxChecker::transformable(&a));
        let plain = Circuit::new(3);
        assert!(ZxChecker::can_handle(&plain, &plain.clone()));
        assert!(!ZxChecker::can_handle(&a, &plain));
    }

    #[test]
    fn symbolic_miters_instantiate_and_count() {
        let theta = Angle::Symbolic {
            name: "theta".into(),
            factor: 1.0,
        };
        let mut a = Circuit::new(1);
        a.push(Operation::unitary(Gate::Rz(theta.clone()), [0]));
        let b = a.clone();

        let mut config = Configuration::default();
        config.parameterized.additional_instantiations = 2;
        config.simulation.seed = 17;
        let mut checker = ZxChecker::new(&a, &b, &config);
        assert_eq!(checker.execute().unwrap(), Verdict::Equivalent);
        assert_eq!(checker.performed_instantiations(), 3);
    }

    #[test]
    fn symbolic_mismatch_is_flagged() {
        let theta = Angle::Symbolic {
            name: "theta".into(),
            factor: 1.0,
        };
        let mut a = Circuit::new(1);
        a.push(Operation::unitary(Gate::Rz(theta), [0]));
        let mut b = Circuit::new(1);
        b.h(0);

        let mut config = Configuration::default();
        config.parameterized.additional_instantiations = 1;
        config.simulation.seed = 17;
        let mut checker = ZxChecker::new(&a, &b, &config);
        assert_eq!(
            checker.execute().unwrap(),
            Verdict::ProbablyNotEquivalent
        );
        assert!(checker.performed_instantiations() >= 1);
    }
}
