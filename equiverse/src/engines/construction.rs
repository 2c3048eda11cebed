use std::time::Instant;

use gatewise::{Circuit, Unitary};
use num_complex::Complex64;
use serde_json::json;

use crate::config::Configuration;
use crate::engines::{
    ancillary_mask, net_permutation, non_garbage_qubits, relabeled_unitary_ops,
    states_equal_reduced,
};
use crate::error::EngineError;
use crate::generator::StateGenerator;
use crate::task::{CancelToken, EngineTask};
use crate::verdict::{EngineKind, Verdict};

/// The complete checker: builds the full functionality of both circuits and
/// compares them column by column on the subspace where every ancillary
/// qubit starts in |0⟩.
#[derive(Debug)]
pub struct ConstructionChecker {
    qc1: Circuit,
    qc2: Circuit,
    config: Configuration,
    cancel: Option<CancelToken>,
    equivalence: Verdict,
    runtime: f64,
}

impl ConstructionChecker {
    #[must_use]
    pub fn new(qc1: &Circuit, qc2: &Circuit, config: &Configuration) -> ConstructionChecker {
        ConstructionChecker {
            qc1: qc1.clone(),
            qc2: qc2.clone(),
            config: config.clone(),
            cancel: None,
            equivalence: Verdict::NoInformation,
            runtime: 0.0,
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    fn build_functionality(&self, circ: &Circuit) -> Result<Option<Unitary>, EngineError> {
        let ops = relabeled_unitary_ops(circ)?;
        let mut unitary = Unitary::identity(circ.num_qubits());
        for op in &ops {
            if self.cancelled() {
                return Ok(None);
            }
            unitary.apply_left(op)?;
        }
        // fold the net wire permutation of the layouts into the matrix
        let sigma = net_permutation(circ);
        let as_perm: gatewise::Permutation =
            sigma.iter().enumerate().map(|(l, &s)| (l, s)).collect();
        unitary.apply_output_permutation(&as_perm);
        Ok(Some(unitary))
    }

    /// Compare the two functionalities and derive a verdict.
    fn compare(&self, u1: &Unitary, u2: &Unitary) -> Verdict {
        let tol = self.config.functionality.trace_threshold;
        let anc_mask = ancillary_mask(&self.qc1, &self.qc2);
        let partial = self.config.functionality.check_partial_equivalence
            && (self.qc1.num_garbage_qubits() > 0 || self.qc2.num_garbage_qubits() > 0);
        let keep = non_garbage_qubits(&self.qc1, &self.qc2);

        let mut all_exact = true;
        let mut common_phase: Option<Complex64> = None;

        for col in 0..u1.dim() {
            if col & anc_mask != 0 {
                continue;
            }
            let s1 = u1.column(col);
            let s2 = u2.column(col);

            if partial {
                if !states_equal_reduced(&s1, &s2, &keep, tol) {
                    return Verdict::NotEquivalent;
                }
                continue;
            }

            let overlap = s1.inner(&s2);
            if (overlap - Complex64::new(1.0, 0.0)).norm() < tol {
                match common_phase {
                    None => common_phase = Some(Complex64::new(1.0, 0.0)),
                    Some(phase) if (phase - Complex64::new(1.0, 0.0)).norm() < tol => {}
                    Some(_) => return Verdict::NotEquivalent,
                }
                continue;
            }
            if (overlap.norm() - 1.0).abs() < tol {
                all_exact = false;
                match common_phase {
                    None => common_phase = Some(overlap),
                    Some(phase) if (phase - overlap).norm() < tol => {}
                    Some(_) => return Verdict::NotEquivalent,
                }
                continue;
            }
            return Verdict::NotEquivalent;
        }

        if partial || all_exact {
            Verdict::Equivalent
        } else {
            Verdict::EquivalentUpToGlobalPhase
        }
    }

    /// Run the check in place. Exposed for in-process (sequential) use.
    pub fn execute(&mut self) -> Result<Verdict, EngineError> {
        let start = Instant::now();
        let u1 = self.build_functionality(&self.qc1)?;
        let u2 = self.build_functionality(&self.qc2)?;
        self.equivalence = match (u1, u2) {
            (Some(u1), Some(u2)) => self.compare(&u1, &u2),
            // cancelled mid-construction
            _ => Verdict::NoInformation,
        };
        self.runtime += start.elapsed().as_secs_f64();
        Ok(self.equivalence)
    }

    #[must_use]
    pub fn json_report(&self) -> serde_json::Value {
        json!({
            "checker": "construction",
            "equivalence": self.equivalence.as_str(),
            "runtime": self.runtime,
            "scheme": self.config.application.construction_scheme.as_str(),
        })
    }
}

impl EngineTask for ConstructionChecker {
    fn kind(&self) -> EngineKind {
        EngineKind::Construction
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
        let mut checker = ConstructionChecker::new(qc1, qc2, &config);
        checker.execute().unwrap()
    }

    #[test]
    fn identical_circuits_are_equivalent() {
        let mut a = Circuit::new(1);
        a.h(0);
        assert_eq!(check(&a, &a.clone()), Verdict::Equivalent);
    }

    #[test]
    fn x_and_y_are_not_equivalent() {
        let mut a = Circuit::new(1);
        a.x(0);
        let mut b = Circuit::new(1);
        b.y(0);
        assert_eq!(check(&a, &b), Verdict::NotEquivalent);
    }

    #[test]
    fn global_phase_is_detected() {
        let mut a = Circuit::new(1);
        a.x(0);
        let mut b = Circuit::new(1);
        b.x(0);
        b.gphase(std::f64::consts::FRAC_PI_4);
        assert_eq!(check(&a, &b), Verdict::EquivalentUpToGlobalPhase);
    }

    #[test]
    fn relative_phase_is_not_global() {
        // z differs from identity by a relative phase on |1⟩ only
        let mut a = Circuit::new(1);
        a.z(0);
        let b = Circuit::new(1);
        assert_eq!(check(&a, &b), Verdict::NotEquivalent);
    }

    #[test]
    fn cx_decomposition_is_equivalent() {
        // cx = h(t) · cz · h(t)
        let mut a = Circuit::new(2);
        a.cx(0, 1);
        let mut b = Circuit::new(2);
        b.h(1);
        b.cz(0, 1);
        b.h(1);
        assert_eq!(check(&a, &b), Verdict::Equivalent);
    }

    #[test]
    fn ancillary_zero_subspace_only() {
        // circuits agree when the ancilla (qubit 1) starts in |0⟩ and differ
        // otherwise: a controlled gate on a |0⟩ control never fires
        let mut a = Circuit::new(2);
        a.x(0);
        let mut b = Circuit::new(2);
        b.x(0);
        b.cz(1, 0);
        assert_eq!(check(&a, &b), Verdict::NotEquivalent);

        let mut a_anc = a.clone();
        let mut b_anc = b.clone();
        a_anc.set_logical_qubit_ancillary(1);
        b_anc.set_logical_qubit_ancillary(1);
        assert_eq!(check(&a_anc, &b_anc), Verdict::Equivalent);
    }

    #[test]
    fn partial_equivalence_ignores_garbage_outputs() {
        // circuits differ only by an extra x on the garbage qubit
        let mut a = Circuit::new(2);
        a.h(0);
        let mut b = Circuit::new(2);
        b.h(0);
        b.x(1);

        assert_eq!(check(&a, &b), Verdict::NotEquivalent);

        let mut config = Configuration::default();
        config.functionality.check_partial_equivalence = true;
        let mut a_garbage = a.clone();
        let mut b_garbage = b.clone();
        a_garbage.set_logical_qubit_garbage(1);
        b_garbage.set_logical_qubit_garbage(1);
        let mut checker = ConstructionChecker::new(&a_garbage, &b_garbage, &config);
        assert_eq!(checker.execute().unwrap(), Verdict::Equivalent);
    }

    #[test]
    fn report_names_the_checker() {
        let a = Circuit::new(1);
        let config = Configuration::default();
        let mut checker = ConstructionChecker::new(&a, &a.clone(), &config);
        checker.execute().unwrap();
        let report = checker.json_report();
        assert_eq!(report["checker"], "construction");
        assert_eq!(report["equivalence"], "equivalent");
    }
}
