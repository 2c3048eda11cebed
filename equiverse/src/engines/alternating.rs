use std::time::Instant;

use gatewise::{Circuit, Operation, Permutation, Unitary};
use num_complex::Complex64;
use serde_json::json;

use crate::config::{ApplicationSchemeType, Configuration, GateCosts};
use crate::engines::scheme::GatePacing;
use crate::engines::{net_permutation, relabeled_unitary_ops};
use crate::error::EngineError;
use crate::generator::StateGenerator;
use crate::task::{CancelToken, EngineTask};
use crate::verdict::{EngineKind, Verdict};

/// The alternating checker: interleaves the first circuit's gates with the
/// inverted second circuit's gates so the intermediate product stays close to
/// the identity whenever the circuits are equivalent.
#[derive(Debug)]
pub struct AlternatingChecker {
    qc1: Circuit,
    qc2: Circuit,
    config: Configuration,
    cancel: Option<CancelToken>,
    equivalence: Verdict,
    runtime: f64,
}

impl AlternatingChecker {
    #[must_use]
    pub fn new(qc1: &Circuit, qc2: &Circuit, config: &Configuration) -> AlternatingChecker {
        AlternatingChecker {
            qc1: qc1.clone(),
            qc2: qc2.clone(),
            config: config.clone(),
            cancel: None,
            equivalence: Verdict::NoInformation,
            runtime: 0.0,
        }
    }

    /// The alternating strategy starts from the identity and must end at the
    /// identity, which breaks down when ancillary qubits restrict the valid
    /// input subspace. Those circuits go to the construction checker instead.
    #[must_use]
    pub fn can_handle(qc1: &Circuit, qc2: &Circuit) -> bool {
        qc1.num_ancillary_qubits() == 0 && qc2.num_ancillary_qubits() == 0
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    fn advance(
        miter: &mut Unitary,
        ops: &[Operation],
        cursor: &mut usize,
        count: usize,
        forward: bool,
    ) -> Result<(), EngineError> {
        for _ in 0..count {
            if *cursor >= ops.len() {
                break;
            }
            if forward {
                miter.apply_left(&ops[*cursor])?;
            } else {
                miter.apply_right_inverse(&ops[*cursor])?;
            }
            *cursor += 1;
        }
        Ok(())
    }

    fn execute_lookahead(
        &self,
        miter: &mut Unitary,
        ops1: &[Operation],
        ops2: &[Operation],
    ) -> Result<bool, EngineError> {
        let (mut i, mut j) = (0usize, 0usize);
        while i < ops1.len() || j < ops2.len() {
            if self.cancelled() {
                return Ok(false);
            }
            if i >= ops1.len() {
                miter.apply_right_inverse(&ops2[j])?;
                j += 1;
                continue;
            }
            if j >= ops2.len() {
                miter.apply_left(&ops1[i])?;
                i += 1;
                continue;
            }
            // try both sides, keep whichever stays closer to the identity
            let mut with_left = miter.clone();
            with_left.apply_left(&ops1[i])?;
            let mut with_right = miter.clone();
            with_right.apply_right_inverse(&ops2[j])?;
            if with_left.distance_from_identity() <= with_right.distance_from_identity() {
                *miter = with_left;
                i += 1;
            } else {
                *miter = with_right;
                j += 1;
            }
        }
        Ok(true)
    }

    pub fn execute(&mut self) -> Result<Verdict, EngineError> {
        let start = Instant::now();

        let ops1 = relabeled_unitary_ops(&self.qc1)?;
        let ops2 = relabeled_unitary_ops(&self.qc2)?;
        let n = self.qc1.num_qubits();
        let mut miter = Unitary::identity(n);

        let finished = if self.config.application.alternating_scheme
            == ApplicationSchemeType::Lookahead
        {
            self.execute_lookahead(&mut miter, &ops1, &ops2)?
        } else {
            let costs = match &self.config.application.profile {
                Some(profile) => GateCosts::from_profile(profile)?,
                None => GateCosts::default(),
            };
            let mut pacing = GatePacing::new(
                self.config.application.alternating_scheme,
                ops1.len(),
                ops2.len(),
                costs,
            );
            let (mut i, mut j) = (0usize, 0usize);
            let mut finished = true;
            while i < ops1.len() || j < ops2.len() {
                if self.cancelled() {
                    finished = false;
                    break;
                }
                let (a, b) = pacing.step((ops1.len() - i, ops2.len() - j), ops1.get(i));
                debug_assert!(a + b > 0, "pacing must make progress");
                Self::advance(&mut miter, &ops1, &mut i, a, true)?;
                Self::advance(&mut miter, &ops2, &mut j, b, false)?;
            }
            finished
        };

        if !finished {
            self.equivalence = Verdict::NoInformation;
            self.runtime += start.elapsed().as_secs_f64();
            return Ok(self.equivalence);
        }

        // fold the layout permutations of both sides into the miter
        let sigma1: Permutation = net_permutation(&self.qc1)
            .into_iter()
            .enumerate()
            .collect();
        let sigma2: Permutation = net_permutation(&self.qc2)
            .into_iter()
            .enumerate()
            .collect();
        miter.apply_output_permutation(&sigma1);
        miter.apply_initial_layout(&sigma2);

        let tol = self.config.functionality.trace_threshold;
        self.equivalence = match miter.phase_if_identity(tol) {
            Some(phase) if (phase - Complex64::new(1.0, 0.0)).norm() < tol => Verdict::Equivalent,
            Some(_) => Verdict::EquivalentUpToGlobalPhase,
            None => Verdict::NotEquivalent,
        };
        self.runtime += start.elapsed().as_secs_f64();
        Ok(self.equivalence)
    }

    #[must_use]
    pub fn json_report(&self) -> serde_json::Value {
        json!({
            "checker": "alternating",
            "equivalence": self.equivalence.as_str(),
            "runtime": self.runtime,
            "scheme": self.config.application.alternating_scheme.as_str(),
        })
    }
}

impl EngineTask for AlternatingChecker {
    fn kind(&self) -> EngineKind {
        EngineKind::Alternating
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
