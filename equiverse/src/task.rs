use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{EngineError, ExceptionKind};
use crate::generator::StateGenerator;
use crate::verdict::{EngineKind, Verdict};

/// Cooperative stop flag handed to workers on platforms without hard
/// termination. Engines poll it at their natural checkpoints.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// The capability every equivalence engine exposes to the orchestrator.
///
/// A task is self-contained after construction and may be moved to another
/// worker (process or thread). It must not mutate its construction inputs.
pub trait EngineTask: Send {
    /// The proof strategy this task implements.
    fn kind(&self) -> EngineKind;

    /// Run the check to completion.
    fn run(self: Box<Self>) -> Result<Verdict, EngineError>;

    /// Structured metadata about the task and its last run.
    fn report(&self) -> serde_json::Value;

    /// Draw the next stimulus from the shared generator. Only the simulation
    /// engine does anything here; callers invoke it before each trial.
    fn seed(&mut self, generator: &mut StateGenerator) {
        let _ = generator;
    }

    /// Install the cooperative stop flag. Only consulted on platforms where
    /// workers cannot be terminated preemptively.
    fn bind_cancel(&mut self, token: CancelToken) {
        let _ = token;
    }
}

/// Result of one isolated worker, as observed by `wait_any`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskOutcome {
    pub id: u64,
    pub verdict: Verdict,
    /// The worker ran to completion and delivered a verdict.
    pub completed: bool,
    /// The worker was stopped by the deadline.
    pub timed_out: bool,
    /// Exception class reported by the worker, if it failed.
    pub exception: Option<ExceptionKind>,
}

impl TaskOutcome {
    #[must_use]
    pub fn completed(id: u64, verdict: Verdict) -> TaskOutcome {
        TaskOutcome {
            id,
            verdict,
            completed: true,
            timed_out: false,
            exception: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_is_shared() {
        let token = CancelToken::new();
        let observer = token.clone();
        assert!(!observer.is_cancelled());
        token.cancel();
        assert!(observer.is_cancelled());
    }
}
