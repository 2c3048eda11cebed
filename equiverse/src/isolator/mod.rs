//! Isolated execution of engine tasks with hard timeouts.
//!
//! The same contract is realized twice:
//!
//! - [`process::ProcessIsolator`] (POSIX): every task runs in a forked child
//!   connected through a pipe. Termination is preemptive (SIGTERM, then
//!   SIGKILL), so deadlines are hard.
//! - [`threaded::ThreadIsolator`] (everywhere): tasks run on threads with a
//!   cooperative stop flag. Workers cannot be killed mid-operation, so
//!   deadlines are honored only between engine checkpoints. This is a
//!   documented correctness boundary of the platform, not a bug.
//!
//! Only `(verdict code, exception code)` crosses the isolation boundary —
//! two native-endian 32-bit integers. Counter-examples and reports stay in
//! the worker and are deliberately not transported.

#[cfg(unix)]
pub mod process;
pub mod threaded;

use std::time::Duration;

use crate::error::{EngineError, ExceptionKind};
use crate::task::{EngineTask, TaskOutcome};
use crate::verdict::Verdict;

/// A pool of isolated workers, each running one engine task.
pub trait TaskIsolator {
    /// Start a worker for `task`, keyed by `id`. Returns false when the
    /// worker could not be created.
    fn spawn(&mut self, id: u64, task: Box<dyn EngineTask>) -> bool;

    /// Block until any worker finishes or the timeout elapses (`None` means
    /// wait indefinitely). Returns at most one outcome per call and releases
    /// that worker's resources before returning; `None` signals a timeout.
    fn wait_any(&mut self, timeout: Option<Duration>) -> Option<TaskOutcome>;

    /// Force-stop all workers. Idempotent; afterwards `running() == 0`.
    fn terminate_all(&mut self);

    /// Number of outstanding workers.
    fn running(&self) -> usize;
}

#[cfg(unix)]
pub use process::ProcessIsolator;
pub use threaded::ThreadIsolator;

/// The strongest isolator the platform supports.
#[cfg(unix)]
pub type PlatformIsolator = process::ProcessIsolator;
#[cfg(not(unix))]
pub type PlatformIsolator = threaded::ThreadIsolator;

/// Encode a task result for the wire: `(verdict code, exception code)`.
pub(crate) fn encode_result(result: &Result<Verdict, EngineError>) -> (i32, i32) {
    match result {
        Ok(verdict) => (verdict.code(), 0),
        Err(err) => (Verdict::NoInformation.code(), err.kind().code()),
    }
}

/// Decode a wire pair back into an outcome for worker `id`.
pub(crate) fn decode_result(id: u64, verdict_code: i32, exception_code: i32) -> TaskOutcome {
    let verdict = Verdict::try_from(verdict_code).unwrap_or(Verdict::NoInformation);
    let exception = match exception_code {
        0 => None,
        code => Some(ExceptionKind::try_from(code).unwrap_or(ExceptionKind::Other)),
    };
    TaskOutcome {
        id,
        verdict,
        completed: true,
        timed_out: false,
        exception,
    }
}

/// An outcome for a worker that died without delivering a result.
pub(crate) fn incomplete_outcome(id: u64) -> TaskOutcome {
    TaskOutcome {
        id,
        verdict: Verdict::NoInformation,
        completed: false,
        timed_out: false,
        exception: None,
    }
}
