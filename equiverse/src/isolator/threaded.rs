//! Thread-based worker pool with cooperative cancellation.
//!
//! The fallback for platforms without `fork()`. Workers cannot be killed
//! mid-operation: `terminate_all` raises every worker's stop flag and joins,
//! so deadlines are honored only at engine checkpoints.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::error::EngineError;
use crate::isolator::{decode_result, encode_result, incomplete_outcome, TaskIsolator};
use crate::task::{CancelToken, EngineTask, TaskOutcome};

const POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug)]
struct Worker {
    id: u64,
    finished: Arc<AtomicBool>,
    result: Arc<Mutex<Option<(i32, i32)>>>,
    stop: CancelToken,
    handle: Option<JoinHandle<()>>,
}

/// Thread-based isolator; termination is best-effort.
#[derive(Debug, Default)]
pub struct ThreadIsolator {
    workers: Vec<Worker>,
}

impl ThreadIsolator {
    #[must_use]
    pub fn new() -> ThreadIsolator {
        ThreadIsolator::default()
    }

    fn collect(&mut self, idx: usize) -> TaskOutcome {
        let mut worker = self.workers.remove(idx);
        if let Some(handle) = worker.handle.take() {
            let _ = handle.join();
        }
        let result = worker.result.lock().ok().and_then(|slot| *slot);
        match result {
            Some((verdict_code, exception_code)) => {
                decode_result(worker.id, verdict_code, exception_code)
            }
            None => incomplete_outcome(worker.id),
        }
    }
}

impl TaskIsolator for ThreadIsolator {
    fn spawn(&mut self, id: u64, mut task: Box<dyn EngineTask>) -> bool {
        let stop = CancelToken::new();
        task.bind_cancel(stop.clone());

        let finished = Arc::new(AtomicBool::new(false));
        let result = Arc::new(Mutex::new(None));
        let thread_finished = Arc::clone(&finished);
        let thread_result = Arc::clone(&result);

        let handle = std::thread::spawn(move || {
            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| task.run()))
                .unwrap_or_else(|_| Err(EngineError::Other("worker panicked".into())));
            if let Ok(mut slot) = thread_result.lock() {
                *slot = Some(encode_result(&outcome));
            }
            thread_finished.store(true, Ordering::Release);
        });

        self.workers.push(Worker {
            id,
            finished,
            result,
            stop,
            handle: Some(handle),
        });
        true
    }

    fn wait_any(&mut self, timeout: Option<Duration>) -> Option<TaskOutcome> {
        if self.workers.is_empty() {
            return None;
        }
        let deadline = timeout.map(|d| Instant::now() + d);

        loop {
            if let Some(idx) = self
                .workers
                .iter()
                .position(|worker| worker.finished.load(Ordering::Acquire))
            {
                return Some(self.collect(idx));
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return None;
                }
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    fn terminate_all(&mut self) {
        for worker in &self.workers {
            worker.stop.cancel();
        }
        for worker in &mut self.workers {
            if let Some(handle) = worker.handle.take() {
                let _ = handle.join();
            }
        }
        self.workers.clear();
    }

    fn running(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for ThreadIsolator {
    fn drop(&mut self) {
        self.terminate_all();
    }
}
