//! Fork-based worker pool (POSIX).
//!
//! Every spawn forks a child connected to the parent by a pipe. The child
//! runs its task, writes `(verdict, exception)` as two native-endian i32s,
//! and `_exit(0)`s without unwinding into the parent's state. The parent
//! multiplexes all pipe read-ends with a single `poll`.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use crate::error::EngineError;
use crate::isolator::{decode_result, encode_result, incomplete_outcome, TaskIsolator};
use crate::task::{EngineTask, TaskOutcome};

#[derive(Debug)]
struct Worker {
    id: u64,
    pid: libc::pid_t,
    pipe_fd: libc::c_int,
}

/// Process-based isolator with preemptive termination.
#[derive(Debug, Default)]
pub struct ProcessIsolator {
    workers: Vec<Worker>,
}

impl ProcessIsolator {
    #[must_use]
    pub fn new() -> ProcessIsolator {
        ProcessIsolator::default()
    }

    fn kill_worker(worker: &Worker) {
        unsafe {
            libc::kill(worker.pid, libc::SIGTERM);
            let mut status = 0;
            if libc::waitpid(worker.pid, &mut status, libc::WNOHANG) == 0 {
                libc::kill(worker.pid, libc::SIGKILL);
                libc::waitpid(worker.pid, &mut status, 0);
            }
            libc::close(worker.pipe_fd);
        }
    }

    fn reap(worker: &Worker) {
        unsafe {
            let mut status = 0;
            libc::waitpid(worker.pid, &mut status, 0);
            libc::close(worker.pipe_fd);
        }
    }
}

impl TaskIsolator for ProcessIsolator {
    fn spawn(&mut self, id: u64, task: Box<dyn EngineTask>) -> bool {
        let mut fds = [0 as libc::c_int; 2];
        if unsafe { libc::pipe(fds.as_mut_ptr()) } == -1 {
            tracing::error!("failed to create worker pipe");
            return false;
        }

        match unsafe { libc::fork() } {
            -1 => {
                tracing::error!("failed to fork worker");
                unsafe {
                    libc::close(fds[0]);
                    libc::close(fds[1]);
                }
                false
            }
            0 => {
                // child: run the task and ship the result through the pipe
                unsafe {
                    libc::close(fds[0]);
                }
                let result = std::panic::catch_unwind(AssertUnwindSafe(|| task.run()))
                    .unwrap_or_else(|_| Err(EngineError::Other("worker panicked".into())));
                let (verdict_code, exception_code) = encode_result(&result);
                let mut payload = [0u8; 8];
                payload[..4].copy_from_slice(&verdict_code.to_ne_bytes());
                payload[4..].copy_from_slice(&exception_code.to_ne_bytes());
                unsafe {
                    libc::write(fds[1], payload.as_ptr().cast(), payload.len());
                    libc::close(fds[1]);
                    // skip atexit handlers and parent-owned buffers
                    libc::_exit(0);
                }
            }
            pid => {
                unsafe {
                    libc::close(fds[1]);
                }
                self.workers.push(Worker {
                    id,
                    pid,
                    pipe_fd: fds[0],
                });
                true
            }
        }
    }

    fn wait_any(&mut self, timeout: Option<Duration>) -> Option<TaskOutcome> {
        if self.workers.is_empty() {
            return None;
        }

        let mut fds: Vec<libc::pollfd> = self
            .workers
            .iter()
            .map(|worker| libc::pollfd {
                fd: worker.pipe_fd,
                events: libc::POLLIN,
                revents: 0,
            })
            .collect();

        let timeout_ms: libc::c_int = match timeout {
            None => -1,
            Some(duration) => duration.as_millis().min(libc::c_int::MAX as u128) as libc::c_int,
        };

        let ready = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
        if ready == -1 {
            tracing::error!("poll on worker pipes failed");
            return None;
        }
        if ready == 0 {
            return None;
        }

        for (idx, pollfd) in fds.iter().enumerate() {
            if pollfd.revents & libc::POLLIN != 0 {
                let worker = self.workers.remove(idx);
                let mut payload = [0u8; 8];
                let read = unsafe {
                    libc::read(worker.pipe_fd, payload.as_mut_ptr().cast(), payload.len())
                };
                Self::reap(&worker);

                if read == payload.len() as isize {
                    let verdict_code =
                        i32::from_ne_bytes([payload[0], payload[1], payload[2], payload[3]]);
                    let exception_code =
                        i32::from_ne_bytes([payload[4], payload[5], payload[6], payload[7]]);
                    return Some(decode_result(worker.id, verdict_code, exception_code));
                }
                return Some(incomplete_outcome(worker.id));
            }

            if pollfd.revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 {
                let worker = self.workers.remove(idx);
                Self::reap(&worker);
                return Some(incomplete_outcome(worker.id));
            }
        }

        None
    }

    fn terminate_all(&mut self) {
        for worker in self.workers.drain(..) {
            Self::kill_worker(&worker);
        }
    }

    fn running(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for ProcessIsolator {
    fn drop(&mut self) {
        self.terminate_all();
    }
}
