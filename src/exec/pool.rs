// src/exec/pool.rs

//! Bounded worker pool executor.
//!
//! Submitted tasks wait for one of `workers` semaphore permits, then run
//! their (blocking) body on the Tokio blocking pool. Cancellation is
//! cooperative: entries that have not claimed a permit yet are declined, and
//! every submitted task that is not successfully terminal is marked Canceled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::exec::{BoxedFuture, Executor};
use crate::task::{Task, TaskState};

/// Snapshot of the pool's job states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Submitted tasks in a terminal state.
    pub done: usize,
    /// Tasks currently executing their body.
    pub running: usize,
    /// Submitted tasks still waiting for a worker.
    pub queued: usize,
}

pub struct PoolExecutor {
    permits: Arc<Semaphore>,
    cancelled: Arc<AtomicBool>,
    submitted: Mutex<Vec<Arc<Task>>>,
    handles: Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl PoolExecutor {
    /// A pool with `workers` concurrent workers (at least one).
    pub fn new(workers: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(workers.max(1))),
            cancelled: Arc::new(AtomicBool::new(false)),
            submitted: Mutex::new(Vec::new()),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Counts of done/running/queued submitted tasks.
    pub fn stats(&self) -> PoolStats {
        let submitted = self
            .submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut stats = PoolStats {
            done: 0,
            running: 0,
            queued: 0,
        };
        for task in submitted.iter() {
            let state = task.state();
            if state.is_terminal() {
                stats.done += 1;
            } else if state == TaskState::Running {
                stats.running += 1;
            } else {
                stats.queued += 1;
            }
        }
        stats
    }
}

impl Executor for PoolExecutor {
    fn submit(&self, task: Arc<Task>, _task_deps: Vec<Arc<Task>>) -> BoxedFuture<'_, Result<()>> {
        self.submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(task.clone());

        let permits = self.permits.clone();
        let cancelled = self.cancelled.clone();

        let handle = tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_closed) => return,
            };

            // Declined: cancellation arrived before a worker was free.
            if cancelled.load(Ordering::SeqCst) {
                debug!(task = %task.name(), "pool cancelled before task started");
                task.set_state(TaskState::Canceled);
                return;
            }

            let worker_task = task.clone();
            let join = tokio::task::spawn_blocking(move || {
                let _ = worker_task.run();
            })
            .await;

            if let Err(err) = join {
                warn!(task = %task.name(), error = %err, "pool worker did not complete");
            }
        });

        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);

        Box::pin(async { Ok(()) })
    }

    fn cancel_all(&self) -> BoxedFuture<'_, ()> {
        Box::pin(async move {
            self.cancelled.store(true, Ordering::SeqCst);

            let submitted = self
                .submitted
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            // Terminal states absorb this; a running body that later reports
            // Finished loses against the Canceled set here.
            for task in submitted {
                task.set_state(TaskState::Canceled);
            }
        })
    }

    fn wait_for_all(&self) -> BoxedFuture<'_, ()> {
        Box::pin(async move {
            let handles: Vec<_> = self
                .handles
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .drain(..)
                .collect();

            for handle in handles {
                let _ = handle.await;
            }
        })
    }
}
