// src/exec/cluster.rs

//! Cluster-job executor: delegates tasks to an external job system.
//!
//! The executor itself only knows how to submit, poll and cancel through a
//! [`JobClient`]; the client owns the transport (and is responsible for
//! arranging that `task.run()` eventually happens on one of its workers).
//! A background loop polls the external state of every in-flight job and
//! maps it onto the task lifecycle with a fixed table.
//!
//! External job systems typically track dependencies themselves, so
//! `handles_dependencies` is true and the scheduler submits the whole DAG up
//! front, passing dependency job ids along in the [`JobSpec`].

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::Result;
use crate::exec::{BoxedFuture, Executor};
use crate::task::{Task, TaskFailure, TaskState};

/// Opaque identifier assigned by the external job system.
pub type JobId = String;

/// External job states, normalised across job systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Pending,
    Configuring,
    Running,
    Hold,
    Completed,
    Failed,
    Timeout,
    OutOfMemory,
    NodeFail,
    Canceled,
    Unknown,
}

impl JobState {
    /// Fixed mapping from external job states to task states.
    ///
    /// `Hold` is not terminal: a held job may still move to Running or
    /// Failed.
    pub fn to_task_state(self) -> TaskState {
        match self {
            JobState::Pending | JobState::Configuring => TaskState::Pending,
            JobState::Running => TaskState::Running,
            JobState::Hold => TaskState::Hold,
            JobState::Completed => TaskState::Finished,
            JobState::Failed | JobState::Timeout | JobState::OutOfMemory | JobState::NodeFail => {
                TaskState::Failed
            }
            JobState::Canceled => TaskState::Canceled,
            JobState::Unknown => TaskState::Unknown,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobState::Pending => "PENDING",
            JobState::Configuring => "CONFIGURING",
            JobState::Running => "RUNNING",
            JobState::Hold => "HOLD",
            JobState::Completed => "COMPLETED",
            JobState::Failed => "FAILED",
            JobState::Timeout => "TIMEOUT",
            JobState::OutOfMemory => "OUT_OF_MEMORY",
            JobState::NodeFail => "NODE_FAIL",
            JobState::Canceled => "CANCELED",
            JobState::Unknown => "UNKNOWN",
        };
        f.write_str(label)
    }
}

/// What a [`JobClient`] needs to know to queue a task externally.
#[derive(Debug, Clone, Serialize)]
pub struct JobSpec {
    pub name: String,
    pub queue_id: usize,
    /// Job ids this job must wait for in the external dependency tracker.
    pub after: Vec<JobId>,
}

/// External job handle stored on the task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub id: JobId,
    pub state: JobState,
}

/// Transport to a concrete external job system.
pub trait JobClient: Send + Sync {
    /// Queue the task externally and return its job id. The client arranges
    /// for `task.run()` to be invoked on one of its workers.
    fn submit(&self, task: Arc<Task>, spec: JobSpec) -> BoxedFuture<'_, Result<JobId>>;

    /// Current external state of the job.
    fn poll(&self, id: JobId) -> BoxedFuture<'_, Result<JobState>>;

    /// Best-effort kill of the external job.
    fn cancel(&self, id: JobId) -> BoxedFuture<'_, ()>;
}

struct ClusterInner {
    client: Arc<dyn JobClient>,
    submitted: Mutex<Vec<Arc<Task>>>,
    cancelled: AtomicBool,
}

impl ClusterInner {
    fn snapshot(&self) -> Vec<Arc<Task>> {
        self.submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

pub struct ClusterExecutor {
    inner: Arc<ClusterInner>,
    poll_interval: Duration,
    max_queued: Option<usize>,
    poller: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl ClusterExecutor {
    pub fn new(client: Arc<dyn JobClient>) -> Self {
        Self {
            inner: Arc::new(ClusterInner {
                client,
                submitted: Mutex::new(Vec::new()),
                cancelled: AtomicBool::new(false),
            }),
            poll_interval: Duration::from_secs(1),
            max_queued: None,
            poller: Mutex::new(None),
        }
    }

    /// How often the external job states are polled.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Cap on in-flight jobs, honoured by the scheduler when
    /// `submit_only_if_runnable` is enabled.
    pub fn with_max_jobs_queued(mut self, max: usize) -> Self {
        self.max_queued = Some(max);
        self
    }

    /// The poll loop is started lazily, from the first `submit`, so that the
    /// executor can be constructed outside a runtime.
    fn ensure_poller(&self) {
        let mut poller = self.poller.lock().unwrap_or_else(PoisonError::into_inner);
        if poller.is_none() {
            let inner = self.inner.clone();
            let interval = self.poll_interval;
            *poller = Some(tokio::spawn(poll_loop(inner, interval)));
        }
    }
}

impl Executor for ClusterExecutor {
    fn submit(&self, task: Arc<Task>, task_deps: Vec<Arc<Task>>) -> BoxedFuture<'_, Result<()>> {
        Box::pin(async move {
            self.ensure_poller();

            let after: Vec<JobId> = task_deps
                .iter()
                .filter_map(|dep| dep.job().map(|job| job.id))
                .collect();

            let spec = JobSpec {
                name: task.name().to_string(),
                queue_id: task.queue_id().unwrap_or(0),
                after,
            };

            let id = self.inner.client.submit(task.clone(), spec).await?;
            debug!(task = %task.name(), job_id = %id, "submitted cluster job");

            task.set_job(JobHandle {
                id,
                state: JobState::Pending,
            });

            self.inner
                .submitted
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(task);

            Ok(())
        })
    }

    fn handles_dependencies(&self) -> bool {
        true
    }

    fn max_jobs_queued(&self) -> Option<usize> {
        self.max_queued
    }

    fn cancel_all(&self) -> BoxedFuture<'_, ()> {
        Box::pin(async move {
            self.inner.cancelled.store(true, Ordering::SeqCst);

            for task in self.inner.snapshot() {
                if task.state().is_successful_terminal() {
                    continue;
                }
                if let Some(job) = task.job() {
                    self.inner.client.cancel(job.id).await;
                }
                task.set_state(TaskState::Canceled);
            }
        })
    }

    fn wait_for_all(&self) -> BoxedFuture<'_, ()> {
        Box::pin(async move {
            loop {
                let all_terminal = self
                    .inner
                    .snapshot()
                    .iter()
                    .all(|task| task.state().is_terminal());
                if all_terminal {
                    return;
                }
                tokio::time::sleep(self.poll_interval).await;
            }
        })
    }
}

/// Background loop mapping external job states onto task states.
async fn poll_loop(inner: Arc<ClusterInner>, interval: Duration) {
    loop {
        if inner.cancelled.load(Ordering::SeqCst) {
            debug!("cluster poll loop stopping after cancellation");
            return;
        }

        tokio::time::sleep(interval).await;

        for task in inner.snapshot() {
            if task.state().is_terminal() {
                continue;
            }
            let Some(job) = task.job() else { continue };

            match inner.client.poll(job.id.clone()).await {
                Ok(state) => {
                    task.update_job_state(state);
                    let mapped = state.to_task_state();
                    if mapped == TaskState::Failed {
                        task.fail(TaskFailure::Executor(format!(
                            "external job {} ended in state {state}",
                            job.id
                        )));
                    } else {
                        task.set_state(mapped);
                    }
                }
                Err(err) => {
                    warn!(task = %task.name(), job_id = %job.id, error = %err, "job poll failed");
                    task.fail(TaskFailure::Executor(format!(
                        "polling job {} failed: {err}",
                        job.id
                    )));
                }
            }
        }
    }
}
