// src/exec/mod.rs

//! Pluggable executor backends.
//!
//! The scheduler talks to an [`Executor`] trait object instead of a concrete
//! backend. This keeps backends interchangeable: the inline executor for
//! demos and tests, the bounded pool for local parallelism, the cluster
//! executor for external job systems, and whatever a test wants to fake.
//!
//! Methods that need to suspend return boxed futures so the trait stays
//! object-safe.

pub mod cluster;
pub mod inline;
pub mod pool;

pub use cluster::{ClusterExecutor, JobClient, JobHandle, JobId, JobSpec, JobState};
pub use inline::InlineExecutor;
pub use pool::{PoolExecutor, PoolStats};

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::errors::Result;
use crate::task::Task;

/// Boxed future type used by the object-safe [`Executor`] methods.
pub type BoxedFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Backend that performs `task.run()` asynchronously.
pub trait Executor: Send + Sync {
    /// Accept a task for asynchronous execution. The backend must invoke
    /// `task.run()` exactly once, on whatever worker it chooses, unless
    /// `cancel_all` intervenes first.
    ///
    /// `task_deps` is advisory: a backend with `handles_dependencies() ==
    /// true` may use it to queue with external dependency tracking; for all
    /// other backends the scheduler guarantees the dependencies are already
    /// in a successful terminal state.
    ///
    /// An `Err` means the submission itself failed; the scheduler records it
    /// on the task as an executor failure.
    fn submit(&self, task: Arc<Task>, task_deps: Vec<Arc<Task>>) -> BoxedFuture<'_, Result<()>>;

    /// Whether the backend enforces dependency ordering itself.
    fn handles_dependencies(&self) -> bool {
        false
    }

    /// Total in-flight cap, if the backend has one.
    fn max_jobs_queued(&self) -> Option<usize> {
        None
    }

    /// Pre-RUNNING cap, if the backend has one.
    fn max_jobs_pending(&self) -> Option<usize> {
        None
    }

    /// Best-effort cancellation of every submitted task that has not reached
    /// a successful terminal state; each such task must end up `Canceled`.
    fn cancel_all(&self) -> BoxedFuture<'_, ()>;

    /// Block until every submitted task reaches a terminal state.
    fn wait_for_all(&self) -> BoxedFuture<'_, ()>;
}
