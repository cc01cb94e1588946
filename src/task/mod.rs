// src/task/mod.rs

//! Tasks: units of work with declared artifact dependencies and products.
//!
//! - [`state`] holds the lifecycle state enum.
//! - [`failure`] holds the tagged failure variant stored on failed tasks.
//! - [`capture`] holds the per-task stdout/stderr capture sink.
//! - [`builder`] provides the declarative construction surface.

pub mod builder;
pub mod capture;
pub mod failure;
pub mod state;

pub use builder::TaskBuilder;
pub use capture::TaskIo;
pub use failure::{TaskFailure, TaskFailureKind};
pub use state::TaskState;

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::SystemTime;

use tracing::debug;

use crate::artifact::Artifact;
use crate::exec::JobHandle;

/// Signature of a task body. Arguments are captured by the closure; the
/// [`TaskIo`] argument is the capture sink for the body's output.
pub type TaskFn = dyn Fn(&mut TaskIo) -> anyhow::Result<()> + Send + Sync;

/// Mutable task fields guarded by one lock, so that compound transitions
/// (state + failure, state + job handle) are atomic.
#[derive(Debug, Default)]
struct TaskCell {
    state: TaskState,
    failure: Option<TaskFailure>,
    job: Option<JobHandle>,
}

/// Dependency fields resolved exactly once, by `Pipeline::resolve`.
pub(crate) struct ResolvedDeps {
    /// Tasks whose products this task consumes, plus hard dependencies.
    pub task_deps: Vec<Arc<Task>>,
    /// Artifact dependencies with no producer task; must exist on disk.
    pub path_deps: Vec<Artifact>,
}

/// A unit of work wrapping a user function plus its declared dependency and
/// product artifacts.
///
/// Tasks are shared as `Arc<Task>`: hard dependencies, the pipeline's queue
/// and executor workers all hold references to the same object. All mutable
/// fields use interior mutability; state reads and writes are ordered through
/// a single mutex.
pub struct Task {
    name: String,
    func: Box<TaskFn>,
    dependencies: Vec<Artifact>,
    products: Vec<Artifact>,
    hard_dependencies: Vec<Arc<Task>>,
    /// Extra values participating in task equality (see `PartialEq` below).
    eq_tokens: Vec<String>,
    always_build: bool,
    /// 1-based registration ordinal, set once by `Pipeline::add_task`.
    queue_id: OnceLock<usize>,
    resolved: OnceLock<ResolvedDeps>,
    cell: Mutex<TaskCell>,
    stdout_buf: Mutex<Vec<u8>>,
    stderr_buf: Mutex<Vec<u8>>,
}

impl Task {
    /// Functional construction style: the caller supplies the dependency and
    /// product artifact lists explicitly.
    pub fn new<F>(
        name: impl Into<String>,
        func: F,
        dependencies: Vec<Artifact>,
        products: Vec<Artifact>,
    ) -> Self
    where
        F: Fn(&mut TaskIo) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::from_parts(
            name.into(),
            Box::new(func),
            dependencies,
            products,
            Vec::new(),
            Vec::new(),
            false,
        )
    }

    pub(crate) fn from_parts(
        name: impl Into<String>,
        func: Box<TaskFn>,
        dependencies: Vec<Artifact>,
        products: Vec<Artifact>,
        hard_dependencies: Vec<Arc<Task>>,
        eq_tokens: Vec<String>,
        always_build: bool,
    ) -> Self {
        Self {
            name: name.into(),
            func,
            dependencies,
            products,
            hard_dependencies,
            eq_tokens,
            always_build,
            queue_id: OnceLock::new(),
            resolved: OnceLock::new(),
            cell: Mutex::new(TaskCell::default()),
            stdout_buf: Mutex::new(Vec::new()),
            stderr_buf: Mutex::new(Vec::new()),
        }
    }

    /// Declarative construction style.
    pub fn builder<F>(name: impl Into<String>, func: F) -> TaskBuilder
    where
        F: Fn(&mut TaskIo) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        TaskBuilder::new(name, func)
    }

    /// Tasks that must terminate successfully before this one, regardless of
    /// artifacts.
    pub fn with_hard_dependencies(mut self, tasks: Vec<Arc<Task>>) -> Self {
        self.hard_dependencies = tasks;
        self
    }

    /// Values that participate in task equality in addition to name,
    /// dependencies and products.
    pub fn with_eq_tokens(mut self, tokens: Vec<String>) -> Self {
        self.eq_tokens = tokens;
        self
    }

    /// Disable the up-to-date skip decision for this task.
    pub fn with_always_build(mut self, always_build: bool) -> Self {
        self.always_build = always_build;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 1-based registration ordinal, or `None` before registration.
    pub fn queue_id(&self) -> Option<usize> {
        self.queue_id.get().copied()
    }

    pub fn dependencies(&self) -> &[Artifact] {
        &self.dependencies
    }

    pub fn products(&self) -> &[Artifact] {
        &self.products
    }

    pub fn hard_dependencies(&self) -> &[Arc<Task>] {
        &self.hard_dependencies
    }

    /// Resolved task-level dependencies. Empty before resolution.
    pub fn task_dependencies(&self) -> &[Arc<Task>] {
        self.resolved
            .get()
            .map(|r| r.task_deps.as_slice())
            .unwrap_or(&[])
    }

    /// Resolved standalone path dependencies. Empty before resolution.
    pub fn path_dependencies(&self) -> &[Artifact] {
        self.resolved
            .get()
            .map(|r| r.path_deps.as_slice())
            .unwrap_or(&[])
    }

    pub(crate) fn assign_queue_id(&self, id: usize) {
        let _ = self.queue_id.set(id);
    }

    pub(crate) fn set_resolved(&self, resolved: ResolvedDeps) {
        let _ = self.resolved.set(resolved);
    }

    fn cell(&self) -> MutexGuard<'_, TaskCell> {
        // The lock is never held across user code, so poisoning cannot
        // occur; recover the guard instead of panicking if it somehow does.
        self.cell.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> TaskState {
        self.cell().state
    }

    /// Transition to `next`, unless the current state is terminal.
    ///
    /// Terminal states absorb all further transitions; this is what keeps a
    /// late `Finished` write from an executor worker from overwriting a
    /// `Canceled` set by the scheduler.
    pub fn set_state(&self, next: TaskState) {
        let mut cell = self.cell();
        if cell.state.is_terminal() || cell.state == next {
            return;
        }
        debug!(task = %self.name, from = %cell.state, to = %next, "task state transition");
        cell.state = next;
    }

    /// Compound transition to `Failed` with the failure variant recorded.
    /// No-op if the task is already terminal.
    pub fn fail(&self, failure: TaskFailure) -> TaskFailureKind {
        let kind = failure.kind();
        let mut cell = self.cell();
        if cell.state.is_terminal() {
            return kind;
        }
        debug!(task = %self.name, from = %cell.state, failure = %failure, "task failed");
        cell.state = TaskState::Failed;
        cell.failure = Some(failure);
        kind
    }

    pub fn failure_kind(&self) -> Option<TaskFailureKind> {
        self.cell().failure.as_ref().map(TaskFailure::kind)
    }

    pub fn failure_message(&self) -> Option<String> {
        self.cell().failure.as_ref().map(|f| f.to_string())
    }

    /// Cluster backends store the external job handle here.
    pub fn job(&self) -> Option<JobHandle> {
        self.cell().job.clone()
    }

    pub(crate) fn set_job(&self, job: JobHandle) {
        self.cell().job = Some(job);
    }

    pub(crate) fn update_job_state(&self, state: crate::exec::JobState) {
        if let Some(job) = self.cell().job.as_mut() {
            job.state = state;
        }
    }

    /// Captured standard output of the task body, lossily decoded.
    pub fn stdout(&self) -> String {
        let buf = self
            .stdout_buf
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Captured standard error of the task body, lossily decoded.
    pub fn stderr(&self) -> String {
        let buf = self
            .stderr_buf
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Up-to-date check: a task is skippable when it declares products, all
    /// of them exist, and every product is at least as new as the newest
    /// artifact dependency. `always_build` opts out entirely.
    ///
    /// A task with no products is never skippable: it has no artifact
    /// evidence of being up to date.
    pub fn is_skippable(&self) -> bool {
        if self.always_build || self.products.is_empty() {
            return false;
        }

        let mut newest_dep: Option<SystemTime> = None;
        for dep in &self.dependencies {
            match dep.mtime() {
                Some(t) => {
                    if newest_dep.is_none_or(|n| t > n) {
                        newest_dep = Some(t);
                    }
                }
                // A missing dependency artifact cannot be compared against.
                None => return false,
            }
        }

        for product in &self.products {
            match product.mtime() {
                Some(t) => {
                    if newest_dep.is_some_and(|n| t < n) {
                        return false;
                    }
                }
                None => return false,
            }
        }

        true
    }

    /// Execute the task body on the calling worker.
    ///
    /// The outcome is recorded on the task (state plus failure variant); the
    /// returned kind is a convenience for callers that want to log it.
    ///
    /// Steps: verify path dependencies, snapshot product mtimes, run the
    /// function with a scoped capture sink, then verify that every product
    /// exists and that pre-existing products were rewritten.
    pub fn run(&self) -> Result<(), TaskFailureKind> {
        for dep in self.path_dependencies() {
            if !dep.exists() {
                return Err(self.fail(TaskFailure::DependencyNotMet(dep.clone())));
            }
        }

        let snapshot: Vec<Option<SystemTime>> =
            self.products.iter().map(|p| p.mtime()).collect();

        self.set_state(TaskState::Running);

        let mut io = TaskIo::new();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (self.func)(&mut io)));

        // Keep whatever the body wrote, on every exit path.
        let (stdout, stderr) = io.into_buffers();
        *self
            .stdout_buf
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = stdout;
        *self
            .stderr_buf
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = stderr;

        let result = match outcome {
            Ok(result) => result,
            Err(payload) => Err(anyhow::anyhow!("task panicked: {}", panic_message(&payload))),
        };

        if let Err(err) = result {
            return Err(self.fail(TaskFailure::Raised(err)));
        }

        for (product, before) in self.products.iter().zip(&snapshot) {
            if !product.exists() {
                return Err(self.fail(TaskFailure::ProductNotProduced(product.clone())));
            }
            if let Some(before) = before {
                match product.mtime() {
                    Some(after) if after > *before => {}
                    _ => {
                        return Err(self.fail(TaskFailure::ProductNotUpdated(product.clone())));
                    }
                }
            }
        }

        self.set_state(TaskState::Finished);
        Ok(())
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("queue_id", &self.queue_id.get())
            .field("dependencies", &self.dependencies)
            .field("products", &self.products)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Equality is value-based over the declared interface of the task: name,
/// dependency and product artifacts, and any explicit eq tokens. Arguments
/// captured by the closure are invisible to the pipeline and do not
/// participate unless surfaced as an eq token.
impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.dependencies == other.dependencies
            && self.products == other.products
            && self.eq_tokens == other.eq_tokens
    }
}

impl Eq for Task {}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    // Some executor boundaries (polling a boxed `dyn Future` trait object)
    // re-box the payload as `Box<dyn Any + Send>` before it reaches here;
    // unwrap that layer before matching on the actual message type.
    let mut current = payload;
    while let Some(boxed) = current.downcast_ref::<Box<dyn std::any::Any + Send>>() {
        current = &**boxed;
    }

    if let Some(s) = current.downcast_ref::<&str>() {
        s
    } else if let Some(s) = current.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}
