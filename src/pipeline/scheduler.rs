// src/pipeline/scheduler.rs

//! The pipeline scheduler: registration, resolution and the main loop.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::artifact::Artifact;
use crate::dag::{self, TaskGraph};
use crate::errors::{DeplineError, Result};
use crate::exec::Executor;
use crate::pipeline::display::{self, StatusView};
use crate::pipeline::{PipelineConfig, RunReport};
use crate::task::{Task, TaskFailure, TaskState};

/// Owns the task set, validates registration, resolves the DAG and drives
/// tasks through their state machine.
///
/// The scheduler itself is single-threaded: one loop alternates a failure
/// propagation pass, a submission pass and a display update, sleeping
/// `refresh_period` in between. All parallelism lives in the executor.
pub struct Pipeline {
    config: PipelineConfig,
    executor: Arc<dyn Executor>,
    tasks: Vec<Arc<Task>>,
    /// Product -> producing task index; the unique-producer table.
    registered_products: HashMap<Artifact, usize>,
    /// Indices of tasks already submitted to the executor or skipped.
    handled: HashSet<usize>,
    graph: Option<TaskGraph>,
}

impl Pipeline {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self::with_config(executor, PipelineConfig::default())
    }

    pub fn with_config(executor: Arc<dyn Executor>, config: PipelineConfig) -> Self {
        Self {
            config,
            executor,
            tasks: Vec::new(),
            registered_products: HashMap::new(),
            handled: HashSet::new(),
            graph: None,
        }
    }

    pub fn tasks(&self) -> &[Arc<Task>] {
        &self.tasks
    }

    /// Register a task.
    ///
    /// Idempotent on equality: adding a task equal to one already registered
    /// returns the existing handle and changes nothing. Fails if one of its
    /// products is already registered by another task, or if a hard
    /// dependency has not been registered yet.
    pub fn add_task(&mut self, task: Arc<Task>) -> Result<Arc<Task>> {
        if let Some(existing) = self
            .tasks
            .iter()
            .find(|t| Arc::ptr_eq(t, &task) || ***t == *task)
        {
            debug!(task = %task.name(), "task already registered; returning existing entry");
            return Ok(existing.clone());
        }

        for product in task.products() {
            if let Some(&producer) = self.registered_products.get(product) {
                return Err(DeplineError::ProductAlreadyRegistered {
                    product: product.clone(),
                    existing: self.tasks[producer].name().to_string(),
                    attempted: task.name().to_string(),
                });
            }
        }

        for hard in task.hard_dependencies() {
            let registered = self
                .tasks
                .iter()
                .any(|t| Arc::ptr_eq(t, hard) || **t == **hard);
            if !registered {
                return Err(DeplineError::TaskNotInQueue {
                    task: task.name().to_string(),
                    dependency: hard.name().to_string(),
                });
            }
        }

        let index = self.tasks.len();
        for product in task.products() {
            self.registered_products.insert(product.clone(), index);
        }
        task.assign_queue_id(index + 1);
        self.tasks.push(task.clone());

        debug!(task = %task.name(), queue_id = index + 1, "task registered");
        Ok(task)
    }

    /// Register several tasks, in order.
    pub fn add_tasks(&mut self, tasks: impl IntoIterator<Item = Arc<Task>>) -> Result<()> {
        for task in tasks {
            self.add_task(task)?;
        }
        Ok(())
    }

    /// Resolve artifact-level dependencies into the task-level DAG.
    ///
    /// Called by [`Pipeline::run`]; exposed for callers that want to validate
    /// a pipeline without running it.
    pub fn resolve(&mut self) -> Result<()> {
        let graph = dag::resolve(&self.tasks)?;
        self.graph = Some(graph);
        Ok(())
    }

    /// Drive every task to a terminal state and report the outcome.
    ///
    /// Registration and resolution errors are returned as `Err`; per-task
    /// failures are not. They are reflected in the report (and the exit
    /// code derived from it) after the failure report has been printed and
    /// outstanding work cancelled.
    pub async fn run(&mut self) -> Result<RunReport> {
        self.resolve()?;
        info!(
            pipeline = %self.config.name,
            tasks = self.tasks.len(),
            "pipeline starting"
        );

        // Ctrl-C enters the failure-exit path.
        let (interrupt_tx, mut interrupt_rx) = watch::channel(false);
        let interrupt_listener = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = interrupt_tx.send(true);
            }
        });

        let view = StatusView::new(&self.config);

        let report = loop {
            // Propagate dependency failures to a fixed point.
            while self.propagate_failures() > 0 {}

            self.submission_pass().await;

            if !self.config.quiet {
                view.render(&self.tasks);
            }

            if self.tasks.iter().all(|t| t.state().is_terminal()) {
                if self.tasks.iter().any(|t| t.state().is_failed_terminal()) {
                    break self.failure_exit(&view).await;
                }
                break self.success_exit();
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.refresh_period) => {}
                _ = interrupt_rx.changed() => {
                    warn!("interrupt received; stopping execution");
                    break self.interrupt_exit().await;
                }
            }
        };

        interrupt_listener.abort();
        Ok(report)
    }

    /// One propagation pass: mark waiting dependents of failed tasks as
    /// DEPFAILED. Returns the number of transitions; the caller loops until
    /// a pass changes nothing.
    fn propagate_failures(&self) -> usize {
        let Some(graph) = &self.graph else { return 0 };

        let mut changed = 0;
        for (index, task) in self.tasks.iter().enumerate() {
            if !task.state().is_failed_terminal() {
                continue;
            }
            for &dependent in graph.dependents_of(index) {
                let dependent_task = &self.tasks[dependent];
                if dependent_task.state() == TaskState::Waiting {
                    debug!(
                        task = %dependent_task.name(),
                        failed_dependency = %task.name(),
                        "dependency failed; marking DEPFAILED"
                    );
                    dependent_task.set_state(TaskState::DepFailed);
                    changed += 1;
                }
            }
        }
        changed
    }

    /// One submission pass over the queue, in registration order.
    async fn submission_pass(&mut self) {
        let handles_deps = self.executor.handles_dependencies();

        for index in 0..self.tasks.len() {
            if self.handled.contains(&index) {
                continue;
            }
            let task = self.tasks[index].clone();
            if task.state() != TaskState::Waiting {
                continue;
            }

            let ready = handles_deps
                || task
                    .task_dependencies()
                    .iter()
                    .all(|dep| dep.state().is_successful_terminal());
            if !ready {
                continue;
            }

            if task.is_skippable() {
                debug!(task = %task.name(), "products up to date; skipping");
                task.set_state(TaskState::Skipped);
                self.handled.insert(index);
                continue;
            }

            if self.config.submit_only_if_runnable && self.executor_cap_reached() {
                // Revisit on the next cycle.
                continue;
            }

            debug!(task = %task.name(), queue_id = index + 1, "submitting task");
            task.set_state(TaskState::Pending);
            let deps = task.task_dependencies().to_vec();
            if let Err(err) = self.executor.submit(task.clone(), deps).await {
                warn!(task = %task.name(), error = %err, "task submission failed");
                task.fail(TaskFailure::Executor(err.to_string()));
            }
            self.handled.insert(index);
        }
    }

    /// Whether a queue-depth limit of the executor is currently exhausted.
    fn executor_cap_reached(&self) -> bool {
        if let Some(cap) = self.executor.max_jobs_queued() {
            let in_flight = self
                .handled
                .iter()
                .filter(|&&i| !self.tasks[i].state().is_terminal())
                .count();
            if in_flight >= cap {
                return true;
            }
        }

        if let Some(cap) = self.executor.max_jobs_pending() {
            let pending = self
                .handled
                .iter()
                .filter(|&&i| {
                    matches!(self.tasks[i].state(), TaskState::Pending | TaskState::Hold)
                })
                .count();
            if pending >= cap {
                return true;
            }
        }

        false
    }

    async fn failure_exit(&self, view: &StatusView) -> RunReport {
        if !self.config.quiet {
            view.render(&self.tasks);
        }
        display::report_failures(&self.tasks);

        info!("canceling outstanding jobs");
        self.executor.cancel_all().await;

        self.build_report(false)
    }

    fn success_exit(&self) -> RunReport {
        info!(pipeline = %self.config.name, "all tasks done");
        self.build_report(false)
    }

    async fn interrupt_exit(&self) -> RunReport {
        self.executor.cancel_all().await;
        // The scheduler may cancel any non-terminal task directly.
        for task in &self.tasks {
            task.set_state(TaskState::Canceled);
        }
        display::report_failures(&self.tasks);
        self.build_report(true)
    }

    fn build_report(&self, interrupted: bool) -> RunReport {
        let mut histogram: BTreeMap<TaskState, usize> = BTreeMap::new();
        for task in &self.tasks {
            *histogram.entry(task.state()).or_default() += 1;
        }
        let success = !interrupted
            && self
                .tasks
                .iter()
                .all(|t| t.state().is_successful_terminal());

        RunReport {
            histogram,
            success,
            interrupted,
        }
    }
}
