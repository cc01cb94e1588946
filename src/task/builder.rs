// src/task/builder.rs

//! Declarative task construction.
//!
//! The builder is the typed replacement for annotation-driven dependency and
//! product extraction: instead of tagging function parameters, the caller
//! declares which of the bound values are dependencies and which are
//! products, once, at construction time.

use std::sync::Arc;

use crate::artifact::Artifact;
use crate::task::{Task, TaskFn, TaskIo};

/// Builder returned by [`Task::builder`].
///
/// ```no_run
/// # use depline::{Artifact, Task};
/// # use std::sync::Arc;
/// let input = Artifact::new("data/in.txt");
/// let output = Artifact::new("data/out.txt");
/// let out = output.clone();
/// let task: Arc<Task> = Task::builder("convert", move |_io| {
///     std::fs::write(out.path(), "converted")?;
///     Ok(())
/// })
/// .dependency(&input)
/// .product(&output)
/// .build();
/// ```
pub struct TaskBuilder {
    name: String,
    func: Box<TaskFn>,
    dependencies: Vec<Artifact>,
    products: Vec<Artifact>,
    hard_dependencies: Vec<Arc<Task>>,
    eq_tokens: Vec<String>,
    always_build: bool,
}

impl TaskBuilder {
    pub(crate) fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut TaskIo) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Box::new(func),
            dependencies: Vec::new(),
            products: Vec::new(),
            hard_dependencies: Vec::new(),
            eq_tokens: Vec::new(),
            always_build: false,
        }
    }

    /// Declare an artifact the task consumes.
    pub fn dependency(mut self, artifact: impl Into<Artifact>) -> Self {
        self.dependencies.push(artifact.into());
        self
    }

    /// Declare several consumed artifacts at once.
    pub fn dependencies<I, A>(mut self, artifacts: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Artifact>,
    {
        self.dependencies.extend(artifacts.into_iter().map(Into::into));
        self
    }

    /// Declare an artifact the task produces.
    pub fn product(mut self, artifact: impl Into<Artifact>) -> Self {
        self.products.push(artifact.into());
        self
    }

    /// Declare several produced artifacts at once.
    pub fn products<I, A>(mut self, artifacts: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Artifact>,
    {
        self.products.extend(artifacts.into_iter().map(Into::into));
        self
    }

    /// Require another task to terminate successfully first, regardless of
    /// artifacts. The referenced task must be registered before this one.
    pub fn hard_dependency(mut self, task: &Arc<Task>) -> Self {
        self.hard_dependencies.push(task.clone());
        self
    }

    /// Add a value that participates in task equality (for arguments that
    /// distinguish otherwise identical tasks).
    pub fn eq_token(mut self, token: impl Into<String>) -> Self {
        self.eq_tokens.push(token.into());
        self
    }

    /// Disable the up-to-date skip decision.
    pub fn always_build(mut self, always_build: bool) -> Self {
        self.always_build = always_build;
        self
    }

    pub fn build(self) -> Arc<Task> {
        Arc::new(Task::from_parts(
            self.name,
            self.func,
            self.dependencies,
            self.products,
            self.hard_dependencies,
            self.eq_tokens,
            self.always_build,
        ))
    }
}
