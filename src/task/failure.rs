// src/task/failure.rs

//! Per-task failure variants.
//!
//! Task-body errors are not thrown across the scheduler; they are stored on
//! the task as a tagged variant and surfaced through its state. The scheduler
//! reads the variant when printing the failure report.

use thiserror::Error;

use crate::artifact::Artifact;

/// Why a task ended up in the `Failed` state.
#[derive(Error, Debug)]
pub enum TaskFailure {
    /// A standalone path dependency did not exist when the task was picked up.
    #[error("dependency {0} does not exist")]
    DependencyNotMet(Artifact),

    /// The task function returned an error (or panicked).
    #[error("task function failed: {0}")]
    Raised(#[source] anyhow::Error),

    /// A declared product did not exist after the task function returned.
    #[error("product {0} was not produced")]
    ProductNotProduced(Artifact),

    /// A pre-existing product was not rewritten by the task function.
    #[error("product {0} was not updated")]
    ProductNotUpdated(Artifact),

    /// The executor failed to submit or poll the task.
    #[error("executor error: {0}")]
    Executor(String),
}

/// Payload-free discriminant of [`TaskFailure`], convenient for matching in
/// the scheduler and in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskFailureKind {
    DependencyNotMet,
    Raised,
    ProductNotProduced,
    ProductNotUpdated,
    Executor,
}

impl TaskFailure {
    pub fn kind(&self) -> TaskFailureKind {
        match self {
            TaskFailure::DependencyNotMet(_) => TaskFailureKind::DependencyNotMet,
            TaskFailure::Raised(_) => TaskFailureKind::Raised,
            TaskFailure::ProductNotProduced(_) => TaskFailureKind::ProductNotProduced,
            TaskFailure::ProductNotUpdated(_) => TaskFailureKind::ProductNotUpdated,
            TaskFailure::Executor(_) => TaskFailureKind::Executor,
        }
    }
}
