// src/task/state.rs

//! Task lifecycle states and their terminal classification.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a task.
///
/// Terminal states absorb all further transitions: once a task is in one of
/// them, `Task::set_state` is a no-op.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Registered but not yet handed to the executor.
    #[default]
    Waiting,
    /// Submitted to the executor queue, not yet picked up by a worker.
    Pending,
    /// A worker is executing the task body.
    Running,
    /// The task body completed and every product check passed.
    Finished,
    /// The scheduler decided the task is up to date and need not run.
    Skipped,
    /// The task body or a product check failed; details in the task's failure.
    Failed,
    /// A task dependency reached a failed terminal state.
    DepFailed,
    /// The pipeline was aborted before the task terminated successfully.
    Canceled,
    /// Cluster backends only: the external job is held by the job system.
    Hold,
    /// The external job state could not be mapped.
    Unknown,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Finished
                | TaskState::Skipped
                | TaskState::Failed
                | TaskState::DepFailed
                | TaskState::Canceled
        )
    }

    pub fn is_successful_terminal(self) -> bool {
        matches!(self, TaskState::Finished | TaskState::Skipped)
    }

    pub fn is_failed_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Failed | TaskState::DepFailed | TaskState::Canceled
        )
    }

    /// Upper-case label used in the status display.
    pub fn label(self) -> &'static str {
        match self {
            TaskState::Waiting => "WAITING",
            TaskState::Pending => "PENDING",
            TaskState::Running => "RUNNING",
            TaskState::Finished => "FINISHED",
            TaskState::Skipped => "SKIPPED",
            TaskState::Failed => "FAILED",
            TaskState::DepFailed => "DEPFAILED",
            TaskState::Canceled => "CANCELED",
            TaskState::Hold => "HOLD",
            TaskState::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
