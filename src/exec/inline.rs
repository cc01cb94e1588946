// src/exec/inline.rs

//! Inline executor: runs each task synchronously on submission.
//!
//! Useful for demos and deterministic tests; there is no parallelism and a
//! submitted task is terminal by the time `submit` resolves.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::errors::Result;
use crate::exec::{BoxedFuture, Executor};
use crate::task::{Task, TaskState};

#[derive(Debug, Default)]
pub struct InlineExecutor {
    submitted: Mutex<Vec<Arc<Task>>>,
}

impl InlineExecutor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Executor for InlineExecutor {
    fn submit(&self, task: Arc<Task>, _task_deps: Vec<Arc<Task>>) -> BoxedFuture<'_, Result<()>> {
        self.submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(task.clone());

        Box::pin(async move {
            debug!(task = %task.name(), "running task inline");
            // Outcome is recorded on the task itself.
            let _ = task.run();
            Ok(())
        })
    }

    fn cancel_all(&self) -> BoxedFuture<'_, ()> {
        Box::pin(async move {
            let submitted = self
                .submitted
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            // Inline tasks are terminal after submission; this only touches
            // tasks that somehow are not (set_state absorbs terminals).
            for task in submitted {
                task.set_state(TaskState::Canceled);
            }
        })
    }

    fn wait_for_all(&self) -> BoxedFuture<'_, ()> {
        // Nothing runs asynchronously.
        Box::pin(async {})
    }
}
