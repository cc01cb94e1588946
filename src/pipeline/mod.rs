// src/pipeline/mod.rs

//! The pipeline: task registration, dependency resolution and the
//! scheduling loop.
//!
//! - [`scheduler`] owns the task set and drives the main loop.
//! - [`display`] renders the live status table and the failure report.

pub mod display;
pub mod scheduler;

pub use scheduler::Pipeline;

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::task::TaskState;

/// Display and policy flags for a pipeline run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Display label for the status view.
    pub name: String,
    /// Repaint the status view in place instead of appending.
    pub clear_screen: bool,
    /// Filter successfully terminated tasks out of the table.
    pub hide_successful_terminated_tasks: bool,
    /// Honour the executor's queue-depth limits when submitting.
    pub submit_only_if_runnable: bool,
    /// Suppress the status display entirely.
    pub quiet: bool,
    /// Pause between scheduler cycles.
    pub refresh_period: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: "pipeline".to_string(),
            clear_screen: true,
            hide_successful_terminated_tasks: false,
            submit_only_if_runnable: false,
            quiet: false,
            refresh_period: Duration::from_secs(1),
        }
    }
}

/// Terminal outcome of a pipeline run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Number of tasks per final state.
    pub histogram: BTreeMap<TaskState, usize>,
    /// Whether every task reached a successful terminal state.
    pub success: bool,
    /// Whether the run was aborted by an interrupt.
    pub interrupted: bool,
}

impl RunReport {
    /// Process exit code: 0 iff every task terminated successfully.
    pub fn exit_code(&self) -> i32 {
        if self.success { 0 } else { 1 }
    }
}
