// src/pipeline/display.rs

//! Status table rendering and the failure report.

use std::collections::BTreeMap;
use std::sync::Arc;

use comfy_table::{Cell, CellAlignment, Color, ContentArrangement, Table, presets};

use crate::pipeline::PipelineConfig;
use crate::task::{Task, TaskState};

/// Renders the periodic status view to stdout.
pub(crate) struct StatusView {
    name: String,
    clear_screen: bool,
    hide_successful: bool,
}

impl StatusView {
    pub(crate) fn new(config: &PipelineConfig) -> Self {
        Self {
            name: config.name.clone(),
            clear_screen: config.clear_screen,
            hide_successful: config.hide_successful_terminated_tasks,
        }
    }

    pub(crate) fn render(&self, tasks: &[Arc<Task>]) {
        let mut table = Table::new();
        table
            .load_preset(presets::ASCII_MARKDOWN)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                header_cell("ID"),
                header_cell("Name"),
                header_cell("Job ID"),
                header_cell("Job State"),
                header_cell("State"),
                header_cell("Deps"),
            ]);

        let mut histogram: BTreeMap<TaskState, usize> = BTreeMap::new();

        for task in tasks {
            let state = task.state();
            *histogram.entry(state).or_default() += 1;

            if self.hide_successful && state.is_successful_terminal() {
                continue;
            }

            let color = state_color(state);
            let job = task.job();
            let job_id = job.as_ref().map(|j| j.id.clone()).unwrap_or_default();
            let job_state = job
                .as_ref()
                .map(|j| j.state.to_string())
                .unwrap_or_default();
            let deps = task
                .task_dependencies()
                .iter()
                .filter_map(|dep| dep.queue_id())
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(", ");

            table.add_row(vec![
                Cell::new(task.queue_id().unwrap_or(0)).set_alignment(CellAlignment::Right),
                Cell::new(task.name()),
                Cell::new(job_id),
                Cell::new(job_state).fg(color),
                Cell::new(state.label()).fg(color),
                Cell::new(deps),
            ]);
        }

        let mut summary = Table::new();
        summary
            .load_preset(presets::ASCII_MARKDOWN)
            .set_header(vec![header_cell("State"), header_cell("Count")]);
        for (state, count) in &histogram {
            summary.add_row(vec![
                Cell::new(state.label()).fg(state_color(*state)),
                Cell::new(count).set_alignment(CellAlignment::Right),
            ]);
        }

        if self.clear_screen {
            // Clear and move the cursor home.
            print!("\x1b[2J\x1b[H");
        }
        println!("Pipeline: {}", self.name);
        println!("{table}");
        println!("{summary}");
    }
}

fn header_cell(text: &str) -> Cell {
    Cell::new(text)
        .set_alignment(CellAlignment::Center)
        .fg(Color::Blue)
}

fn state_color(state: TaskState) -> Color {
    match state {
        TaskState::Waiting | TaskState::Pending => Color::Blue,
        TaskState::Running => Color::Yellow,
        TaskState::Finished | TaskState::Skipped => Color::Green,
        TaskState::Failed | TaskState::DepFailed => Color::Red,
        TaskState::Hold | TaskState::Canceled | TaskState::Unknown => Color::White,
    }
}

/// Print the captured output of every task whose own state is Failed.
///
/// DEPFAILED tasks never ran; there is nothing to show for them.
pub(crate) fn report_failures(tasks: &[Arc<Task>]) {
    let failed: Vec<&Arc<Task>> = tasks
        .iter()
        .filter(|t| t.state() == TaskState::Failed)
        .collect();
    if failed.is_empty() {
        return;
    }

    println!();
    println!("---> Summary of failed tasks:");
    for task in failed {
        println!();
        println!(
            "Details for task {} - {}",
            task.queue_id().unwrap_or(0),
            task.name()
        );
        if let Some(message) = task.failure_message() {
            println!("{message}");
        }
        println!("STDOUT");
        println!("{}", task.stdout());
        println!("STDERR");
        println!("{}", task.stderr());
    }
}
