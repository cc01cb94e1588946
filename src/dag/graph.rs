// src/dag/graph.rs

//! Adjacency of the resolved task graph.
//!
//! Forward edges (dependencies) are owned by the tasks themselves as `Arc`
//! references; the reverse edges needed for failure propagation live here,
//! as indices into the pipeline's task vector, so that no ownership cycle
//! exists between a task and its dependents.

/// Resolved task-level adjacency, keyed by registration index (queue_id - 1).
#[derive(Debug, Clone)]
pub struct TaskGraph {
    deps: Vec<Vec<usize>>,
    dependents: Vec<Vec<usize>>,
}

impl TaskGraph {
    /// Build from per-task dependency index lists; dependents are derived in
    /// a second pass.
    pub(crate) fn new(deps: Vec<Vec<usize>>) -> Self {
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); deps.len()];

        for (task, task_deps) in deps.iter().enumerate() {
            for &dep in task_deps {
                dependents[dep].push(task);
            }
        }

        Self { deps, dependents }
    }

    pub fn len(&self) -> usize {
        self.deps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deps.is_empty()
    }

    /// Registration indices of the tasks this task depends on.
    pub fn dependencies_of(&self, task: usize) -> &[usize] {
        self.deps.get(task).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Registration indices of the tasks depending on this task.
    pub fn dependents_of(&self, task: usize) -> &[usize] {
        self.dependents.get(task).map(Vec::as_slice).unwrap_or(&[])
    }
}
