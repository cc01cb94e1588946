// src/dag/resolve.rs

//! Dependency resolution: artifact-level dependencies become a task-level DAG.

use std::collections::HashMap;
use std::sync::Arc;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::artifact::Artifact;
use crate::dag::TaskGraph;
use crate::errors::{DeplineError, Result};
use crate::task::{ResolvedDeps, Task};

/// Resolve the task set into a [`TaskGraph`].
///
/// For each task, its artifact dependencies are partitioned into
/// producer-backed ones (the producing task becomes a task dependency) and
/// standalone paths (which must already exist on disk). Hard dependencies are
/// appended, deduplicated order-preserving. Each task's resolved fields are
/// set exactly once.
///
/// Fails with [`DeplineError::DependencyNotAvailable`] for a standalone path
/// that does not exist, and [`DeplineError::CyclicDependency`] if the induced
/// task graph is not a DAG.
pub(crate) fn resolve(tasks: &[Arc<Task>]) -> Result<TaskGraph> {
    let mut product_to_task: HashMap<&Artifact, usize> = HashMap::new();
    for (index, task) in tasks.iter().enumerate() {
        for product in task.products() {
            // Uniqueness was enforced at registration.
            product_to_task.insert(product, index);
        }
    }

    let mut deps: Vec<Vec<usize>> = Vec::with_capacity(tasks.len());

    for (_index, task) in tasks.iter().enumerate() {
        let mut task_deps: Vec<Arc<Task>> = Vec::new();
        let mut dep_indices: Vec<usize> = Vec::new();
        let mut path_deps: Vec<Artifact> = Vec::new();

        for artifact in task.dependencies() {
            match product_to_task.get(artifact) {
                Some(&producer) => {
                    if !dep_indices.contains(&producer) {
                        dep_indices.push(producer);
                        task_deps.push(tasks[producer].clone());
                    }
                }
                None => {
                    if !artifact.exists() {
                        return Err(DeplineError::DependencyNotAvailable {
                            artifact: artifact.clone(),
                            task: task.name().to_string(),
                        });
                    }
                    path_deps.push(artifact.clone());
                }
            }
        }

        for hard in task.hard_dependencies() {
            let position = tasks
                .iter()
                .position(|t| Arc::ptr_eq(t, hard) || **t == **hard);
            // Registration guarantees hard deps are in the queue.
            if let Some(producer) = position
                && !dep_indices.contains(&producer)
            {
                dep_indices.push(producer);
                task_deps.push(tasks[producer].clone());
            }
        }

        debug!(
            task = %task.name(),
            task_deps = dep_indices.len(),
            path_deps = path_deps.len(),
            "resolved task dependencies"
        );

        task.set_resolved(ResolvedDeps {
            task_deps,
            path_deps,
        });
        deps.push(dep_indices);
    }

    detect_cycle(tasks, &deps)?;

    Ok(TaskGraph::new(deps))
}

/// Reject a non-DAG task graph.
///
/// Edge direction: dependency -> dependent. A topological sort fails exactly
/// when there is a cycle.
fn detect_cycle(tasks: &[Arc<Task>], deps: &[Vec<usize>]) -> Result<()> {
    let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();

    for index in 0..tasks.len() {
        graph.add_node(index);
    }

    for (index, task_deps) in deps.iter().enumerate() {
        for &dep in task_deps {
            graph.add_edge(dep, index, ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(DeplineError::CyclicDependency {
            task: tasks[cycle.node_id()].name().to_string(),
        }),
    }
}
