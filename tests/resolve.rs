// tests/resolve.rs

//! Dependency resolution: producer/path partitioning, cycle rejection and
//! unavailable dependencies.

use std::sync::Arc;

use depline::{Artifact, DeplineError, InlineExecutor, Pipeline, Task, TaskState};
use depline_test_utils::fixtures::Workspace;
use depline_test_utils::init_tracing;

fn producer(name: &str, dependency: &Artifact, product: &Artifact) -> Arc<Task> {
    let out = product.clone();
    Task::builder(name, move |_io| {
        std::fs::write(out.path(), "x")?;
        Ok(())
    })
    .dependency(dependency)
    .product(product)
    .build()
}

#[test]
fn cycle_is_rejected_before_anything_runs() {
    init_tracing();
    let ws = Workspace::new();
    let a_out = ws.artifact("a.txt");
    let b_out = ws.artifact("b.txt");

    let mut pipeline = Pipeline::new(Arc::new(InlineExecutor::new()));
    let a = pipeline.add_task(producer("a", &b_out, &a_out)).unwrap();
    let b = pipeline.add_task(producer("b", &a_out, &b_out)).unwrap();

    let err = pipeline.resolve().unwrap_err();
    assert!(matches!(err, DeplineError::CyclicDependency { .. }));

    // No task ran.
    assert_eq!(a.state(), TaskState::Waiting);
    assert_eq!(b.state(), TaskState::Waiting);
}

#[test]
fn missing_external_dependency_is_rejected() {
    init_tracing();
    let ws = Workspace::new();
    let missing = ws.artifact("missing.txt");
    let out = ws.artifact("out.txt");

    let mut pipeline = Pipeline::new(Arc::new(InlineExecutor::new()));
    pipeline.add_task(producer("lonely", &missing, &out)).unwrap();

    let err = pipeline.resolve().unwrap_err();
    match err {
        DeplineError::DependencyNotAvailable { artifact, task } => {
            assert_eq!(artifact, missing);
            assert_eq!(task, "lonely");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn dependencies_partition_into_tasks_and_paths() {
    init_tracing();
    let ws = Workspace::new();
    let raw = ws.write("raw.txt", "input");
    let mid = ws.artifact("mid.txt");
    let out = ws.artifact("out.txt");

    let mut pipeline = Pipeline::new(Arc::new(InlineExecutor::new()));
    let a = pipeline.add_task(producer("a", &raw, &mid)).unwrap();

    let b_out = out.clone();
    let b = pipeline
        .add_task(
            Task::builder("b", move |_io| {
                std::fs::write(b_out.path(), "x")?;
                Ok(())
            })
            .dependency(&mid)
            .dependency(&raw)
            .product(&out)
            .build(),
        )
        .unwrap();

    pipeline.resolve().unwrap();

    // `mid` has a producer; `raw` is a standalone path.
    assert_eq!(b.task_dependencies().len(), 1);
    assert!(Arc::ptr_eq(&b.task_dependencies()[0], &a));
    assert_eq!(b.path_dependencies(), &[raw.clone()]);

    // The root consumes only the standalone path.
    assert!(a.task_dependencies().is_empty());
    assert_eq!(a.path_dependencies(), &[raw]);
}

#[test]
fn hard_dependencies_are_appended_and_deduplicated() {
    init_tracing();
    let ws = Workspace::new();
    let mid = ws.artifact("mid.txt");
    let out = ws.artifact("out.txt");

    let mut pipeline = Pipeline::new(Arc::new(InlineExecutor::new()));

    let a_out = mid.clone();
    let a = pipeline
        .add_task(
            Task::builder("a", move |_io| {
                std::fs::write(a_out.path(), "x")?;
                Ok(())
            })
            .product(&mid)
            .build(),
        )
        .unwrap();

    // b both consumes a's product and hard-depends on a: one task dependency.
    let b_out = out.clone();
    let b = pipeline
        .add_task(
            Task::builder("b", move |_io| {
                std::fs::write(b_out.path(), "x")?;
                Ok(())
            })
            .dependency(&mid)
            .product(&out)
            .hard_dependency(&a)
            .build(),
        )
        .unwrap();

    pipeline.resolve().unwrap();

    assert_eq!(b.task_dependencies().len(), 1);
    assert!(Arc::ptr_eq(&b.task_dependencies()[0], &a));
}

#[tokio::test]
async fn run_surfaces_resolution_errors() {
    init_tracing();
    let ws = Workspace::new();
    let missing = ws.artifact("missing.txt");
    let out = ws.artifact("out.txt");

    let mut pipeline = Pipeline::new(Arc::new(InlineExecutor::new()));
    pipeline.add_task(producer("lonely", &missing, &out)).unwrap();

    let err = pipeline.run().await.unwrap_err();
    assert!(matches!(err, DeplineError::DependencyNotAvailable { .. }));
}
