// tests/cluster.rs

//! Cluster executor: external state mapping, dependency hand-off and
//! cancellation, driven by a scripted fake job client.

use std::sync::Arc;
use std::time::Duration;

use depline::exec::{ClusterExecutor, Executor, JobState};
use depline::{Pipeline, PipelineConfig, Task, TaskFailureKind, TaskState};
use depline_test_utils::fake_cluster::FakeJobClient;
use depline_test_utils::fixtures::Workspace;
use depline_test_utils::{init_tracing, with_timeout};

fn quiet_config() -> PipelineConfig {
    PipelineConfig {
        quiet: true,
        refresh_period: Duration::from_millis(5),
        ..Default::default()
    }
}

fn cluster(client: &Arc<FakeJobClient>) -> Arc<ClusterExecutor> {
    Arc::new(
        ClusterExecutor::new(client.clone()).with_poll_interval(Duration::from_millis(5)),
    )
}

/// Remote task bodies never run locally; products are bookkeeping only.
/// A dependency names another remote task's product.
fn remote_task(name: &str, ws: &Workspace, dependency: Option<&str>) -> Arc<Task> {
    let mut builder = Task::builder(name, |_io| Ok(()));
    if let Some(dep) = dependency {
        builder = builder.dependency(ws.artifact(&format!("{dep}.txt")));
    }
    builder.product(ws.artifact(&format!("{name}.txt"))).build()
}

#[test]
fn external_states_map_to_task_states() {
    assert_eq!(JobState::Pending.to_task_state(), TaskState::Pending);
    assert_eq!(JobState::Configuring.to_task_state(), TaskState::Pending);
    assert_eq!(JobState::Running.to_task_state(), TaskState::Running);
    assert_eq!(JobState::Hold.to_task_state(), TaskState::Hold);
    assert_eq!(JobState::Completed.to_task_state(), TaskState::Finished);
    assert_eq!(JobState::Failed.to_task_state(), TaskState::Failed);
    assert_eq!(JobState::Timeout.to_task_state(), TaskState::Failed);
    assert_eq!(JobState::OutOfMemory.to_task_state(), TaskState::Failed);
    assert_eq!(JobState::NodeFail.to_task_state(), TaskState::Failed);
    assert_eq!(JobState::Canceled.to_task_state(), TaskState::Canceled);
    assert_eq!(JobState::Unknown.to_task_state(), TaskState::Unknown);
}

#[tokio::test]
async fn chain_is_submitted_with_external_dependencies() {
    init_tracing();
    let ws = Workspace::new();
    let client = Arc::new(FakeJobClient::new());

    let mut pipeline = Pipeline::with_config(cluster(&client), quiet_config());
    let a = pipeline.add_task(remote_task("a", &ws, None)).unwrap();
    let b = pipeline.add_task(remote_task("b", &ws, Some("a"))).unwrap();

    let report = with_timeout(pipeline.run()).await.unwrap();

    assert_eq!(a.state(), TaskState::Finished);
    assert_eq!(b.state(), TaskState::Finished);
    assert_eq!(report.exit_code(), 0);

    // The whole DAG went out up front; the dependent carries its
    // dependency's job id for the external tracker.
    let submissions = client.submissions();
    assert_eq!(submissions.len(), 2);
    assert_eq!(submissions[0].name, "a");
    assert!(submissions[0].after.is_empty());
    assert_eq!(submissions[1].name, "b");
    assert_eq!(submissions[1].after, vec!["job-1".to_string()]);

    // Job handles were stored on the tasks.
    assert_eq!(a.job().map(|j| j.id), Some("job-1".to_string()));
    assert_eq!(b.job().map(|j| j.id), Some("job-2".to_string()));
}

#[tokio::test]
async fn held_jobs_are_not_terminal() {
    init_tracing();
    let ws = Workspace::new();
    let client = Arc::new(FakeJobClient::new());
    client.plan(
        "held",
        [
            JobState::Hold,
            JobState::Hold,
            JobState::Running,
            JobState::Completed,
        ],
    );

    let mut pipeline = Pipeline::with_config(cluster(&client), quiet_config());
    let task = pipeline.add_task(remote_task("held", &ws, None)).unwrap();

    let report = with_timeout(pipeline.run()).await.unwrap();

    assert_eq!(task.state(), TaskState::Finished);
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test]
async fn failed_job_fails_task_and_cancels_the_rest() {
    init_tracing();
    let ws = Workspace::new();
    let client = Arc::new(FakeJobClient::new());
    client.plan("a", [JobState::Running, JobState::Failed]);
    client.plan("b", [JobState::Pending, JobState::Canceled]);

    let mut pipeline = Pipeline::with_config(cluster(&client), quiet_config());
    let a = pipeline.add_task(remote_task("a", &ws, None)).unwrap();
    let b = pipeline.add_task(remote_task("b", &ws, Some("a"))).unwrap();

    let report = with_timeout(pipeline.run()).await.unwrap();

    assert_eq!(a.state(), TaskState::Failed);
    assert_eq!(a.failure_kind(), Some(TaskFailureKind::Executor));
    assert_eq!(b.state(), TaskState::Canceled);
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn timeout_maps_to_failure_with_diagnostic() {
    init_tracing();
    let ws = Workspace::new();
    let client = Arc::new(FakeJobClient::new());
    client.plan("t", [JobState::Running, JobState::Timeout]);

    let mut pipeline = Pipeline::with_config(cluster(&client), quiet_config());
    let task = pipeline.add_task(remote_task("t", &ws, None)).unwrap();

    let report = with_timeout(pipeline.run()).await.unwrap();

    assert_eq!(task.state(), TaskState::Failed);
    assert!(
        task.failure_message()
            .unwrap_or_default()
            .contains("TIMEOUT")
    );
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn cancel_all_kills_external_jobs() {
    init_tracing();
    let client = Arc::new(FakeJobClient::new());
    // A job that never completes.
    client.plan("stuck", [JobState::Running]);

    let executor = cluster(&client);
    let task = Task::builder("stuck", |_io| Ok(())).build();

    executor.submit(task.clone(), Vec::new()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(25)).await;

    executor.cancel_all().await;
    executor.wait_for_all().await;

    assert_eq!(task.state(), TaskState::Canceled);
    assert_eq!(client.cancelled(), vec!["job-1".to_string()]);
}

#[tokio::test]
async fn queue_cap_staggers_submissions() {
    init_tracing();
    let ws = Workspace::new();
    let client = Arc::new(FakeJobClient::new());

    let executor = Arc::new(
        ClusterExecutor::new(client.clone())
            .with_poll_interval(Duration::from_millis(5))
            .with_max_jobs_queued(1),
    );

    let config = PipelineConfig {
        submit_only_if_runnable: true,
        ..quiet_config()
    };

    let mut pipeline = Pipeline::with_config(executor, config);
    let a = pipeline.add_task(remote_task("a", &ws, None)).unwrap();
    let b = pipeline.add_task(remote_task("b", &ws, None)).unwrap();

    let report = with_timeout(pipeline.run()).await.unwrap();

    assert_eq!(a.state(), TaskState::Finished);
    assert_eq!(b.state(), TaskState::Finished);
    assert_eq!(report.exit_code(), 0);
    assert_eq!(client.submissions().len(), 2);
}
