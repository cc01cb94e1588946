// tests/run_pool.rs

//! Pipeline runs on the bounded pool executor: parallelism, ordering and
//! cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use depline::exec::Executor;
use depline::{Artifact, Pipeline, PipelineConfig, PoolExecutor, Task, TaskState};
use depline_test_utils::fixtures::Workspace;
use depline_test_utils::{init_tracing, with_timeout};

fn quiet_config() -> PipelineConfig {
    PipelineConfig {
        quiet: true,
        refresh_period: Duration::from_millis(5),
        ..Default::default()
    }
}

fn copy_task(name: &str, input: &Artifact, output: &Artifact) -> Arc<Task> {
    let inp = input.clone();
    let out = output.clone();
    Task::builder(name, move |_io| {
        let contents = std::fs::read_to_string(inp.path())?;
        std::fs::write(out.path(), contents)?;
        Ok(())
    })
    .dependency(input)
    .product(output)
    .build()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn chain_runs_in_order_on_pool() {
    init_tracing();
    let ws = Workspace::new();
    let input = ws.write("in.txt", "payload");
    let out1 = ws.artifact("out1.txt");
    let final1 = ws.artifact("final1.txt");

    let mut pipeline = Pipeline::with_config(Arc::new(PoolExecutor::new(2)), quiet_config());
    let a = pipeline.add_task(copy_task("a", &input, &out1)).unwrap();
    let b = pipeline.add_task(copy_task("b", &out1, &final1)).unwrap();

    let report = with_timeout(pipeline.run()).await.unwrap();

    assert_eq!(a.state(), TaskState::Finished);
    assert_eq!(b.state(), TaskState::Finished);
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failure_propagates_on_pool() {
    init_tracing();
    let ws = Workspace::new();
    let input = ws.write("in.txt", "payload");
    let out1 = ws.artifact("out1.txt");
    let final1 = ws.artifact("final1.txt");

    let mut pipeline = Pipeline::with_config(Arc::new(PoolExecutor::new(2)), quiet_config());
    let a = pipeline
        .add_task(
            Task::builder("a", |_io| anyhow::bail!("pool failure"))
                .dependency(&input)
                .product(&out1)
                .build(),
        )
        .unwrap();
    let b = pipeline.add_task(copy_task("b", &out1, &final1)).unwrap();

    let report = with_timeout(pipeline.run()).await.unwrap();

    assert_eq!(a.state(), TaskState::Failed);
    assert_eq!(b.state(), TaskState::DepFailed);
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn pool_bounds_concurrency() {
    init_tracing();
    let ws = Workspace::new();

    let workers = 2;
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut pipeline = Pipeline::with_config(Arc::new(PoolExecutor::new(workers)), quiet_config());

    for i in 0..6 {
        let product = ws.artifact(&format!("out{i}.txt"));
        let out = product.clone();
        let running = running.clone();
        let peak = peak.clone();
        pipeline
            .add_task(
                Task::builder(format!("task{i}"), move |_io| {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(40));
                    std::fs::write(out.path(), "done")?;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
                .product(&product)
                .build(),
            )
            .unwrap();
    }

    let report = with_timeout(pipeline.run()).await.unwrap();

    assert_eq!(report.exit_code(), 0);
    assert!(
        peak.load(Ordering::SeqCst) <= workers,
        "pool ran more than {workers} bodies at once"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stats_reflect_finished_tasks() {
    init_tracing();
    let ws = Workspace::new();

    let pool = Arc::new(PoolExecutor::new(2));
    let mut pipeline = Pipeline::with_config(pool.clone(), quiet_config());

    for i in 0..3 {
        let product = ws.artifact(&format!("out{i}.txt"));
        let out = product.clone();
        pipeline
            .add_task(
                Task::builder(format!("task{i}"), move |_io| {
                    std::fs::write(out.path(), "done")?;
                    Ok(())
                })
                .product(&product)
                .build(),
            )
            .unwrap();
    }

    let report = with_timeout(pipeline.run()).await.unwrap();
    assert_eq!(report.exit_code(), 0);

    let stats = pool.stats();
    assert_eq!(stats.done, 3);
    assert_eq!(stats.running, 0);
    assert_eq!(stats.queued, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancel_all_leaves_no_task_running() {
    init_tracing();

    let pool = PoolExecutor::new(1);

    let slow = Task::builder("slow", |_io| {
        std::thread::sleep(Duration::from_millis(300));
        Ok(())
    })
    .build();
    // With one worker, the second submission waits in the queue.
    let queued = Task::builder("queued", |_io| Ok(())).build();

    pool.submit(slow.clone(), Vec::new()).await.unwrap();
    pool.submit(queued.clone(), Vec::new()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    pool.cancel_all().await;
    pool.wait_for_all().await;

    assert_eq!(slow.state(), TaskState::Canceled);
    assert_eq!(queued.state(), TaskState::Canceled);
}
