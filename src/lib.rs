// src/lib.rs

//! depline — a dependency-aware task pipeline.
//!
//! Tasks declare the artifacts they consume and produce; the pipeline derives
//! the task DAG from that dataflow, schedules ready tasks onto a pluggable
//! executor backend, propagates failures through dependents, and renders a
//! live status view.
//!
//! ```no_run
//! use std::sync::Arc;
//! use depline::{Artifact, InlineExecutor, Pipeline, Task};
//!
//! # async fn example() -> depline::Result<()> {
//! let input = Artifact::new("data/in.txt");
//! let output = Artifact::new("data/out.txt");
//!
//! let out = output.clone();
//! let convert = Task::builder("convert", move |_io| {
//!     std::fs::write(out.path(), "converted")?;
//!     Ok(())
//! })
//! .dependency(&input)
//! .product(&output)
//! .build();
//!
//! let mut pipeline = Pipeline::new(Arc::new(InlineExecutor::new()));
//! pipeline.add_task(convert)?;
//! let report = pipeline.run().await?;
//! std::process::exit(report.exit_code());
//! # }
//! ```

pub mod artifact;
pub mod dag;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod pipeline;
pub mod task;

pub use artifact::Artifact;
pub use errors::{DeplineError, Result};
pub use exec::{ClusterExecutor, Executor, InlineExecutor, JobClient, PoolExecutor};
pub use pipeline::{Pipeline, PipelineConfig, RunReport};
pub use task::{Task, TaskBuilder, TaskFailure, TaskFailureKind, TaskIo, TaskState};
