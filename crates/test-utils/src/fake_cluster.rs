//! A fake cluster job client that:
//! - records every submission (with its dependency job ids)
//! - answers polls from a per-task script of external states
//! - records cancellations.
//!
//! Tests script the external system with [`FakeJobClient::plan`]; a task
//! without a plan goes through `RUNNING` then `COMPLETED`.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use depline::exec::{BoxedFuture, JobClient, JobId, JobSpec, JobState};
use depline::{Result, Task};

#[derive(Default)]
pub struct FakeJobClient {
    next_id: AtomicU64,
    plans: Mutex<HashMap<String, Vec<JobState>>>,
    scripts: Mutex<HashMap<JobId, VecDeque<JobState>>>,
    submissions: Mutex<Vec<JobSpec>>,
    cancelled: Mutex<Vec<JobId>>,
}

impl FakeJobClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the sequence of external states reported for `task_name`.
    /// Polls past the end of the script keep returning the last state.
    pub fn plan(&self, task_name: &str, states: impl IntoIterator<Item = JobState>) {
        self.plans
            .lock()
            .unwrap()
            .insert(task_name.to_string(), states.into_iter().collect());
    }

    /// Every submission the client received, in order.
    pub fn submissions(&self) -> Vec<JobSpec> {
        self.submissions.lock().unwrap().clone()
    }

    /// Every job id the client was asked to cancel.
    pub fn cancelled(&self) -> Vec<JobId> {
        self.cancelled.lock().unwrap().clone()
    }
}

impl JobClient for FakeJobClient {
    fn submit(&self, task: Arc<Task>, spec: JobSpec) -> BoxedFuture<'_, Result<JobId>> {
        let id: JobId = format!("job-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);

        let script: VecDeque<JobState> = self
            .plans
            .lock()
            .unwrap()
            .get(task.name())
            .cloned()
            .unwrap_or_else(|| vec![JobState::Running, JobState::Completed])
            .into();

        self.scripts.lock().unwrap().insert(id.clone(), script);
        self.submissions.lock().unwrap().push(spec);

        Box::pin(async move { Ok(id) })
    }

    fn poll(&self, id: JobId) -> BoxedFuture<'_, Result<JobState>> {
        let mut scripts = self.scripts.lock().unwrap();
        let state = match scripts.get_mut(&id) {
            Some(script) => {
                if script.len() > 1 {
                    script.pop_front().unwrap_or(JobState::Unknown)
                } else {
                    script.front().copied().unwrap_or(JobState::Unknown)
                }
            }
            None => JobState::Unknown,
        };
        Box::pin(async move { Ok(state) })
    }

    fn cancel(&self, id: JobId) -> BoxedFuture<'_, ()> {
        self.cancelled.lock().unwrap().push(id);
        Box::pin(async {})
    }
}
