// src/task/capture.rs

//! Per-task output capture.
//!
//! Instead of redirecting process-global stdio, each task function receives a
//! [`TaskIo`] for the duration of its body. Whatever it writes there is kept
//! on the task and printed by the pipeline's failure report once the task is
//! terminal. The capture is scoped: it exists only while the function runs,
//! on every exit path.

use std::io::Write;

/// Capture sink handed to a task function.
///
/// ```no_run
/// # use std::io::Write;
/// # use depline::task::TaskIo;
/// # fn body(io: &mut TaskIo) -> anyhow::Result<()> {
/// writeln!(io.stdout(), "converting input")?;
/// writeln!(io.stderr(), "warning: low disk space")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct TaskIo {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl TaskIo {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Captured standard output sink.
    pub fn stdout(&mut self) -> &mut impl Write {
        &mut self.stdout
    }

    /// Captured standard error sink.
    pub fn stderr(&mut self) -> &mut impl Write {
        &mut self.stderr
    }

    pub(crate) fn into_buffers(self) -> (Vec<u8>, Vec<u8>) {
        (self.stdout, self.stderr)
    }
}
