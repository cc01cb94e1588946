//! On-disk artifact fixtures for pipeline tests.

use std::fs::File;
use std::time::{Duration, SystemTime};

use depline::Artifact;
use tempfile::TempDir;

/// A temporary directory with helpers to create artifacts in it.
///
/// Everything is removed when the workspace is dropped.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("creating temp workspace"),
        }
    }

    /// An artifact reference inside the workspace; nothing is created.
    pub fn artifact(&self, name: &str) -> Artifact {
        Artifact::new(self.dir.path().join(name))
    }

    /// Create (or overwrite) a file and return its artifact reference.
    pub fn write(&self, name: &str, contents: &str) -> Artifact {
        let artifact = self.artifact(name);
        std::fs::write(artifact.path(), contents).expect("writing fixture file");
        artifact
    }

    /// Create an empty file and return its artifact reference.
    pub fn touch(&self, name: &str) -> Artifact {
        self.write(name, "")
    }

    /// Backdate a file's modification time by `secs` seconds.
    ///
    /// Useful for up-to-date checks: a product older than its dependency
    /// must not be skipped.
    pub fn backdate(&self, name: &str, secs: u64) {
        let artifact = self.artifact(name);
        let file = File::options()
            .write(true)
            .open(artifact.path())
            .expect("opening fixture file");
        let then = SystemTime::now() - Duration::from_secs(secs);
        file.set_modified(then).expect("setting fixture mtime");
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}
