// src/artifact.rs

//! Artifact references: opaque handles to external resources.
//!
//! The pipeline never mutates an artifact; it only asks whether it exists
//! and, for up-to-date checks, when it was last modified. Task functions
//! are the only place artifacts are actually read or written.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// A value-comparable reference to an external resource (a filesystem path).
///
/// Two references to the same logical resource compare equal; comparison is
/// purely on the path value, without touching the filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Artifact(PathBuf);

impl Artifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Whether the resource currently exists on disk.
    pub fn exists(&self) -> bool {
        self.0.exists()
    }

    /// Last modification time, or `None` if the resource does not exist
    /// (or its metadata is unavailable).
    pub fn mtime(&self) -> Option<SystemTime> {
        std::fs::metadata(&self.0).and_then(|m| m.modified()).ok()
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl From<PathBuf> for Artifact {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

impl From<&Path> for Artifact {
    fn from(path: &Path) -> Self {
        Self(path.to_path_buf())
    }
}

impl From<&str> for Artifact {
    fn from(path: &str) -> Self {
        Self(PathBuf::from(path))
    }
}

impl From<String> for Artifact {
    fn from(path: String) -> Self {
        Self(PathBuf::from(path))
    }
}

impl From<&Artifact> for Artifact {
    fn from(artifact: &Artifact) -> Self {
        artifact.clone()
    }
}
