// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

use crate::artifact::Artifact;

#[derive(Error, Debug)]
pub enum DeplineError {
    #[error(
        "product {product} is already registered by task '{existing}'; \
         task '{attempted}' cannot register it again"
    )]
    ProductAlreadyRegistered {
        product: Artifact,
        existing: String,
        attempted: String,
    },

    #[error(
        "hard dependency '{dependency}' of task '{task}' is not in the queue; \
         add tasks in dependency order"
    )]
    TaskNotInQueue { task: String, dependency: String },

    #[error(
        "dependency {artifact} of task '{task}' does not exist and no registered task produces it"
    )]
    DependencyNotAvailable { artifact: Artifact, task: String },

    #[error("cycle detected in task graph involving task '{task}'")]
    CyclicDependency { task: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, DeplineError>;
