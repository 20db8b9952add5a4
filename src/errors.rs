// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::sync::Arc;

use thiserror::Error;

use crate::task::TaskId;

#[derive(Error, Debug)]
pub enum ArisaError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Watch error: {0}")]
    WatchError(#[from] notify::Error),

    #[error("Invalid glob pattern: {0}")]
    PatternError(#[from] globset::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failure of a memoized task computation.
///
/// Cloneable so that one rejection can be handed to every caller that was
/// waiting on the same in-flight computation.
#[derive(Error, Debug, Clone)]
pub enum TaskError {
    #[error("task {task} failed: {reason:#}")]
    Failed {
        task: TaskId,
        reason: Arc<anyhow::Error>,
    },

    #[error("dependency cycle: task {downstream} cannot depend on task {upstream}")]
    Cycle { downstream: TaskId, upstream: TaskId },
}

impl TaskError {
    pub(crate) fn failed(task: TaskId, reason: anyhow::Error) -> Self {
        TaskError::Failed {
            task,
            reason: Arc::new(reason),
        }
    }

    /// The task whose computation produced this error.
    pub fn task(&self) -> TaskId {
        match self {
            TaskError::Failed { task, .. } => *task,
            TaskError::Cycle { downstream, .. } => *downstream,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ArisaError>;
