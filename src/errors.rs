// src/errors.rs

//! Crate-wide error type and aliases.

use thiserror::Error;

use crate::engine::TaskName;

#[derive(Error, Debug)]
pub enum SitedagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Unknown task: {0}")]
    UnknownTask(TaskName),

    #[error("task '{task}' lists undefined prerequisite '{prerequisite}'")]
    InvalidReference {
        task: TaskName,
        prerequisite: TaskName,
    },

    #[error("Cycle detected in task graph: {}", .path.join(" -> "))]
    CycleDetected { path: Vec<TaskName> },

    #[error("task '{task}' failed: {message}")]
    ActionFailure { task: TaskName, message: String },

    #[error("transfer failed for {failed} of {total} files (first: {first})")]
    TransferFailure {
        failed: usize,
        total: usize,
        first: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SitedagError {
    /// True for errors raised while building or resolving the task graph,
    /// i.e. before any action had a chance to run.
    pub fn is_definition_error(&self) -> bool {
        matches!(
            self,
            SitedagError::UnknownTask(_)
                | SitedagError::InvalidReference { .. }
                | SitedagError::CycleDetected { .. }
                | SitedagError::ConfigError(_)
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SitedagError>;
