//! Error types for lifecycle operations

use std::path::PathBuf;
use thiserror::Error;

use crate::state::LifecycleState;

/// Report generation or publication failure.
///
/// Fatal to the run-finish step only; test records already written stay valid.
#[derive(Error, Debug)]
pub enum ReportPublishError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt test record {path}: {reason}")]
    CorruptRecord { path: PathBuf, reason: String },

    #[error("failed to open report {path}: {reason}")]
    Open { path: PathBuf, reason: String },
}

impl ReportPublishError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ReportPublishError::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Invalid lifecycle transition: {current} -> {requested}")]
    InvalidTransition {
        current: LifecycleState,
        requested: LifecycleState,
    },

    #[error("Run not started: cannot handle '{hook}' for test {test}")]
    RunNotStarted { hook: String, test: String },

    #[error("Unknown test context: {0}")]
    UnknownTest(String),

    #[error("Test {test} already has an outcome ({existing})")]
    DuplicateOutcome { test: String, existing: String },

    #[error("Test {0} was already invoked in this run")]
    DuplicateInvocation(String),

    #[error("Diagnostics already attached for test {0}")]
    DuplicateAttach(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Results store error at {path}: {source}")]
    Results {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Report publish failed: {0}")]
    Publish(#[from] ReportPublishError),
}

/// Result type for lifecycle operations
pub type Result<T> = std::result::Result<T, LifecycleError>;
