//! Log and step-trace sinks written to by every check.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Outcome attached to a step-trace entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    Failed,
    /// The check could not be evaluated (malformed input).
    Broken,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Passed => write!(f, "passed"),
            StepStatus::Failed => write!(f, "failed"),
            StepStatus::Broken => write!(f, "broken"),
        }
    }
}

/// One step-trace entry, named after the check with its rendered values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    pub status: StepStatus,
}

impl Step {
    pub fn new(name: impl Into<String>, status: StepStatus) -> Self {
        Self {
            name: name.into(),
            status,
        }
    }
}

/// Receives human-readable log lines.
pub trait LogSink: Send + Sync {
    fn info(&self, message: &str);
}

/// Receives step-trace entries.
pub trait StepRecorder: Send + Sync {
    fn step(&self, step: Step);
}

/// Forwards log lines to `tracing` at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn info(&self, message: &str) {
        info!(target: "restcheck", "{}", message);
    }
}

/// Forwards step entries to `tracing`; failed and broken steps at warn level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingStepRecorder;

impl StepRecorder for TracingStepRecorder {
    fn step(&self, step: Step) {
        match step.status {
            StepStatus::Passed => {
                info!(event = "step.recorded", status = %step.status, step = %step.name)
            }
            StepStatus::Failed | StepStatus::Broken => {
                warn!(event = "step.recorded", status = %step.status, step = %step.name)
            }
        }
    }
}
