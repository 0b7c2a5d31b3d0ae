//! In-memory sinks for tests.
//!
//! Capture everything the verification engine writes so assertions can be
//! made about log and step counts.

use std::sync::Mutex;

use crate::sink::{LogSink, Step, StepRecorder};

/// Log sink that keeps every line in memory.
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    lines: Mutex<Vec<String>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the captured lines.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.lines().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LogSink for MemoryLogSink {
    fn info(&self, message: &str) {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(message.to_string());
    }
}

/// Step recorder that keeps every entry in memory.
#[derive(Debug, Default)]
pub struct MemoryStepRecorder {
    steps: Mutex<Vec<Step>>,
}

impl MemoryStepRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the captured steps.
    pub fn steps(&self) -> Vec<Step> {
        self.steps
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl StepRecorder for MemoryStepRecorder {
    fn step(&self, step: Step) {
        self.steps
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(step);
    }
}
