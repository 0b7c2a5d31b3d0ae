//! Per-test diagnostic buffering.
//!
//! Log lines and step entries are buffered per test context so that parallel
//! tests never see each other's output. Output from setup and teardown
//! methods is folded into the buffer of the test they ran for.

use restcheck_core::sink::{LogSink, Step, StepRecorder, TracingLogSink, TracingStepRecorder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::events::TestId;

/// Diagnostic content bound to one test's record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticArtifact {
    pub name: String,
    pub content_type: String,
    pub content: String,
}

impl DiagnosticArtifact {
    pub fn text(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content_type: "text/plain".to_string(),
            content: content.into(),
        }
    }
}

/// Output accumulated for one test since its last attach point.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    pub lines: Vec<String>,
    pub steps: Vec<Step>,
}

impl Diagnostics {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.steps.is_empty()
    }

    pub fn extend(&mut self, mut other: Diagnostics) {
        self.lines.append(&mut other.lines);
        self.steps.append(&mut other.steps);
    }

    /// The log as one `text/plain` artifact and the step trace as one JSON
    /// artifact; empty parts yield nothing.
    pub fn artifacts(&self) -> Vec<DiagnosticArtifact> {
        let mut artifacts = Vec::new();
        if !self.lines.is_empty() {
            let mut content = self.lines.join("\n");
            content.push('\n');
            artifacts.push(DiagnosticArtifact::text("logs", content));
        }
        if !self.steps.is_empty() {
            // Steps hold only strings and unit enums.
            let content = serde_json::to_string_pretty(&self.steps).unwrap_or_default();
            artifacts.push(DiagnosticArtifact {
                name: "steps".to_string(),
                content_type: "application/json".to_string(),
                content,
            });
        }
        artifacts
    }
}

/// Accumulates diagnostics since the last attach point, per test context.
#[derive(Debug, Default)]
pub struct AttachmentCollector {
    buffers: Mutex<HashMap<TestId, Diagnostics>>,
}

impl AttachmentCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_buffers<R>(&self, f: impl FnOnce(&mut HashMap<TestId, Diagnostics>) -> R) -> R {
        let mut guard = self
            .buffers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    pub fn push_line(&self, test: &TestId, line: &str) {
        self.with_buffers(|b| {
            b.entry(test.clone())
                .or_default()
                .lines
                .push(line.to_string())
        });
    }

    pub fn push_step(&self, test: &TestId, step: Step) {
        self.with_buffers(|b| b.entry(test.clone()).or_default().steps.push(step));
    }

    /// Drain everything accumulated for `test`.
    pub fn take(&self, test: &TestId) -> Diagnostics {
        self.with_buffers(|b| b.remove(test).unwrap_or_default())
    }

    /// Move the buffer of configuration method `from` onto the end of `owner`'s.
    pub fn fold_into(&self, from: &TestId, owner: &TestId) {
        if from == owner {
            return;
        }
        self.with_buffers(|b| {
            if let Some(moved) = b.remove(from) {
                b.entry(owner.clone()).or_default().extend(moved);
            }
        });
    }

    /// Drop every buffer. Returns the number of contexts discarded.
    pub fn clear(&self) -> usize {
        self.with_buffers(|b| {
            let discarded = b.values().filter(|buf| !buf.is_empty()).count();
            b.clear();
            discarded
        })
    }

    /// Number of contexts with pending output.
    pub fn pending_contexts(&self) -> usize {
        self.with_buffers(|b| b.values().filter(|buf| !buf.is_empty()).count())
    }
}

/// Log sink and step recorder bound to one test context.
///
/// Buffers into the collector and forwards to `tracing`; no file IO happens
/// on the check path.
#[derive(Debug, Clone)]
pub struct ContextSink {
    collector: Arc<AttachmentCollector>,
    test: TestId,
}

impl ContextSink {
    pub fn new(collector: Arc<AttachmentCollector>, test: TestId) -> Self {
        Self { collector, test }
    }

    pub fn test(&self) -> &TestId {
        &self.test
    }
}

impl LogSink for ContextSink {
    fn info(&self, message: &str) {
        let _span = tracing::info_span!("restcheck.test", test_id = %self.test).entered();
        TracingLogSink.info(message);
        self.collector.push_line(&self.test, message);
    }
}

impl StepRecorder for ContextSink {
    fn step(&self, step: Step) {
        let _span = tracing::info_span!("restcheck.test", test_id = %self.test).entered();
        TracingStepRecorder.step(step.clone());
        self.collector.push_step(&self.test, step);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use restcheck_core::sink::StepStatus;

    fn id(s: &str) -> TestId {
        TestId(s.to_string())
    }

    #[test]
    fn test_take_drains_only_own_buffer() {
        let collector = AttachmentCollector::new();
        collector.push_line(&id("a"), "Assertion Passed: a1");
        collector.push_line(&id("b"), "Assertion Passed: b1");
        collector.push_step(&id("a"), Step::new("Verify status", StepStatus::Passed));

        let artifacts = collector.take(&id("a")).artifacts();
        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[0].name, "logs");
        assert_eq!(artifacts[0].content, "Assertion Passed: a1\n");
        assert!(artifacts[1].content.contains("Verify status"));

        assert!(collector.take(&id("a")).is_empty());
        assert_eq!(collector.pending_contexts(), 1);
        assert_eq!(
            collector.take(&id("b")).artifacts()[0].content,
            "Assertion Passed: b1\n"
        );
    }

    #[test]
    fn test_configuration_output_folds_into_its_owner_only() {
        let collector = AttachmentCollector::new();
        collector.push_line(&id("a"), "Test Case a started");
        collector.push_line(&id("setUp-b"), "Assertion Passed: token for b");
        collector.fold_into(&id("setUp-b"), &id("b"));
        collector.push_line(&id("b"), "Test Case b started");

        assert_eq!(collector.take(&id("a")).lines, vec!["Test Case a started"]);
        assert_eq!(
            collector.take(&id("b")).lines,
            vec!["Assertion Passed: token for b", "Test Case b started"]
        );
        assert_eq!(collector.pending_contexts(), 0);
    }

    #[test]
    fn test_clear_discards_everything() {
        let collector = AttachmentCollector::new();
        collector.push_line(&id("tearDown"), "leftover");
        collector.push_line(&id("orphan"), "never attached");
        assert_eq!(collector.clear(), 2);
        assert_eq!(collector.pending_contexts(), 0);
        assert!(collector.take(&id("orphan")).is_empty());
    }

    #[test]
    fn test_diagnostics_extend_keeps_order() {
        let mut first = Diagnostics {
            lines: vec!["one".to_string()],
            steps: Vec::new(),
        };
        first.extend(Diagnostics {
            lines: vec!["two".to_string()],
            steps: vec![Step::new("s", StepStatus::Passed)],
        });
        assert_eq!(first.lines, vec!["one", "two"]);
        assert_eq!(first.artifacts().len(), 2);
        assert!(Diagnostics::default().artifacts().is_empty());
    }

    #[test]
    fn test_context_sink_buffers_by_context() {
        let collector = Arc::new(AttachmentCollector::new());
        let a = ContextSink::new(collector.clone(), id("a"));
        let b = ContextSink::new(collector.clone(), id("b"));
        a.info("one");
        b.info("two");
        a.step(Step::new("s", StepStatus::Failed));

        assert_eq!(a.test(), &id("a"));
        let for_a = collector.take(&id("a")).artifacts();
        assert_eq!(for_a[0].content, "one\n");
        assert_eq!(for_a[1].content_type, "application/json");
        assert_eq!(collector.take(&id("b")).artifacts()[0].content, "two\n");
    }
}
