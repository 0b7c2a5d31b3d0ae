//! Structured observability hooks for run and test lifecycle events.
//!
//! Every lifecycle transition emits one `tracing` event with an `event` field
//! (`run.started`, `test.passed`, ...). The human-readable log lines written
//! to the run log file are separate and come from the manager.

use tracing::{info, warn};

use crate::events::TestOutcome;

pub fn emit_suite_configured(suite_name: &str) {
    info!(event = "suite.configured", suite = %suite_name);
}

/// Emit event: run started, with the number of cleanup warnings absorbed.
pub fn emit_run_started(suite_name: &str, cleanup_warnings: usize) {
    info!(
        event = "run.started",
        suite = %suite_name,
        cleanup_warnings = cleanup_warnings,
    );
}

pub fn emit_test_started(test_id: &str, test_name: &str) {
    info!(event = "test.started", test_id = %test_id, test = %test_name);
}

/// Emit event: diagnostics attached to a test record.
pub fn emit_test_attached(test_id: &str, artifacts: usize) {
    info!(event = "test.attached", test_id = %test_id, artifacts = artifacts);
}

/// Emit event: terminal outcome of a test.
pub fn emit_test_outcome(test_id: &str, test_name: &str, outcome: TestOutcome) {
    match outcome {
        TestOutcome::Passed => info!(event = "test.passed", test_id = %test_id, test = %test_name),
        TestOutcome::Failed => warn!(event = "test.failed", test_id = %test_id, test = %test_name),
        TestOutcome::Skipped => {
            info!(event = "test.skipped", test_id = %test_id, test = %test_name)
        }
    }
}

/// Emit event: run finished and reports published.
pub fn emit_run_finished(suite_name: &str, total_tests: usize, duration_ms: u64) {
    info!(
        event = "run.finished",
        suite = %suite_name,
        total_tests = total_tests,
        duration_ms = duration_ms,
    );
}

/// Emit event: a cleanup target could not be removed (warning level).
pub fn emit_cleanup_warning(target: &str, reason: &dyn std::fmt::Display) {
    warn!(event = "run.cleanup_warning", target = %target, reason = %reason);
}

/// Emit event: environment metadata could not be written (warning level).
pub fn emit_environment_error(error: &dyn std::fmt::Display) {
    warn!(event = "run.environment_error", error = %error);
}

/// Emit event: report publication failed (warning level).
pub fn emit_publish_error(suite_name: &str, error: &dyn std::fmt::Display) {
    warn!(event = "run.publish_error", suite = %suite_name, error = %error);
}
