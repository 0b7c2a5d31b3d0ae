//! Lifecycle events produced by the host runner
//!
//! Events are consumed by the lifecycle manager and kept in an in-memory log
//! covering the current run; they are never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Identity of one test invocation within a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TestId(pub String);

impl std::fmt::Display for TestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A test as the host runner names it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestContext {
    /// Unique per invocation; parallel workers must not share one.
    pub id: TestId,

    /// Display name used in log lines and records.
    pub name: String,
}

impl TestContext {
    /// A context whose id is its name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: TestId(name.clone()),
            name,
        }
    }

    pub fn with_id(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: TestId(id.into()),
            name: name.into(),
        }
    }
}

/// What kind of method the host runner invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodKind {
    Test,
    Setup,
    Teardown,
}

/// One method invocation reported by the host runner.
///
/// `owner` is the test a setup or teardown method ran for; for test methods
/// it is the test itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvokedMethod {
    pub test: TestContext,
    pub kind: MethodKind,
    pub owner: TestId,
}

impl InvokedMethod {
    pub fn test(test: TestContext) -> Self {
        let owner = test.id.clone();
        Self {
            test,
            kind: MethodKind::Test,
            owner,
        }
    }

    pub fn setup(method: TestContext, owner: &TestContext) -> Self {
        Self {
            test: method,
            kind: MethodKind::Setup,
            owner: owner.id.clone(),
        }
    }

    pub fn teardown(method: TestContext, owner: &TestContext) -> Self {
        Self {
            test: method,
            kind: MethodKind::Teardown,
            owner: owner.id.clone(),
        }
    }

    pub fn is_test_method(&self) -> bool {
        self.kind == MethodKind::Test
    }
}

/// Terminal outcome of one test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestOutcome {
    Passed,
    Failed,
    Skipped,
}

impl std::fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestOutcome::Passed => write!(f, "passed"),
            TestOutcome::Failed => write!(f, "failed"),
            TestOutcome::Skipped => write!(f, "skipped"),
        }
    }
}

/// Lifecycle events, in the order the host runner emits them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum LifecycleEvent {
    /// The suite was named.
    SuiteConfigured(String),

    /// Output hygiene done, configuration and environment ready.
    RunStarted,

    /// A test method is about to run.
    TestInvoked(TestContext),

    /// Post-invocation hook: diagnostics attached to the test's record.
    TestAttached(TestContext),

    TestPassed(TestContext),

    TestFailed(TestContext),

    TestSkipped(TestContext),

    /// Reports generated and published.
    RunFinished,
}

impl LifecycleEvent {
    /// Outcome event for `test`.
    pub fn outcome(outcome: TestOutcome, test: TestContext) -> Self {
        match outcome {
            TestOutcome::Passed => LifecycleEvent::TestPassed(test),
            TestOutcome::Failed => LifecycleEvent::TestFailed(test),
            TestOutcome::Skipped => LifecycleEvent::TestSkipped(test),
        }
    }

    /// The test this event concerns, for per-test events.
    pub fn test(&self) -> Option<&TestContext> {
        match self {
            LifecycleEvent::TestInvoked(t)
            | LifecycleEvent::TestAttached(t)
            | LifecycleEvent::TestPassed(t)
            | LifecycleEvent::TestFailed(t)
            | LifecycleEvent::TestSkipped(t) => Some(t),
            LifecycleEvent::SuiteConfigured(_)
            | LifecycleEvent::RunStarted
            | LifecycleEvent::RunFinished => None,
        }
    }

    pub fn is_outcome(&self) -> bool {
        matches!(
            self,
            LifecycleEvent::TestPassed(_)
                | LifecycleEvent::TestFailed(_)
                | LifecycleEvent::TestSkipped(_)
        )
    }
}

/// A recorded event with its position in the log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub sequence: u64,
    pub event: LifecycleEvent,
    pub recorded_at: DateTime<Utc>,
}

/// Thread-safe event log, reset at each run start.
#[derive(Debug, Default)]
pub struct EventRecorder {
    records: Mutex<Vec<EventRecord>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event, returning its sequence number.
    pub fn record(&self, event: LifecycleEvent) -> u64 {
        let mut records = self
            .records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let sequence = records.len() as u64;
        records.push(EventRecord {
            sequence,
            event,
            recorded_at: Utc::now(),
        });
        sequence
    }

    /// Start a new run's log. Suite configuration recorded since the last run
    /// boundary is kept and renumbered; everything else is dropped.
    pub fn begin_run(&self) {
        let mut records = self
            .records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let boundary = records
            .iter()
            .rposition(|r| {
                matches!(
                    r.event,
                    LifecycleEvent::RunStarted | LifecycleEvent::RunFinished
                )
            })
            .map_or(0, |i| i + 1);
        let kept: Vec<EventRecord> = records
            .drain(..)
            .skip(boundary)
            .filter(|r| matches!(r.event, LifecycleEvent::SuiteConfigured(_)))
            .enumerate()
            .map(|(sequence, mut r)| {
                r.sequence = sequence as u64;
                r
            })
            .collect();
        *records = kept;
    }

    /// All events recorded so far, in order.
    pub fn records(&self) -> Vec<EventRecord> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Events concerning `test`, in order.
    pub fn events_for(&self, test: &TestId) -> Vec<LifecycleEvent> {
        self.records()
            .into_iter()
            .map(|r| r.event)
            .filter(|e| e.test().is_some_and(|t| &t.id == test))
            .collect()
    }
}
