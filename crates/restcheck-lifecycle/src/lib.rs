//! restcheck lifecycle
//!
//! Suite, run and test hooks for a host test runner:
//! - run start: output hygiene, configuration, environment metadata
//! - per test: "started" and outcome log lines, diagnostics attached once
//! - run finish: history carried forward, two report variants, latest published
//!
//! [`ExecutionLifecycleManager`] is the single entry point; its collaborators
//! are traits with filesystem implementations and in-memory [`fakes`].

pub mod attachments;
pub mod config;
pub mod environment;
pub mod error;
pub mod events;
pub mod fakes;
pub mod janitor;
pub mod log_file;
pub mod manager;
pub mod obs;
pub mod report;
pub mod results;
pub mod state;

pub use attachments::{AttachmentCollector, ContextSink, DiagnosticArtifact, Diagnostics};
pub use config::RunConfig;
pub use environment::{EnvironmentWriter, PropertiesEnvironmentWriter};
pub use error::{LifecycleError, ReportPublishError, Result};
pub use events::{
    EventRecord, EventRecorder, InvokedMethod, LifecycleEvent, MethodKind, TestContext, TestId,
    TestOutcome,
};
pub use janitor::{CleanupWarning, FsJanitor, OutputJanitor};
pub use log_file::FileLogSink;
pub use manager::{ExecutionLifecycleManager, PublishedReport, RunStartSummary};
pub use report::{FsReportPublisher, HistoryRecord, ReportArtifact, ReportPublisher, ReportSummary};
pub use results::TestRecord;
pub use state::LifecycleState;

/// restcheck version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
