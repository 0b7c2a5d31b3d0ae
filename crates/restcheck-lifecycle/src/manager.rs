//! Execution lifecycle manager.
//!
//! One handler per host-runner extension point. Run-level hooks
//! (`on_run_started`, `on_run_finished`) touch the filesystem and are
//! serialized; per-test hooks only lock the per-test table briefly and may be
//! called concurrently from parallel workers.

use chrono::{DateTime, Utc};
use restcheck_core::sink::LogSink;
use restcheck_core::VerificationEngine;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::warn;
use uuid::Uuid;

use crate::attachments::{AttachmentCollector, ContextSink, Diagnostics};
use crate::config::RunConfig;
use crate::environment::{environment_properties, EnvironmentWriter, PropertiesEnvironmentWriter};
use crate::error::{LifecycleError, ReportPublishError, Result};
use crate::events::{
    EventRecord, EventRecorder, InvokedMethod, LifecycleEvent, TestContext, TestId, TestOutcome,
};
use crate::janitor::{CleanupWarning, FsJanitor, OutputJanitor};
use crate::log_file::FileLogSink;
use crate::obs;
use crate::report::{FsReportPublisher, ReportArtifact, ReportPublisher};
use crate::results::{write_record, TestRecord};
use crate::state::LifecycleState;

/// What `on_run_started` did.
#[derive(Debug, Clone)]
pub struct RunStartSummary {
    pub config: RunConfig,
    /// Cleanup targets that could not be removed; the run proceeds regardless.
    pub cleanup_warnings: Vec<CleanupWarning>,
    /// `None` when the environment metadata could not be written.
    pub environment_file: Option<PathBuf>,
}

/// What `on_run_finished` published.
#[derive(Debug, Clone)]
pub struct PublishedReport {
    /// Stable location of the published report.
    pub latest: PathBuf,
    /// History records carried from the previous published report.
    pub history_carried: usize,
    /// The history-excluded variant, left in place.
    pub without_history: ReportArtifact,
    /// The history-including variant, before it was renamed to `latest`.
    pub with_history: ReportArtifact,
    pub total_tests: usize,
}

#[derive(Debug)]
struct RunState {
    state: LifecycleState,
    config: RunConfig,
    /// Survives configuration reloads at run start.
    configured_suite: Option<String>,
    started: Option<Instant>,
}

#[derive(Debug)]
struct TestProgress {
    context: TestContext,
    uuid: Uuid,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    diagnostics: Option<Diagnostics>,
    outcome: Option<TestOutcome>,
    persisted: bool,
}

impl TestProgress {
    fn new(context: TestContext, started_at: Option<DateTime<Utc>>) -> Self {
        Self {
            context,
            uuid: Uuid::new_v4(),
            started_at,
            finished_at: None,
            diagnostics: None,
            outcome: None,
            persisted: false,
        }
    }

    /// Take a record to persist once both the attach and the outcome happened.
    fn ready_record(&mut self) -> Option<TestRecord> {
        if self.persisted || self.diagnostics.is_none() || self.outcome.is_none() {
            return None;
        }
        self.persisted = true;
        self.finished_at = Some(Utc::now());
        self.record()
    }

    fn record(&self) -> Option<TestRecord> {
        let (Some(diagnostics), Some(status)) = (&self.diagnostics, self.outcome) else {
            return None;
        };
        Some(TestRecord {
            uuid: self.uuid,
            test_id: self.context.id.clone(),
            name: self.context.name.clone(),
            status,
            started_at: self.started_at,
            finished_at: self.finished_at.unwrap_or_else(Utc::now),
            attachments: diagnostics.artifacts(),
        })
    }
}

/// Coordinates suite, run and test hooks for one output location.
pub struct ExecutionLifecycleManager {
    config_path: Option<PathBuf>,
    run: Mutex<RunState>,
    tests: Mutex<HashMap<TestId, TestProgress>>,
    run_lock: tokio::sync::Mutex<()>,
    janitor: Arc<dyn OutputJanitor>,
    environment: Arc<dyn EnvironmentWriter>,
    publisher: Arc<dyn ReportPublisher>,
    attachments: Arc<AttachmentCollector>,
    log: Arc<dyn LogSink>,
    file_log: Option<Arc<FileLogSink>>,
    events: EventRecorder,
}

impl std::fmt::Debug for ExecutionLifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionLifecycleManager")
            .field("config_path", &self.config_path)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl ExecutionLifecycleManager {
    /// Manager over the local filesystem, logging lifecycle lines to
    /// `config.log_file`.
    pub fn new(config: RunConfig) -> Self {
        let file_log = Arc::new(FileLogSink::new(config.log_file.clone()));
        Self {
            config_path: None,
            run: Mutex::new(RunState {
                state: LifecycleState::Idle,
                config,
                configured_suite: None,
                started: None,
            }),
            tests: Mutex::new(HashMap::new()),
            run_lock: tokio::sync::Mutex::new(()),
            janitor: Arc::new(FsJanitor),
            environment: Arc::new(PropertiesEnvironmentWriter),
            publisher: Arc::new(FsReportPublisher),
            attachments: Arc::new(AttachmentCollector::new()),
            log: file_log.clone(),
            file_log: Some(file_log),
            events: EventRecorder::new(),
        }
    }

    /// Reload configuration from `path` (plus environment overrides) at every
    /// run start.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn with_janitor(mut self, janitor: Arc<dyn OutputJanitor>) -> Self {
        self.janitor = janitor;
        self
    }

    pub fn with_environment_writer(mut self, writer: Arc<dyn EnvironmentWriter>) -> Self {
        self.environment = writer;
        self
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn ReportPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    /// Send lifecycle lines to `log` instead of the run log file.
    pub fn with_log_sink(mut self, log: Arc<dyn LogSink>) -> Self {
        self.log = log;
        self.file_log = None;
        self
    }

    pub fn state(&self) -> LifecycleState {
        self.lock_run().state
    }

    /// Current run configuration.
    pub fn config(&self) -> RunConfig {
        self.lock_run().config.clone()
    }

    /// Every lifecycle event handled so far, in order.
    pub fn events(&self) -> Vec<EventRecord> {
        self.events.records()
    }

    /// Lifecycle events concerning one test.
    pub fn events_for(&self, test: &TestId) -> Vec<LifecycleEvent> {
        self.events.events_for(test)
    }

    /// A verification engine whose log and step output is attributed to `test`.
    pub fn engine_for(&self, test: &TestContext) -> VerificationEngine {
        let sink = Arc::new(ContextSink::new(self.attachments.clone(), test.id.clone()));
        VerificationEngine::new(sink.clone(), sink)
    }

    /// Dispatch a lifecycle event to its hook.
    pub async fn handle(&self, event: LifecycleEvent) -> Result<()> {
        match event {
            LifecycleEvent::SuiteConfigured(name) => self.on_suite_configured(&name),
            LifecycleEvent::RunStarted => self.on_run_started().await.map(|_| ()),
            LifecycleEvent::TestInvoked(test) => self.before_invocation(&InvokedMethod::test(test)),
            LifecycleEvent::TestAttached(test) => self
                .after_invocation(&InvokedMethod::test(test))
                .await
                .map(|_| ()),
            LifecycleEvent::TestPassed(test) => self.on_test_success(&test).await,
            LifecycleEvent::TestFailed(test) => self.on_test_failure(&test).await,
            LifecycleEvent::TestSkipped(test) => self.on_test_skipped(&test).await,
            LifecycleEvent::RunFinished => self.on_run_finished().await.map(|_| ()),
        }
    }

    /// Name the suite. Metadata only; during a run only the name changes.
    pub fn on_suite_configured(&self, suite_name: &str) -> Result<()> {
        {
            let mut run = self.lock_run();
            if run.state != LifecycleState::RunStarted {
                Self::transition(&mut run, LifecycleState::SuiteConfigured)?;
            }
            run.config.suite_name = suite_name.to_string();
            run.configured_suite = Some(suite_name.to_string());
        }
        obs::emit_suite_configured(suite_name);
        self.events
            .record(LifecycleEvent::SuiteConfigured(suite_name.to_string()));
        Ok(())
    }

    /// Purge prior output, load configuration and write environment metadata.
    ///
    /// Safe to call repeatedly; cleanup problems are returned as warnings.
    pub async fn on_run_started(&self) -> Result<RunStartSummary> {
        let _guard = self.run_lock.lock().await;
        let (current, configured_suite) = {
            let run = self.lock_run();
            if !run.state.can_transition_to(LifecycleState::RunStarted) {
                return Err(LifecycleError::InvalidTransition {
                    current: run.state,
                    requested: LifecycleState::RunStarted,
                });
            }
            (run.config.clone(), run.configured_suite.clone())
        };

        let mut config = match &self.config_path {
            Some(path) => RunConfig::load(Some(path)).await?,
            None => current,
        };
        if let Some(name) = configured_suite {
            config.suite_name = name;
        }
        if let Some(file_log) = &self.file_log {
            file_log.retarget(config.log_file.clone());
        }

        let mut cleanup_warnings = self.janitor.clean_directory(&config.results_dir).await;
        cleanup_warnings.extend(self.janitor.force_delete(&config.log_file).await);
        for warning in &cleanup_warnings {
            obs::emit_cleanup_warning(&warning.target.display().to_string(), &warning.reason);
        }

        self.log.info("Test Execution started");
        self.log.info("Directories cleaned");
        self.log.info("Properties loaded");

        let properties = environment_properties(&config);
        let environment_file = match self
            .environment
            .write(&config.results_dir, &properties)
            .await
        {
            Ok(path) => {
                self.log.info("Report environment set");
                Some(path)
            }
            Err(e) => {
                obs::emit_environment_error(&e);
                None
            }
        };

        self.lock_tests().clear();
        let discarded = self.attachments.clear();
        if discarded > 0 {
            warn!(
                event = "attachments.discarded",
                contexts = discarded,
                "output left over from a previous run"
            );
        }
        {
            let mut run = self.lock_run();
            Self::transition(&mut run, LifecycleState::RunStarted)?;
            run.config = config.clone();
            run.started = Some(Instant::now());
        }
        obs::emit_run_started(&config.suite_name, cleanup_warnings.len());
        self.events.begin_run();
        self.events.record(LifecycleEvent::RunStarted);

        Ok(RunStartSummary {
            config,
            cleanup_warnings,
            environment_file,
        })
    }

    /// Before-invocation hook. Logs only for test methods.
    pub fn before_invocation(&self, method: &InvokedMethod) -> Result<()> {
        self.require_running("before_invocation", &method.test)?;
        if !method.is_test_method() {
            return Ok(());
        }
        let test = &method.test;
        {
            let mut tests = self.lock_tests();
            if tests.contains_key(&test.id) {
                return Err(LifecycleError::DuplicateInvocation(test.id.to_string()));
            }
            tests.insert(
                test.id.clone(),
                TestProgress::new(test.clone(), Some(Utc::now())),
            );
        }

        let line = format!("Test Case {} started", test.name);
        self.log.info(&line);
        self.attachments.push_line(&test.id, &line);
        obs::emit_test_started(&test.id.0, &test.name);
        self.events.record(LifecycleEvent::TestInvoked(test.clone()));
        Ok(())
    }

    /// Unconditional after-invocation hook: attach buffered diagnostics.
    ///
    /// Fires for every outcome. Setup and teardown output is folded into the
    /// buffer of the test the method ran for; teardown output arriving after
    /// that test attached is appended to its record, rewriting the record if
    /// it was already persisted. Returns the number of artifacts attached to
    /// a test record by this call.
    pub async fn after_invocation(&self, method: &InvokedMethod) -> Result<usize> {
        self.require_running("after_invocation", &method.test)?;
        let test = &method.test;
        if !method.is_test_method() {
            self.attachments.fold_into(&test.id, &method.owner);
            let rewrite = self.merge_late_output(&method.owner);
            if let Some(record) = rewrite {
                self.persist(&record).await?;
            }
            return Ok(0);
        }

        let (count, ready) = {
            let mut tests = self.lock_tests();
            let progress = tests
                .get_mut(&test.id)
                .ok_or_else(|| LifecycleError::UnknownTest(test.id.to_string()))?;
            if progress.diagnostics.is_some() {
                return Err(LifecycleError::DuplicateAttach(test.id.to_string()));
            }
            let diagnostics = self.attachments.take(&test.id);
            let count = diagnostics.artifacts().len();
            progress.diagnostics = Some(diagnostics);
            (count, progress.ready_record())
        };

        obs::emit_test_attached(&test.id.0, count);
        self.events.record(LifecycleEvent::TestAttached(test.clone()));
        if let Some(record) = ready {
            self.persist(&record).await?;
        }
        Ok(count)
    }

    /// Append output buffered for an already attached `owner` to its
    /// diagnostics. Returns the record to rewrite when it was persisted.
    fn merge_late_output(&self, owner: &TestId) -> Option<TestRecord> {
        let mut tests = self.lock_tests();
        let progress = tests.get_mut(owner)?;
        let diagnostics = progress.diagnostics.as_mut()?;
        let late = self.attachments.take(owner);
        if late.is_empty() {
            return None;
        }
        diagnostics.extend(late);
        if progress.persisted {
            progress.record()
        } else {
            None
        }
    }

    pub async fn on_test_success(&self, test: &TestContext) -> Result<()> {
        self.record_outcome(test, TestOutcome::Passed).await
    }

    pub async fn on_test_failure(&self, test: &TestContext) -> Result<()> {
        self.record_outcome(test, TestOutcome::Failed).await
    }

    /// Skips may arrive without an invocation (a failed dependency); such a
    /// test is recorded immediately with whatever output is buffered for it.
    pub async fn on_test_skipped(&self, test: &TestContext) -> Result<()> {
        self.record_outcome(test, TestOutcome::Skipped).await
    }

    async fn record_outcome(&self, test: &TestContext, outcome: TestOutcome) -> Result<()> {
        let hook = format!("on_test_{}", outcome);
        self.require_running(&hook, test)?;

        let ready = {
            let mut tests = self.lock_tests();
            if !tests.contains_key(&test.id) {
                if outcome != TestOutcome::Skipped {
                    return Err(LifecycleError::UnknownTest(test.id.to_string()));
                }
                let mut progress = TestProgress::new(test.clone(), None);
                progress.diagnostics = Some(self.attachments.take(&test.id));
                tests.insert(test.id.clone(), progress);
            }
            let progress = tests
                .get_mut(&test.id)
                .ok_or_else(|| LifecycleError::UnknownTest(test.id.to_string()))?;
            if let Some(existing) = progress.outcome {
                return Err(LifecycleError::DuplicateOutcome {
                    test: test.id.to_string(),
                    existing: existing.to_string(),
                });
            }
            progress.outcome = Some(outcome);
            progress.ready_record()
        };

        self.log
            .info(&format!("Test Case {} {}", test.name, outcome));
        obs::emit_test_outcome(&test.id.0, &test.name, outcome);
        self.events
            .record(LifecycleEvent::outcome(outcome, test.clone()));
        if let Some(record) = ready {
            self.persist(&record).await?;
        }
        Ok(())
    }

    /// Carry history forward, generate both report variants and publish the
    /// history-including one as the latest report.
    ///
    /// A publish failure is returned and the manager goes back to `Idle`;
    /// result records already written stay on disk.
    pub async fn on_run_finished(&self) -> Result<PublishedReport> {
        let _guard = self.run_lock.lock().await;
        let (config, started) = {
            let mut run = self.lock_run();
            Self::transition(&mut run, LifecycleState::RunFinished)?;
            (run.config.clone(), run.started.take())
        };

        let total_tests = self.flush_pending().await;

        let published = match self.publish(&config).await {
            Ok(published) => published,
            Err(e) => {
                obs::emit_publish_error(&config.suite_name, &e);
                self.reset_to_idle();
                return Err(e.into());
            }
        };
        if let Err(e) = self.publisher.open(&config, &published.latest).await {
            obs::emit_publish_error(&config.suite_name, &e);
        }

        self.log.info("Test Execution Finished");
        self.reset_to_idle();
        let duration_ms = started
            .map(|s| s.elapsed().as_millis() as u64)
            .unwrap_or_default();
        obs::emit_run_finished(&config.suite_name, total_tests, duration_ms);
        self.events.record(LifecycleEvent::RunFinished);

        Ok(PublishedReport {
            total_tests,
            ..published
        })
    }

    /// Publish reports from the results already on disk, outside a run.
    pub async fn publish_results(&self) -> Result<PublishedReport> {
        let _guard = self.run_lock.lock().await;
        let config = {
            let run = self.lock_run();
            if run.state == LifecycleState::RunStarted {
                return Err(LifecycleError::InvalidTransition {
                    current: run.state,
                    requested: LifecycleState::RunFinished,
                });
            }
            run.config.clone()
        };
        let records = crate::results::read_records(&config.results_dir).await?;
        let published = self.publish(&config).await?;
        if let Err(e) = self.publisher.open(&config, &published.latest).await {
            obs::emit_publish_error(&config.suite_name, &e);
        }
        Ok(PublishedReport {
            total_tests: records.len(),
            ..published
        })
    }

    async fn publish(
        &self,
        config: &RunConfig,
    ) -> std::result::Result<PublishedReport, ReportPublishError> {
        let history_carried = self.publisher.copy_history(config).await?;
        let without_history = self.publisher.generate(config, false).await?;
        let with_history = self.publisher.generate(config, true).await?;
        let latest = self.publisher.rename_latest(config, &with_history).await?;
        Ok(PublishedReport {
            latest,
            history_carried,
            without_history,
            with_history,
            total_tests: 0,
        })
    }

    /// Persist tests that have an outcome but were never attached. Returns the
    /// number of tests seen this run.
    async fn flush_pending(&self) -> usize {
        let (total, pending) = {
            let mut tests = self.lock_tests();
            let total = tests.len();
            let mut pending = Vec::new();
            for progress in tests.values_mut() {
                if progress.outcome.is_some() && progress.diagnostics.is_none() {
                    warn!(
                        event = "test.attach_missing",
                        test_id = %progress.context.id,
                        "outcome recorded without an attach"
                    );
                    progress.diagnostics = Some(self.attachments.take(&progress.context.id));
                    pending.extend(progress.ready_record());
                } else if progress.outcome.is_none() {
                    warn!(
                        event = "test.outcome_missing",
                        test_id = %progress.context.id,
                        "test invoked without an outcome"
                    );
                }
            }
            (total, pending)
        };
        for record in pending {
            if let Err(e) = self.persist(&record).await {
                warn!(event = "test.persist_error", test_id = %record.test_id, error = %e);
            }
        }
        total
    }

    async fn persist(&self, record: &TestRecord) -> Result<()> {
        let results_dir = self.lock_run().config.results_dir.clone();
        write_record(&results_dir, record).await?;
        Ok(())
    }

    fn reset_to_idle(&self) {
        self.lock_tests().clear();
        self.attachments.clear();
        let mut run = self.lock_run();
        run.state = LifecycleState::Idle;
        run.started = None;
    }

    fn require_running(&self, hook: &str, test: &TestContext) -> Result<()> {
        if self.state() == LifecycleState::RunStarted {
            Ok(())
        } else {
            Err(LifecycleError::RunNotStarted {
                hook: hook.to_string(),
                test: test.name.clone(),
            })
        }
    }

    fn transition(run: &mut RunState, next: LifecycleState) -> Result<()> {
        if !run.state.can_transition_to(next) {
            return Err(LifecycleError::InvalidTransition {
                current: run.state,
                requested: next,
            });
        }
        run.state = next;
        Ok(())
    }

    fn lock_run(&self) -> std::sync::MutexGuard<'_, RunState> {
        self.run.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_tests(&self) -> std::sync::MutexGuard<'_, HashMap<TestId, TestProgress>> {
        self.tests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
