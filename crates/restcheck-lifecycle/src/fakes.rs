//! In-memory collaborators for tests.
//!
//! `RecordingPublisher` counts every backend call so hosts can assert the
//! run-finish sequence without generating reports; `MemoryJanitor` and
//! `MemoryEnvironmentWriter` record what would have touched the filesystem.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::config::RunConfig;
use crate::environment::{EnvironmentWriter, ENVIRONMENT_FILE};
use crate::error::ReportPublishError;
use crate::janitor::{CleanupWarning, OutputJanitor};
use crate::report::{
    ReportArtifact, ReportPublisher, ReportSummary, FULL_DIR, LATEST_DIR, SINGLE_DIR,
};
use crate::results::read_records;

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One call made to a [`RecordingPublisher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublisherCall {
    CopyHistory,
    Generate { include_history: bool },
    RenameLatest { include_history: bool },
    Open(PathBuf),
}

/// Report publisher that records calls and writes nothing.
///
/// `generate` still reads the result records so report totals are real.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    calls: Mutex<Vec<PublisherCall>>,
    fail_generate: bool,
    carried: usize,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `generate` call fails with an IO error.
    pub fn failing_generate() -> Self {
        Self {
            fail_generate: true,
            ..Self::default()
        }
    }

    /// `copy_history` reports `carried` records.
    pub fn with_history(carried: usize) -> Self {
        Self {
            carried,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<PublisherCall> {
        lock(&self.calls).clone()
    }

    /// `include_history` flags of every generate call, in order.
    pub fn generated_variants(&self) -> Vec<bool> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                PublisherCall::Generate { include_history } => Some(include_history),
                _ => None,
            })
            .collect()
    }

    pub fn renames(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, PublisherCall::RenameLatest { .. }))
            .count()
    }

    fn push(&self, call: PublisherCall) {
        lock(&self.calls).push(call);
    }
}

#[async_trait]
impl ReportPublisher for RecordingPublisher {
    async fn copy_history(&self, _config: &RunConfig) -> Result<usize, ReportPublishError> {
        self.push(PublisherCall::CopyHistory);
        Ok(self.carried)
    }

    async fn generate(
        &self,
        config: &RunConfig,
        include_history: bool,
    ) -> Result<ReportArtifact, ReportPublishError> {
        self.push(PublisherCall::Generate { include_history });
        if self.fail_generate {
            return Err(ReportPublishError::io(
                &config.report_dir,
                std::io::Error::new(std::io::ErrorKind::Other, "report backend unavailable"),
            ));
        }
        let records = read_records(&config.results_dir).await?;
        let summary =
            ReportSummary::from_records(&config.suite_name, include_history, Utc::now(), &records);
        let history = if include_history {
            vec![summary.history_record()]
        } else {
            Vec::new()
        };
        let variant = if include_history { FULL_DIR } else { SINGLE_DIR };
        Ok(ReportArtifact {
            dir: config.report_dir.join(variant),
            include_history,
            summary,
            history,
        })
    }

    async fn rename_latest(
        &self,
        config: &RunConfig,
        artifact: &ReportArtifact,
    ) -> Result<PathBuf, ReportPublishError> {
        self.push(PublisherCall::RenameLatest {
            include_history: artifact.include_history,
        });
        Ok(config.report_dir.join(LATEST_DIR))
    }

    async fn open(&self, _config: &RunConfig, published: &Path) -> Result<(), ReportPublishError> {
        self.push(PublisherCall::Open(published.to_path_buf()));
        Ok(())
    }
}

/// Janitor that records targets and optionally reports every one as unremovable.
#[derive(Debug, Default)]
pub struct MemoryJanitor {
    calls: Mutex<Vec<PathBuf>>,
    failure: Option<String>,
}

impl MemoryJanitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Every target passed to the janitor, in order.
    pub fn calls(&self) -> Vec<PathBuf> {
        lock(&self.calls).clone()
    }

    fn visit(&self, target: &Path) -> Option<CleanupWarning> {
        lock(&self.calls).push(target.to_path_buf());
        self.failure.as_ref().map(|reason| CleanupWarning {
            target: target.to_path_buf(),
            reason: reason.clone(),
        })
    }
}

#[async_trait]
impl OutputJanitor for MemoryJanitor {
    async fn clean_directory(&self, dir: &Path) -> Vec<CleanupWarning> {
        self.visit(dir).into_iter().collect()
    }

    async fn force_delete(&self, file: &Path) -> Option<CleanupWarning> {
        self.visit(file)
    }
}

/// Environment writer that keeps the last properties in memory.
#[derive(Debug, Default)]
pub struct MemoryEnvironmentWriter {
    written: Mutex<Option<BTreeMap<String, String>>>,
}

impl MemoryEnvironmentWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn written(&self) -> Option<BTreeMap<String, String>> {
        lock(&self.written).clone()
    }
}

#[async_trait]
impl EnvironmentWriter for MemoryEnvironmentWriter {
    async fn write(
        &self,
        results_dir: &Path,
        properties: &BTreeMap<String, String>,
    ) -> Result<PathBuf, ReportPublishError> {
        *lock(&self.written) = Some(properties.clone());
        Ok(results_dir.join(ENVIRONMENT_FILE))
    }
}
