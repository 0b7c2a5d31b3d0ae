//! Report generation and publication.
//!
//! Layout under `report_dir`:
//!
//! ```text
//! report_dir/
//!   latest/                      published history-including report
//!     summary.json
//!     index.md
//!     history/history.json       newest first
//!   single/                      history-excluded variant
//!   full/                        staging for the next `latest`
//! ```
//!
//! At run finish the previous `latest/history/history.json` is copied into the
//! results directory, both variants are regenerated in place from the result
//! records, and the history-including variant replaces `latest`. The
//! directory set stays fixed however many runs publish into it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::RunConfig;
use crate::error::ReportPublishError;
use crate::events::TestOutcome;
use crate::results::{read_records, TestRecord};

/// Name of the published report directory.
pub const LATEST_DIR: &str = "latest";
/// Name of the history-excluded report directory.
pub const SINGLE_DIR: &str = "single";
/// Staging directory of the history-including report, renamed to `latest`.
pub const FULL_DIR: &str = "full";
const HISTORY_DIR: &str = "history";
const HISTORY_FILE: &str = "history.json";
const SUMMARY_FILE: &str = "summary.json";
const INDEX_FILE: &str = "index.md";

/// Trend data for one past run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub generated_at: DateTime<Utc>,
    pub suite_name: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// One test line in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSummary {
    pub name: String,
    pub status: TestOutcome,
    pub duration_ms: Option<i64>,
    pub attachments: usize,
}

/// Contents of `summary.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub suite_name: String,
    pub generated_at: DateTime<Utc>,
    pub include_history: bool,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub tests: Vec<TestSummary>,
}

impl ReportSummary {
    pub fn from_records(
        suite_name: &str,
        include_history: bool,
        generated_at: DateTime<Utc>,
        records: &[TestRecord],
    ) -> Self {
        let count = |status: TestOutcome| records.iter().filter(|r| r.status == status).count();
        Self {
            suite_name: suite_name.to_string(),
            generated_at,
            include_history,
            total: records.len(),
            passed: count(TestOutcome::Passed),
            failed: count(TestOutcome::Failed),
            skipped: count(TestOutcome::Skipped),
            tests: records
                .iter()
                .map(|r| TestSummary {
                    name: r.name.clone(),
                    status: r.status,
                    duration_ms: r.duration_ms(),
                    attachments: r.attachments.len(),
                })
                .collect(),
        }
    }

    pub fn history_record(&self) -> HistoryRecord {
        HistoryRecord {
            generated_at: self.generated_at,
            suite_name: self.suite_name.clone(),
            total: self.total,
            passed: self.passed,
            failed: self.failed,
            skipped: self.skipped,
        }
    }
}

/// A generated report directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportArtifact {
    pub dir: PathBuf,
    pub include_history: bool,
    pub summary: ReportSummary,
    /// Newest first; empty for the history-excluded variant.
    pub history: Vec<HistoryRecord>,
}

/// Report-generation backend driven at run finish.
#[async_trait]
pub trait ReportPublisher: Send + Sync {
    /// Carry the previous published report's history into the results
    /// directory. Returns the number of records carried; absent history is 0.
    async fn copy_history(&self, config: &RunConfig) -> Result<usize, ReportPublishError>;

    /// Generate one report variant from the current result records.
    async fn generate(
        &self,
        config: &RunConfig,
        include_history: bool,
    ) -> Result<ReportArtifact, ReportPublishError>;

    /// Replace `report_dir/latest` with `artifact`. Returns the new location.
    async fn rename_latest(
        &self,
        config: &RunConfig,
        artifact: &ReportArtifact,
    ) -> Result<PathBuf, ReportPublishError>;

    /// Expose the published report for inspection.
    async fn open(&self, config: &RunConfig, published: &Path) -> Result<(), ReportPublishError>;
}

/// [`ReportPublisher`] writing JSON and markdown reports to the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsReportPublisher;

impl FsReportPublisher {
    fn carried_history_path(config: &RunConfig) -> PathBuf {
        config.results_dir.join(HISTORY_DIR).join(HISTORY_FILE)
    }

    fn variant_dir(config: &RunConfig, include_history: bool) -> PathBuf {
        let variant = if include_history { FULL_DIR } else { SINGLE_DIR };
        config.report_dir.join(variant)
    }

    fn published_history_path(config: &RunConfig) -> PathBuf {
        config
            .report_dir
            .join(LATEST_DIR)
            .join(HISTORY_DIR)
            .join(HISTORY_FILE)
    }
}

#[async_trait]
impl ReportPublisher for FsReportPublisher {
    async fn copy_history(&self, config: &RunConfig) -> Result<usize, ReportPublishError> {
        let source = Self::published_history_path(config);
        let history = match read_history(&source).await? {
            Some(history) => history,
            None => {
                debug!(path = %source.display(), "no previous report history");
                return Ok(0);
            }
        };
        let target = Self::carried_history_path(config);
        write_json(&target, &history).await?;
        Ok(history.len())
    }

    async fn generate(
        &self,
        config: &RunConfig,
        include_history: bool,
    ) -> Result<ReportArtifact, ReportPublishError> {
        let records = read_records(&config.results_dir).await?;
        let generated_at = Utc::now();
        let summary =
            ReportSummary::from_records(&config.suite_name, include_history, generated_at, &records);

        let dir = Self::variant_dir(config, include_history);
        remove_dir_if_present(&dir).await?;
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ReportPublishError::io(&dir, e))?;

        let history = if include_history {
            let carried = read_history(&Self::carried_history_path(config))
                .await?
                .unwrap_or_default();
            let history = merge_history(summary.history_record(), carried, config.history_depth);
            write_json(&dir.join(HISTORY_DIR).join(HISTORY_FILE), &history).await?;
            history
        } else {
            Vec::new()
        };

        write_json(&dir.join(SUMMARY_FILE), &summary).await?;
        let index = dir.join(INDEX_FILE);
        tokio::fs::write(&index, render_report_md(&summary, &history))
            .await
            .map_err(|e| ReportPublishError::io(&index, e))?;

        Ok(ReportArtifact {
            dir,
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
        let latest = config.report_dir.join(LATEST_DIR);
        remove_dir_if_present(&latest).await?;
        tokio::fs::rename(&artifact.dir, &latest)
            .await
            .map_err(|e| ReportPublishError::io(&artifact.dir, e))?;
        Ok(latest)
    }

    async fn open(&self, config: &RunConfig, published: &Path) -> Result<(), ReportPublishError> {
        let index = published.join(INDEX_FILE);
        info!(event = "report.published", path = %index.display());
        if !config.open_report {
            return Ok(());
        }
        opener_command(&index)
            .spawn()
            .map(|_child| ())
            .map_err(|e| ReportPublishError::Open {
                path: index.clone(),
                reason: e.to_string(),
            })
    }
}

/// Prepend `current` to `previous` and keep at most `depth` records.
pub fn merge_history(
    current: HistoryRecord,
    previous: Vec<HistoryRecord>,
    depth: usize,
) -> Vec<HistoryRecord> {
    std::iter::once(current)
        .chain(previous)
        .take(depth)
        .collect()
}

/// Render `index.md` for a report variant.
pub fn render_report_md(summary: &ReportSummary, history: &[HistoryRecord]) -> String {
    let mut out = String::new();
    out.push_str(&format!("# {}\n\n", summary.suite_name));
    out.push_str(&format!(
        "Generated at {}\n\n",
        summary.generated_at.to_rfc3339()
    ));
    out.push_str(&format!(
        "- total: {}\n- passed: {}\n- failed: {}\n- skipped: {}\n\n",
        summary.total, summary.passed, summary.failed, summary.skipped
    ));

    if !summary.tests.is_empty() {
        out.push_str("## Tests\n\n| test | status | duration (ms) | attachments |\n|---|---|---|---|\n");
        for test in &summary.tests {
            let duration = test
                .duration_ms
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string());
            out.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                test.name, test.status, duration, test.attachments
            ));
        }
        out.push('\n');
    }

    if summary.include_history {
        out.push_str("## History\n\n| generated at | total | passed | failed | skipped |\n|---|---|---|---|---|\n");
        for h in history {
            out.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                h.generated_at.to_rfc3339(),
                h.total,
                h.passed,
                h.failed,
                h.skipped
            ));
        }
    }
    out
}

async fn remove_dir_if_present(dir: &Path) -> Result<(), ReportPublishError> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ReportPublishError::io(dir, e)),
    }
}

async fn read_history(path: &Path) -> Result<Option<Vec<HistoryRecord>>, ReportPublishError> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ReportPublishError::io(path, e)),
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| ReportPublishError::CorruptRecord {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ReportPublishError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ReportPublishError::io(parent, e))?;
    }
    let content = serde_json::to_string_pretty(value)?;
    tokio::fs::write(path, content)
        .await
        .map_err(|e| ReportPublishError::io(path, e))
}

#[cfg(target_os = "windows")]
fn opener_command(target: &Path) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new("cmd");
    cmd.arg("/C").arg("start").arg("").arg(target);
    cmd
}

#[cfg(target_os = "macos")]
fn opener_command(target: &Path) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new("open");
    cmd.arg(target);
    cmd
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn opener_command(target: &Path) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new("xdg-open");
    cmd.arg(target);
    cmd
}
