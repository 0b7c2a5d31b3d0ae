//! Per-test result records on disk.
//!
//! Layout: `<results_dir>/<uuid>-result.json`, one file per completed test.
//! The report publisher reads them back at run finish.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::attachments::DiagnosticArtifact;
use crate::error::{LifecycleError, ReportPublishError};
use crate::events::{TestId, TestOutcome};

const RESULT_SUFFIX: &str = "-result.json";

/// One completed test as the report sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRecord {
    pub uuid: Uuid,
    pub test_id: TestId,
    pub name: String,
    pub status: TestOutcome,
    /// Absent for tests skipped before invocation.
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: DateTime<Utc>,
    pub attachments: Vec<DiagnosticArtifact>,
}

impl TestRecord {
    pub fn duration_ms(&self) -> Option<i64> {
        self.started_at
            .map(|start| (self.finished_at - start).num_milliseconds())
    }
}

/// Write `record` to `results_dir`, creating the directory if needed.
pub async fn write_record(results_dir: &Path, record: &TestRecord) -> Result<PathBuf, LifecycleError> {
    tokio::fs::create_dir_all(results_dir)
        .await
        .map_err(|source| LifecycleError::Results {
            path: results_dir.to_path_buf(),
            source,
        })?;
    let path = results_dir.join(format!("{}{}", record.uuid, RESULT_SUFFIX));
    let content = serde_json::to_string_pretty(record)?;
    tokio::fs::write(&path, content)
        .await
        .map_err(|source| LifecycleError::Results {
            path: path.clone(),
            source,
        })?;
    Ok(path)
}

/// Read every result record in `results_dir`, ordered by finish time.
///
/// A missing directory reads as no records; other files are ignored.
pub async fn read_records(results_dir: &Path) -> Result<Vec<TestRecord>, ReportPublishError> {
    let mut entries = match tokio::fs::read_dir(results_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(ReportPublishError::io(results_dir, e)),
    };

    let mut records = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ReportPublishError::io(results_dir, e))?
    {
        let path = entry.path();
        let is_result = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(RESULT_SUFFIX));
        if !is_result {
            continue;
        }
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ReportPublishError::io(&path, e))?;
        let record: TestRecord =
            serde_json::from_str(&raw).map_err(|e| ReportPublishError::CorruptRecord {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        records.push(record);
    }
    records.sort_by(|a, b| {
        a.finished_at
            .cmp(&b.finished_at)
            .then_with(|| a.name.cmp(&b.name))
    });
    Ok(records)
}
