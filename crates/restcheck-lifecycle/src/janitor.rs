//! Output hygiene at run start.
//!
//! Cleanup tolerates missing targets: an absent directory or file is the
//! normal state on a first run. Anything that cannot be removed becomes a
//! [`CleanupWarning`], never an error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A cleanup target that could not be removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("could not clean {}: {reason}", .target.display())]
pub struct CleanupWarning {
    pub target: PathBuf,
    pub reason: String,
}

impl CleanupWarning {
    fn new(target: &Path, reason: impl std::fmt::Display) -> Self {
        Self {
            target: target.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

/// Filesystem cleanup operations used at run start.
#[async_trait]
pub trait OutputJanitor: Send + Sync {
    /// Remove everything inside `dir`, keeping the directory itself.
    async fn clean_directory(&self, dir: &Path) -> Vec<CleanupWarning>;

    /// Remove a single file.
    async fn force_delete(&self, file: &Path) -> Option<CleanupWarning>;
}

/// [`OutputJanitor`] over the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsJanitor;

#[async_trait]
impl OutputJanitor for FsJanitor {
    async fn clean_directory(&self, dir: &Path) -> Vec<CleanupWarning> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(dir = %dir.display(), "cleanup target absent");
                return Vec::new();
            }
            Err(e) => return vec![CleanupWarning::new(dir, e)],
        };

        let mut warnings = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warnings.push(CleanupWarning::new(dir, e));
                    break;
                }
            };
            let path = entry.path();
            let removed = match entry.file_type().await {
                Ok(ft) if ft.is_dir() => tokio::fs::remove_dir_all(&path).await,
                Ok(_) => tokio::fs::remove_file(&path).await,
                Err(e) => Err(e),
            };
            match removed {
                Ok(()) => {}
                // Raced with another cleaner.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warnings.push(CleanupWarning::new(&path, e)),
            }
        }
        warnings
    }

    async fn force_delete(&self, file: &Path) -> Option<CleanupWarning> {
        match tokio::fs::remove_file(file).await {
            Ok(()) => None,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(file = %file.display(), "cleanup target absent");
                None
            }
            Err(e) => Some(CleanupWarning::new(file, e)),
        }
    }
}
