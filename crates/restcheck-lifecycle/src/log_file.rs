//! Run log file.

use restcheck_core::sink::LogSink;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::warn;

#[derive(Debug)]
struct LogTarget {
    path: PathBuf,
    /// Opened on the first line after construction or a retarget.
    file: Option<File>,
}

impl LogTarget {
    fn handle(&mut self) -> std::io::Result<&mut File> {
        if self.file.is_none() {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            self.file = Some(file);
        }
        self.file
            .as_mut()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "log file not open"))
    }

    fn append(&mut self, line: &str) -> std::io::Result<()> {
        let entry = format!(
            "{} INFO {}\n",
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            line
        );
        self.handle()?.write_all(entry.as_bytes())
    }
}

/// Appends every line to the run log file and forwards it to `tracing`.
///
/// One append handle is kept open between lines. Write failures are reported
/// through `tracing` and otherwise ignored; a broken log file never fails a
/// lifecycle hook.
#[derive(Debug)]
pub struct FileLogSink {
    target: Mutex<LogTarget>,
}

impl FileLogSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            target: Mutex::new(LogTarget {
                path: path.into(),
                file: None,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LogTarget> {
        self.target
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn path(&self) -> PathBuf {
        self.lock().path.clone()
    }

    /// Close the current handle and point subsequent writes at `path`.
    ///
    /// Call before the log file is deleted, or later lines go to the unlinked
    /// file.
    pub fn retarget(&self, path: impl Into<PathBuf>) {
        let mut target = self.lock();
        target.path = path.into();
        target.file = None;
    }
}

impl LogSink for FileLogSink {
    fn info(&self, message: &str) {
        tracing::info!(target: "restcheck", "{}", message);
        // Held across the write so lines from parallel hooks never interleave.
        let mut target = self.lock();
        if let Err(e) = target.append(message) {
            target.file = None;
            warn!(event = "log_file.write_error", path = %target.path.display(), error = %e);
        }
    }
}
