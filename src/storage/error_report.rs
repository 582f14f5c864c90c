use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use chrono::Utc;
use parking_lot::Mutex;
use tracing::warn;
use crate::core::error::Result;

/// Append-only sink for non-fatal problems (bad lines, bad ISBNs, cycles).
///
/// Each handle owns its file descriptor; ingestion workers open their own
/// instead of sharing one. Lines are written whole with `O_APPEND`.
pub struct ErrorReport {
    pub path: PathBuf,
    file: Mutex<File>,
    recorded: AtomicUsize,
}

impl ErrorReport {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(ErrorReport {
            path,
            file: Mutex::new(file),
            recorded: AtomicUsize::new(0),
        })
    }

    /// Record one problem. Failing to write the report is logged, never raised.
    pub fn record(&self, message: &str) {
        let line = format!("{}\t{}\n", Utc::now().to_rfc3339(), message.replace('\n', "\\n"));
        if let Err(e) = self.file.lock().write_all(line.as_bytes()) {
            warn!("Could not write to {}: {}", self.path.display(), e);
            return;
        }
        self.recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn recorded(&self) -> usize {
        self.recorded.load(Ordering::Relaxed)
    }
}
