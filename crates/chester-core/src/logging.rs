//! Command transcript.
//!
//! Diagnostics go through the `log` facade; the transcript is a separate,
//! plain-text record of every command received and reply sent, one
//! timestamped line each. It is truncated when opened so each run starts
//! clean.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};

/// Shared handle to the transcript file. Cloning shares the file.
#[derive(Clone, Default)]
pub struct Transcript {
    file: Arc<Mutex<Option<File>>>,
}

impl Transcript {
    /// Open (truncating) `{log_dir}/{name}.log`.
    ///
    /// With no directory, or if the file cannot be opened, the transcript is
    /// disabled and `record` becomes a no-op.
    pub fn open(log_dir: Option<&Path>, name: &str) -> Self {
        let file = log_dir.and_then(|dir| {
            if let Err(e) = fs::create_dir_all(dir) {
                log::warn!("Cannot create log directory {}: {}", dir.display(), e);
                return None;
            }
            let path = dir.join(format!("{name}.log"));
            OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&path)
                .map_err(|e| log::warn!("Cannot open transcript {}: {}", path.display(), e))
                .ok()
        });
        Self {
            file: Arc::new(Mutex::new(file)),
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.file.lock().map(|f| f.is_some()).unwrap_or(false)
    }

    /// Append `[timestamp] direction: text`. Multi-line text is indented so
    /// each record stays attributable.
    pub fn record(&self, direction: &str, text: &str) {
        let Ok(mut guard) = self.file.lock() else {
            return;
        };
        if let Some(file) = guard.as_mut() {
            let ts = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
            let text = text.replace('\n', "\n    ");
            let _ = writeln!(file, "[{ts}] {direction}: {text}");
            let _ = file.flush();
        }
    }
}
