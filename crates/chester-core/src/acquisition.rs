//! Track acquisition: download + transcode into the library.
//!
//! The controller never downloads anything itself. Command handlers call a
//! [`TrackAcquirer`] and reload the catalog once it succeeds.
//!
//! [`YtDlpAcquirer`] shells out to `yt-dlp`, asking it for best-quality m4a
//! audio at `<library>/<id>.m4a` and a flat JSON metadata record at
//! `<metadata>/<id>.json`, then reports the id it printed.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use crate::config::{ChesterConfig, DownloaderConfig};
use crate::error::{ChesterError, Result};
use crate::library::TrackId;
use crate::shell::build_shell_command;

/// Fields written to each metadata record.
const METADATA_TEMPLATE: &str = "%(.{id,display_id,title,channel,upload_date,duration_string})#j";

#[async_trait]
pub trait TrackAcquirer: Send + Sync {
    /// Fetch the track at `url` into the library and return its id.
    async fn acquire(&self, url: &str) -> Result<TrackId>;
}

/// Whether `url` looks like something worth handing to the downloader.
pub fn is_acceptable_url(url: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^https?://\S+$").expect("valid url regex"))
        .is_match(url)
}

pub struct YtDlpAcquirer {
    downloader: DownloaderConfig,
    library_dir: PathBuf,
    metadata_dir: PathBuf,
    audio_extension: String,
}

impl YtDlpAcquirer {
    pub fn new(config: &ChesterConfig) -> Self {
        Self {
            downloader: config.downloader.clone(),
            library_dir: config.library_dir.clone(),
            metadata_dir: config.metadata_dir.clone(),
            audio_extension: config.audio_extension.clone(),
        }
    }

    /// Downloader arguments for `url`.
    pub fn args(&self, url: &str) -> Vec<String> {
        vec![
            "--format".to_string(),
            format!("{}/bestaudio/best", self.audio_extension),
            "--extract-audio".to_string(),
            "--audio-format".to_string(),
            self.audio_extension.clone(),
            "--no-playlist".to_string(),
            "--output".to_string(),
            template_path(&self.library_dir, "%(id)s.%(ext)s"),
            "--print-to-file".to_string(),
            METADATA_TEMPLATE.to_string(),
            template_path(&self.metadata_dir, "%(id)s.json"),
            "--no-simulate".to_string(),
            "--print".to_string(),
            "after_move:id".to_string(),
            "--".to_string(),
            url.to_string(),
        ]
    }
}

#[async_trait]
impl TrackAcquirer for YtDlpAcquirer {
    async fn acquire(&self, url: &str) -> Result<TrackId> {
        if !is_acceptable_url(url) {
            return Err(ChesterError::Acquisition(format!("not a URL: {url:?}")));
        }

        let std_cmd = build_shell_command(
            &self.downloader.binary,
            &self.args(url),
            self.downloader.shell_prefix.as_deref(),
        )
        .map_err(ChesterError::Acquisition)?;

        let mut cmd = tokio::process::Command::from(std_cmd);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        log::info!("Downloading {} with {}", url, self.downloader.binary);
        let output = cmd.output().await.map_err(|e| {
            ChesterError::Acquisition(format!("failed to start {}: {e}", self.downloader.binary))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = last_line(&stderr).unwrap_or("no error output");
            log::warn!("Download of {} failed ({}): {}", url, output.status, reason);
            return Err(ChesterError::Acquisition(format!(
                "{} exited with {}: {}",
                self.downloader.binary, output.status, reason
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let id = last_line(&stdout)
            .map(TrackId::from)
            .filter(TrackId::is_valid)
            .ok_or_else(|| {
                ChesterError::Acquisition(format!(
                    "{} did not report a track id",
                    self.downloader.binary
                ))
            })?;

        log::info!("Downloaded {} as {}", url, id);
        Ok(id)
    }
}

fn template_path(dir: &Path, file_template: &str) -> String {
    dir.join(file_template).to_string_lossy().into_owned()
}

fn last_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty()).last()
}
