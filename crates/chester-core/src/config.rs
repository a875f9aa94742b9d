//! Runtime configuration.
//!
//! # File Format
//!
//! Optional JSON file; every field has a default, so `{}` is valid:
//!
//! ```json
//! {
//!   "libraryDir": "library",
//!   "metadataDir": "metadata",
//!   "audioExtension": "m4a",
//!   "breakRegistryPath": "breaks.json",
//!   "logDir": "logs",
//!   "commandPrefix": "!",
//!   "downloader": { "binary": "yt-dlp", "shellPrefix": null }
//! }
//! ```
//!
//! Relative paths are resolved against the working directory; a leading `~`
//! is expanded against the home directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::paths::expand_home;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// How track downloads are run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DownloaderConfig {
    /// Downloader executable (name on PATH or full path).
    pub binary: String,

    /// Shell used to launch the downloader, e.g. `/bin/bash -l -c`.
    /// Defaults to the user's login shell.
    pub shell_prefix: Option<String>,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
            shell_prefix: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChesterConfig {
    pub library_dir: PathBuf,
    pub metadata_dir: PathBuf,
    pub audio_extension: String,
    pub break_registry_path: PathBuf,
    /// Where the command transcript goes; `None` disables it.
    pub log_dir: Option<PathBuf>,
    pub command_prefix: String,
    pub downloader: DownloaderConfig,
}

impl Default for ChesterConfig {
    fn default() -> Self {
        Self {
            library_dir: PathBuf::from("library"),
            metadata_dir: PathBuf::from("metadata"),
            audio_extension: "m4a".to_string(),
            break_registry_path: PathBuf::from("breaks.json"),
            log_dir: Some(PathBuf::from("logs")),
            command_prefix: "!".to_string(),
            downloader: DownloaderConfig::default(),
        }
    }
}

impl ChesterConfig {
    /// Load configuration from `path`.
    ///
    /// A missing file yields the defaults; a file that exists but cannot be
    /// read or parsed is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default().resolved());
        }

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(config.resolved())
    }

    /// Expand `~` in every configured path.
    pub fn resolved(mut self) -> Self {
        self.library_dir = expand_home(&self.library_dir);
        self.metadata_dir = expand_home(&self.metadata_dir);
        self.break_registry_path = expand_home(&self.break_registry_path);
        self.log_dir = self.log_dir.as_deref().map(expand_home);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_library_layout() {
        let config = ChesterConfig::default();
        assert_eq!(config.library_dir, PathBuf::from("library"));
        assert_eq!(config.metadata_dir, PathBuf::from("metadata"));
        assert_eq!(config.audio_extension, "m4a");
        assert_eq!(config.command_prefix, "!");
        assert_eq!(config.downloader.binary, "yt-dlp");
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = ChesterConfig::load(&dir.path().join("chester.json")).unwrap();
        assert_eq!(config, ChesterConfig::default().resolved());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chester.json");
        fs::write(
            &path,
            r#"{"libraryDir": "/srv/audio", "downloader": {"shellPrefix": "/bin/sh -c"}}"#,
        )
        .unwrap();

        let config = ChesterConfig::load(&path).unwrap();
        assert_eq!(config.library_dir, PathBuf::from("/srv/audio"));
        assert_eq!(config.metadata_dir, PathBuf::from("metadata"));
        assert_eq!(config.downloader.binary, "yt-dlp");
        assert_eq!(config.downloader.shell_prefix.as_deref(), Some("/bin/sh -c"));
    }

    #[test]
    fn null_log_dir_disables_transcript() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chester.json");
        fs::write(&path, r#"{"logDir": null}"#).unwrap();

        assert_eq!(ChesterConfig::load(&path).unwrap().log_dir, None);
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chester.json");
        fs::write(&path, "{ nope").unwrap();

        let err = ChesterConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("chester.json"));
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(ChesterConfig::default()).unwrap();
        assert_eq!(json["commandPrefix"], "!");
        assert_eq!(json["breakRegistryPath"], "breaks.json");
    }
}
