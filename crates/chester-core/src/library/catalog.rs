//! In-memory index of every locally cached track.
//!
//! # Layout on disk
//!
//! ```text
//! metadata/
//! ├── <id>.json    # one flat record per track (see `Track`)
//! └── ...
//! library/
//! ├── <id>.m4a     # audio asset addressed by the same id
//! └── ...
//! ```
//!
//! # All-or-nothing loads
//!
//! `load()` builds a complete replacement catalog off to the side and only
//! swaps it in once every record has been validated. Readers either see the
//! previous catalog or the new one, never a partial build. Loads themselves
//! are serialized, so a scan that started later is never overwritten by one
//! that started earlier.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use crate::error::{ChesterError, Result};

use super::track::{Track, TrackId};

#[derive(Debug, Default)]
struct CatalogSnapshot {
    /// Tracks in load order (metadata file name order).
    tracks: Vec<Track>,
    index: HashMap<TrackId, usize>,
}

impl CatalogSnapshot {
    fn get(&self, id: &TrackId) -> Option<&Track> {
        self.index.get(id).map(|&i| &self.tracks[i])
    }
}

/// Loads and indexes track metadata.
#[derive(Debug)]
pub struct LibraryCatalog {
    library_dir: PathBuf,
    metadata_dir: PathBuf,
    audio_extension: String,
    current: RwLock<Arc<CatalogSnapshot>>,
    loading: Mutex<()>,
}

impl LibraryCatalog {
    /// Create an empty catalog over the given directories. Nothing is read
    /// until [`load`](Self::load) is called.
    pub fn new(
        library_dir: impl Into<PathBuf>,
        metadata_dir: impl Into<PathBuf>,
        audio_extension: impl Into<String>,
    ) -> Self {
        Self {
            library_dir: library_dir.into(),
            metadata_dir: metadata_dir.into(),
            audio_extension: audio_extension.into(),
            current: RwLock::new(Arc::new(CatalogSnapshot::default())),
            loading: Mutex::new(()),
        }
    }

    pub fn library_dir(&self) -> &Path {
        &self.library_dir
    }

    pub fn metadata_dir(&self) -> &Path {
        &self.metadata_dir
    }

    /// Path of the audio asset for `id`.
    pub fn audio_path(&self, id: &TrackId) -> PathBuf {
        self.library_dir
            .join(format!("{}.{}", id.as_str(), self.audio_extension))
    }

    /// Rescan the metadata directory and replace the catalog.
    ///
    /// Returns the number of tracks in the new catalog. On any failure the
    /// previously loaded catalog stays in place.
    pub fn load(&self) -> Result<usize> {
        let _loading = self.loading.lock().unwrap();
        let snapshot = self.build_snapshot()?;
        let count = snapshot.tracks.len();
        *self.current.write().unwrap() = Arc::new(snapshot);
        log::info!("Library catalog loaded with {} track(s)", count);
        Ok(count)
    }

    /// Look up a track by id.
    pub fn get(&self, id: &TrackId) -> Result<Track> {
        self.snapshot()
            .get(id)
            .cloned()
            .ok_or_else(|| ChesterError::TrackNotFound(id.clone()))
    }

    pub fn contains(&self, id: &TrackId) -> bool {
        self.snapshot().get(id).is_some()
    }

    /// All tracks, in load order.
    pub fn list(&self) -> Vec<Track> {
        self.snapshot().tracks.clone()
    }

    pub fn len(&self) -> usize {
        self.snapshot().tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.current.read().unwrap().clone()
    }

    fn build_snapshot(&self) -> Result<CatalogSnapshot> {
        let mut snapshot = CatalogSnapshot::default();

        for path in self.metadata_files()? {
            let track = read_metadata_record(&path)?;

            let audio = self.audio_path(&track.id);
            if !audio.is_file() {
                return Err(ChesterError::MissingAudioAsset {
                    id: track.id,
                    path: audio,
                });
            }

            if snapshot.index.contains_key(&track.id) {
                log::warn!(
                    "Duplicate metadata for track {} in {}, keeping the first record",
                    track.id,
                    path.display()
                );
                continue;
            }

            snapshot.index.insert(track.id.clone(), snapshot.tracks.len());
            snapshot.tracks.push(track);
        }

        Ok(snapshot)
    }

    /// Metadata record paths, sorted by file name. A missing directory is an
    /// empty library.
    fn metadata_files(&self) -> Result<Vec<PathBuf>> {
        if !self.metadata_dir.exists() {
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.metadata_dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

fn read_metadata_record(path: &Path) -> Result<Track> {
    let contents = fs::read_to_string(path)?;
    let track: Track =
        serde_json::from_str(&contents).map_err(|e| ChesterError::InvalidMetadata {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    if !track.id.is_valid() {
        return Err(ChesterError::InvalidMetadata {
            path: path.to_path_buf(),
            reason: format!("invalid track id {:?}", track.id.as_str()),
        });
    }

    Ok(track)
}
