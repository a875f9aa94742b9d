//! Break-track registry persistence.
//!
//! # File Format
//!
//! A single JSON object mapping user id to track id:
//!
//! ```json
//! {
//!   "184405311681986560": "dQw4w9WgXcQ",
//!   "226050277734531072": "jNQXAC9IVRw"
//! }
//! ```
//!
//! # Concurrency
//!
//! Registration is read-modify-write over the whole document with no
//! merging. Two registrations racing each other both read the same
//! document, and whichever saves last wins: the other user's entry is lost.
//! Saves themselves are atomic (write to `<file>.tmp`, then rename), so the
//! file is never observed half-written.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::library::TrackId;
use crate::session::UserId;

/// Error type for registry operations.
#[derive(Debug)]
pub enum RegistryError {
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::Io(e) => write!(f, "IO error: {e}"),
            RegistryError::Json(e) => write!(f, "JSON error: {e}"),
        }
    }
}

impl std::error::Error for RegistryError {}

impl From<std::io::Error> for RegistryError {
    fn from(e: std::io::Error) -> Self {
        RegistryError::Io(e)
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(e: serde_json::Error) -> Self {
        RegistryError::Json(e)
    }
}

/// The whole registry document.
pub type BreakTracks = BTreeMap<UserId, TrackId>;

/// Load the registry document. A missing file is an empty registry.
pub fn load_break_tracks(path: &Path) -> Result<BreakTracks, RegistryError> {
    if !path.exists() {
        return Ok(BreakTracks::new());
    }
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Write the whole registry document.
pub fn save_break_tracks(path: &Path, tracks: &BreakTracks) -> Result<(), RegistryError> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }

    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);

    fs::write(&temp, serde_json::to_string_pretty(tracks)?)?;
    fs::rename(&temp, path)?;
    Ok(())
}

/// File-backed user → break track mapping.
#[derive(Debug, Clone)]
pub struct BreakRegistry {
    path: PathBuf,
}

impl BreakRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The user's registered break track, if any.
    pub fn lookup(&self, user: &UserId) -> Result<Option<TrackId>, RegistryError> {
        Ok(load_break_tracks(&self.path)?.remove(user))
    }

    /// Set the user's break track. Returns the previously registered track.
    pub fn register(
        &self,
        user: &UserId,
        track: &TrackId,
    ) -> Result<Option<TrackId>, RegistryError> {
        let mut tracks = load_break_tracks(&self.path)?;
        let previous = tracks.insert(user.clone(), track.clone());
        save_break_tracks(&self.path, &tracks)?;
        log::info!("Registered break track {} for user {}", track, user);
        Ok(previous)
    }

    pub fn all(&self) -> Result<BreakTracks, RegistryError> {
        load_break_tracks(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    mod file_operations {
        use super::*;

        #[test]
        fn load_missing_file_is_empty() {
            let dir = tempdir().unwrap();
            let tracks = load_break_tracks(&dir.path().join("breaks.json")).unwrap();
            assert!(tracks.is_empty());
        }

        #[test]
        fn save_then_load() {
            let dir = tempdir().unwrap();
            let path = dir.path().join("breaks.json");
            let mut tracks = BreakTracks::new();
            tracks.insert(UserId::from("42"), TrackId::from("t1"));

            save_break_tracks(&path, &tracks).unwrap();
            assert_eq!(load_break_tracks(&path).unwrap(), tracks);
            assert!(!dir.path().join("breaks.json.tmp").exists());
        }

        #[test]
        fn file_is_a_flat_object() {
            let dir = tempdir().unwrap();
            let path = dir.path().join("breaks.json");
            let mut tracks = BreakTracks::new();
            tracks.insert(UserId::from("42"), TrackId::from("t1"));
            save_break_tracks(&path, &tracks).unwrap();

            let raw: serde_json::Value =
                serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
            assert_eq!(raw, serde_json::json!({"42": "t1"}));
        }

        #[test]
        fn save_creates_parent_directory() {
            let dir = tempdir().unwrap();
            let path = dir.path().join("nested").join("breaks.json");
            save_break_tracks(&path, &BreakTracks::new()).unwrap();
            assert!(path.exists());
        }

        #[test]
        fn malformed_file_is_json_error() {
            let dir = tempdir().unwrap();
            let path = dir.path().join("breaks.json");
            fs::write(&path, "[1, 2").unwrap();
            assert!(matches!(
                load_break_tracks(&path),
                Err(RegistryError::Json(_))
            ));
        }
    }

    mod registry {
        use super::*;

        #[test]
        fn lookup_unregistered_is_none() {
            let dir = tempdir().unwrap();
            let registry = BreakRegistry::new(dir.path().join("breaks.json"));
            assert_eq!(registry.lookup(&UserId::from("42")).unwrap(), None);
        }

        #[test]
        fn register_then_lookup() {
            let dir = tempdir().unwrap();
            let registry = BreakRegistry::new(dir.path().join("breaks.json"));

            assert_eq!(
                registry
                    .register(&UserId::from("42"), &TrackId::from("t1"))
                    .unwrap(),
                None
            );
            assert_eq!(
                registry.lookup(&UserId::from("42")).unwrap(),
                Some(TrackId::from("t1"))
            );
        }

        #[test]
        fn register_replaces_previous_choice() {
            let dir = tempdir().unwrap();
            let registry = BreakRegistry::new(dir.path().join("breaks.json"));
            let user = UserId::from("42");

            registry.register(&user, &TrackId::from("t1")).unwrap();
            let previous = registry.register(&user, &TrackId::from("t2")).unwrap();
            assert_eq!(previous, Some(TrackId::from("t1")));
            assert_eq!(registry.lookup(&user).unwrap(), Some(TrackId::from("t2")));
        }

        #[test]
        fn register_keeps_other_users() {
            let dir = tempdir().unwrap();
            let registry = BreakRegistry::new(dir.path().join("breaks.json"));

            registry
                .register(&UserId::from("1"), &TrackId::from("a"))
                .unwrap();
            registry
                .register(&UserId::from("2"), &TrackId::from("b"))
                .unwrap();
            assert_eq!(registry.all().unwrap().len(), 2);
        }

        #[test]
        fn interleaved_registrations_are_last_writer_wins() {
            let dir = tempdir().unwrap();
            let path = dir.path().join("breaks.json");

            // Both registrations read before either writes.
            let mut first = load_break_tracks(&path).unwrap();
            let mut second = load_break_tracks(&path).unwrap();
            first.insert(UserId::from("1"), TrackId::from("a"));
            second.insert(UserId::from("2"), TrackId::from("b"));
            save_break_tracks(&path, &first).unwrap();
            save_break_tracks(&path, &second).unwrap();

            let registry = BreakRegistry::new(&path);
            assert_eq!(registry.lookup(&UserId::from("1")).unwrap(), None);
            assert_eq!(
                registry.lookup(&UserId::from("2")).unwrap(),
                Some(TrackId::from("b"))
            );
        }
    }
}
