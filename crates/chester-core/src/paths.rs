//! Home-relative path handling for configured directories.

use std::env;
use std::path::{Path, PathBuf};

/// The user's home directory: `HOME`, then `USERPROFILE`.
pub fn home_dir() -> Option<PathBuf> {
    pick_home(env::var("HOME").ok(), env::var("USERPROFILE").ok())
}

fn pick_home(home: Option<String>, user_profile: Option<String>) -> Option<PathBuf> {
    [home, user_profile]
        .into_iter()
        .flatten()
        .find(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// Expand a leading `~` against the home directory.
///
/// Paths without a leading `~` (and `~user` forms) are returned unchanged, as
/// is everything when no home directory is set.
pub fn expand_home(path: &Path) -> PathBuf {
    expand_home_in(path, home_dir().as_deref())
}

fn expand_home_in(path: &Path, home: Option<&Path>) -> PathBuf {
    match (path.strip_prefix("~"), home) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}
