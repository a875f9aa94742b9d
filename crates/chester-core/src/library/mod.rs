//! Local track library: metadata records, the catalog index, and display
//! helpers.

mod catalog;
mod format;
mod track;

pub use catalog::LibraryCatalog;
pub use format::{format_listing, format_upload_date, truncate};
pub use track::{Track, TrackId};
