//! Track identity and metadata records.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Stable identifier of a cached track (the downloader's video id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub String);

impl TrackId {
    /// Whether this id is safe to use as a file stem.
    pub fn is_valid(&self) -> bool {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        PATTERN
            .get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid track id regex"))
            .is_match(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TrackId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TrackId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One catalog entry, as written by the downloader's metadata template.
///
/// Unknown fields (`display_id` and friends) are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    /// Uploader or artist name.
    pub channel: String,
    /// `YYYYMMDD` as emitted by the downloader.
    pub upload_date: String,
    /// Human readable duration, e.g. `3:45` or `1:02:03`.
    pub duration_string: String,
}

impl Track {
    /// Parse `duration_string` into a [`Duration`].
    ///
    /// Accepts `s`, `m:ss` and `h:mm:ss`. Returns `None` for anything else
    /// (live streams report odd values here).
    pub fn duration(&self) -> Option<Duration> {
        parse_duration_string(&self.duration_string)
    }
}

pub(crate) fn parse_duration_string(text: &str) -> Option<Duration> {
    let parts: Vec<&str> = text.trim().split(':').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }

    let mut seconds: u64 = 0;
    for part in parts {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let value: u64 = part.parse().ok()?;
        seconds = seconds.checked_mul(60)?.checked_add(value)?;
    }
    Some(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(duration: &str) -> Track {
        Track {
            id: TrackId::from("abc123"),
            title: "Title".to_string(),
            channel: "Channel".to_string(),
            upload_date: "20240101".to_string(),
            duration_string: duration.to_string(),
        }
    }

    mod track_id {
        use super::*;

        #[test]
        fn accepts_downloader_ids() {
            assert!(TrackId::from("dQw4w9WgXcQ").is_valid());
            assert!(TrackId::from("a-b_c").is_valid());
        }

        #[test]
        fn rejects_path_like_ids() {
            assert!(!TrackId::from("../etc/passwd").is_valid());
            assert!(!TrackId::from("a b").is_valid());
            assert!(!TrackId::from("").is_valid());
        }

        #[test]
        fn serializes_as_plain_string() {
            let json = serde_json::to_string(&TrackId::from("abc")).unwrap();
            assert_eq!(json, "\"abc\"");
        }
    }

    mod parsing {
        use super::*;

        #[test]
        fn metadata_record_ignores_extra_fields() {
            let json = r#"{
                "id": "abc123",
                "display_id": "abc123",
                "title": "Some Song",
                "channel": "Some Artist",
                "upload_date": "20230115",
                "duration_string": "3:45"
            }"#;
            let track: Track = serde_json::from_str(json).unwrap();
            assert_eq!(track.id, TrackId::from("abc123"));
            assert_eq!(track.channel, "Some Artist");
        }

        #[test]
        fn metadata_record_requires_all_fields() {
            let json = r#"{"id": "abc123", "title": "No channel"}"#;
            assert!(serde_json::from_str::<Track>(json).is_err());
        }
    }

    mod duration {
        use super::*;

        #[test]
        fn seconds_only() {
            assert_eq!(track("45").duration(), Some(Duration::from_secs(45)));
        }

        #[test]
        fn minutes_and_seconds() {
            assert_eq!(track("3:45").duration(), Some(Duration::from_secs(225)));
        }

        #[test]
        fn hours_minutes_seconds() {
            assert_eq!(
                track("1:02:03").duration(),
                Some(Duration::from_secs(3723))
            );
        }

        #[test]
        fn garbage_is_none() {
            assert_eq!(track("").duration(), None);
            assert_eq!(track("live").duration(), None);
            assert_eq!(track("1:2:3:4").duration(), None);
            assert_eq!(track("3:").duration(), None);
        }
    }
}
