//! Text helpers for presenting the catalog in chat.

use chrono::NaiveDate;

use super::track::Track;

const ELLIPSIS: char = '…';
const TITLE_WIDTH: usize = 40;
const CHANNEL_WIDTH: usize = 24;

/// Shorten `text` to at most `width` characters.
///
/// Text that already fits is returned unchanged; otherwise the first
/// `width - 1` characters are kept and an ellipsis is appended. Widths are
/// counted in `char`s, not bytes.
pub fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut out: String = text.chars().take(width.saturating_sub(1)).collect();
    out.push(ELLIPSIS);
    out
}

/// `20230115` -> `2023-01-15`. Anything unparseable is passed through.
pub fn format_upload_date(raw: &str) -> String {
    NaiveDate::parse_from_str(raw, "%Y%m%d")
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

/// Render the library as numbered rows, one per track.
pub fn format_listing(tracks: &[Track]) -> String {
    if tracks.is_empty() {
        return "The library is empty.".to_string();
    }

    let mut lines = Vec::with_capacity(tracks.len());
    for (n, track) in tracks.iter().enumerate() {
        lines.push(format!(
            "{:>3}. `{}` {:<title_w$} | {:<channel_w$} | {} | {}",
            n + 1,
            track.id,
            truncate(&track.title, TITLE_WIDTH),
            truncate(&track.channel, CHANNEL_WIDTH),
            format_upload_date(&track.upload_date),
            track.duration_string,
            title_w = TITLE_WIDTH,
            channel_w = CHANNEL_WIDTH,
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::TrackId;

    mod truncate {
        use super::*;

        #[test]
        fn short_text_unchanged() {
            assert_eq!(truncate("hello", 10), "hello");
        }

        #[test]
        fn exact_width_unchanged() {
            assert_eq!(truncate("hello", 5), "hello");
        }

        #[test]
        fn long_text_gets_ellipsis() {
            let out = truncate("hello world", 6);
            assert_eq!(out, "hello…");
            assert_eq!(out.chars().count(), 6);
        }

        #[test]
        fn counts_characters_not_bytes() {
            assert_eq!(truncate("héllo", 5), "héllo");
            assert_eq!(truncate("日本語のタイトル", 4), "日本語…");
        }

        #[test]
        fn zero_width_is_just_the_marker() {
            assert_eq!(truncate("abc", 0), "…");
        }
    }

    mod upload_date {
        use super::*;

        #[test]
        fn reformats_compact_dates() {
            assert_eq!(format_upload_date("20230115"), "2023-01-15");
        }

        #[test]
        fn passes_through_garbage() {
            assert_eq!(format_upload_date("NA"), "NA");
        }
    }

    mod listing {
        use super::*;

        #[test]
        fn empty_library_message() {
            assert_eq!(format_listing(&[]), "The library is empty.");
        }

        #[test]
        fn one_row_per_track() {
            let tracks = vec![
                Track {
                    id: TrackId::from("aaa"),
                    title: "A".repeat(60),
                    channel: "Uploader".to_string(),
                    upload_date: "20240102".to_string(),
                    duration_string: "2:30".to_string(),
                },
                Track {
                    id: TrackId::from("bbb"),
                    title: "Short".to_string(),
                    channel: "Other".to_string(),
                    upload_date: "20240103".to_string(),
                    duration_string: "4:00".to_string(),
                },
            ];

            let listing = format_listing(&tracks);
            let rows: Vec<&str> = listing.lines().collect();
            assert_eq!(rows.len(), 2);
            assert!(rows[0].starts_with("  1. `aaa`"));
            assert!(rows[0].contains('…'));
            assert!(rows[0].contains("2024-01-02"));
            assert!(rows[1].contains("Short"));
            assert!(rows[1].ends_with("4:00"));
        }
    }
}
