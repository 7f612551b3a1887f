// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! JSON parsing for FoundryVTT chat exports.
//!
//! This module handles deserialization of chat logs exported from a
//! FoundryVTT world, either through the stock "Export Chat Log" dialog or
//! one of the session-archiving modules. The format is only loosely
//! standardized, so parsing is deliberately lenient: a message missing its
//! speaker, content, or style still parses, with the gaps represented as
//! `None` and filled in downstream.
//!
//! # Format Overview
//!
//! A session export contains:
//! - An optional session title, at the root or nested under `data`
//! - An optional export or creation date in one of several spellings
//! - A list of chat messages, each with a speaker alias, an HTML content
//!   fragment, an optional flavor line, and a numeric style code
//!
//! # Example
//!
//! ```
//! use fvtt2docx::parser::parse_session;
//!
//! let json = r#"{
//!     "title": "Session 1 - The Summons",
//!     "messages": [{
//!         "speaker": { "alias": "Mira" },
//!         "content": "<p>Hello.</p>",
//!         "style": 2,
//!         "timestamp": 1733356800000
//!     }]
//! }"#;
//!
//! let session = parse_session(json).unwrap();
//! assert_eq!(session.title.as_deref(), Some("Session 1 - The Summons"));
//! assert_eq!(session.messages.len(), 1);
//! ```

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use snafu::prelude::*;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Error type for JSON parsing failures.
#[derive(Debug, Snafu)]
pub enum ParseError {
    /// Failed to parse JSON content.
    #[snafu(display("failed to parse JSON: {source}"))]
    Json {
        /// The underlying JSON parsing error.
        source: serde_json::Error,
    },
}

/// The root structure of one exported session file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionExport {
    /// The session title, if the export carries one.
    pub title: Option<String>,

    /// When the session happened, taken from the first recognizable date
    /// field in the export.
    pub date: Option<DateTime<Utc>>,

    /// The chat messages in export order.
    pub messages: Vec<ChatMessage>,
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// The speaker alias, trimmed. `None` when the message has no alias,
    /// in which case the configured default speaker applies.
    pub speaker: Option<String>,

    /// The raw HTML content of the message.
    pub content: Option<String>,

    /// The raw flavor line shown above dice rolls, if any.
    pub flavor: Option<String>,

    /// How the message was spoken.
    pub style: MessageStyle,

    /// Unix timestamp in milliseconds when the message was sent.
    pub timestamp: Option<i64>,
}

/// The delivery style of a chat message, mapped from Foundry's numeric
/// `style` code (`type` in older exports).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStyle {
    /// Code 0 or anything unrecognized.
    Other,
    /// Code 1. Rendered as italic narration.
    Narration,
    /// Code 2. In-character dialogue.
    InCharacter,
    /// Code 3. An emote.
    Emote,
}

impl MessageStyle {
    /// Maps a numeric style code to a style.
    #[must_use]
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Narration,
            2 => Self::InCharacter,
            3 => Self::Emote,
            _ => Self::Other,
        }
    }
}

impl<'de> Deserialize<'de> for SessionExport {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;

        if !value.is_object() {
            return Err(serde::de::Error::custom(
                "chat export root must be a JSON object",
            ));
        }

        let title =
            get_string(&value, &["data", "title"]).or_else(|| get_string(&value, &["title"]));

        let date = extract_session_date(&value);

        let messages = value
            .get("messages")
            .and_then(|m| serde_json::from_value(m.clone()).ok())
            .unwrap_or_default();

        Ok(Self {
            title,
            date,
            messages,
        })
    }
}

impl<'de> Deserialize<'de> for ChatMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;

        let speaker = get_str(&value, &["speaker", "alias"])
            .map(|alias| alias.trim().to_owned())
            .filter(|alias| !alias.is_empty());

        let content = get_string(&value, &["content"]);
        let flavor = get_string(&value, &["flavor"]);

        let style_code = value
            .get("style")
            .and_then(serde_json::Value::as_i64)
            .or_else(|| value.get("type").and_then(serde_json::Value::as_i64))
            .unwrap_or(0);

        let timestamp = value.get("timestamp").and_then(serde_json::Value::as_i64);

        Ok(Self {
            speaker,
            content,
            flavor,
            style: MessageStyle::from_code(style_code),
            timestamp,
        })
    }
}

/// The `_stats` block Foundry writes on documents since v10.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StatsBlock {
    created_time: Option<i64>,
    modified_time: Option<i64>,
}

/// Field names that may carry the session date, in priority order.
const DATE_KEYS: [&str; 5] = [
    "created",
    "createdTime",
    "modified",
    "modifiedTime",
    "timestamp",
];

/// Finds the session date in an export, trying each known field name
/// under `data` and then at the root, with the `_stats` block as a last
/// resort.
fn extract_session_date(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    let data = value.get("data");

    let mut candidates: Vec<serde_json::Value> = Vec::new();
    for key in DATE_KEYS {
        if let Some(found) = data.and_then(|d| d.get(key)) {
            candidates.push(found.clone());
        }
        if let Some(found) = value.get(key) {
            candidates.push(found.clone());
        }
    }

    if let Some(stats) = data.and_then(|d| d.get("_stats"))
        && let Ok(stats) = serde_json::from_value::<StatsBlock>(stats.clone())
    {
        for ts in [stats.created_time, stats.modified_time].into_iter().flatten() {
            candidates.push(serde_json::Value::from(ts));
        }
    }

    candidates.iter().find_map(parse_timestamp_value)
}

/// Interprets one candidate date value, numeric epoch or string form.
fn parse_timestamp_value(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    match value {
        serde_json::Value::Number(_) => {
            #[allow(clippy::cast_possible_truncation)]
            let raw = value
                .as_i64()
                .or_else(|| value.as_f64().map(|f| f as i64))?;
            epoch_to_datetime(raw)
        }
        serde_json::Value::String(s) => parse_timestamp_str(s),
        _ => None,
    }
}

/// Converts an epoch value to a timestamp. Values above 10^12 are taken
/// as milliseconds, everything else as seconds.
fn epoch_to_datetime(raw: i64) -> Option<DateTime<Utc>> {
    if raw > 1_000_000_000_000 {
        DateTime::from_timestamp_millis(raw)
    } else {
        DateTime::from_timestamp(raw, 0)
    }
}

/// Parses a string date: an all-digit epoch, an RFC 3339 timestamp, or a
/// naive `YYYY-MM-DD` form with optional time.
fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
        return s.parse::<i64>().ok().and_then(epoch_to_datetime);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
    {
        return Some(dt.and_utc());
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc())
}

/// Navigates a JSON path and returns the string value at the end.
///
/// # Arguments
///
/// * `value` - The root JSON value to navigate from
/// * `path` - A sequence of keys to follow through the JSON structure
fn get_str<'a>(value: &'a serde_json::Value, path: &[&str]) -> Option<&'a str> {
    let mut current = value;
    for key in path {
        current = current.get(*key)?;
    }
    current.as_str()
}

/// Like [`get_str`] but returns an owned `String`.
fn get_string(value: &serde_json::Value, path: &[&str]) -> Option<String> {
    get_str(value, path).map(str::to_owned)
}

/// Parses a JSON string into a [`SessionExport`] structure.
///
/// # Arguments
///
/// * `json_str` - The raw JSON content of one exported session file
///
/// # Errors
///
/// Returns an error if the content is not valid JSON or its root is not
/// an object. Missing or oddly typed fields inside a valid export are not
/// errors; they parse as `None` or empty.
///
/// # Example
///
/// ```
/// use fvtt2docx::parser::parse_session;
///
/// let session = parse_session(r#"{ "messages": [] }"#).unwrap();
/// assert!(session.title.is_none());
/// assert!(session.messages.is_empty());
/// ```
pub fn parse_session(json_str: &str) -> Result<SessionExport, ParseError> {
    serde_json::from_str(json_str).context(JsonSnafu)
}

static FIRST_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

/// Lists the `.json` files directly inside `dir`, ordered by the first
/// number in each file name (files without one sort first, as zero) and
/// then by name. A missing or unreadable directory yields an empty list.
#[must_use]
pub fn collect_session_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| {
            entry
                .path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        })
        .map(|entry| entry.path().to_path_buf())
        .collect();
    files.sort_by_key(|path| session_sort_key(path));
    files
}

fn session_sort_key(path: &Path) -> (u64, String) {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let number = FIRST_NUMBER
        .find(&name)
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .unwrap_or(0);
    (number, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_json(alias: &str, content: &str) -> String {
        format!(
            r#"{{
                "speaker": {{ "alias": "{alias}" }},
                "content": "{content}",
                "style": 2,
                "timestamp": 1733356800000
            }}"#
        )
    }

    fn export_json(title: &str, messages: &str) -> String {
        format!(r#"{{ "title": "{title}", "messages": [{messages}] }}"#)
    }

    #[test]
    fn parses_minimal_export() {
        let json = export_json("Session 1", &message_json("Mira", "Hello"));
        let session = parse_session(&json).unwrap();

        assert_eq!(session.title.as_deref(), Some("Session 1"));
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].speaker.as_deref(), Some("Mira"));
        assert_eq!(session.messages[0].content.as_deref(), Some("Hello"));
        assert_eq!(session.messages[0].style, MessageStyle::InCharacter);
        assert_eq!(session.messages[0].timestamp, Some(1_733_356_800_000));
    }

    #[test]
    fn finds_title_under_data() {
        let session = parse_session(r#"{ "data": { "title": "Nested" }, "messages": [] }"#).unwrap();
        assert_eq!(session.title.as_deref(), Some("Nested"));

        let session =
            parse_session(r#"{ "title": "Outer", "data": { "title": "Nested" } }"#).unwrap();
        assert_eq!(session.title.as_deref(), Some("Nested"));
    }

    #[test]
    fn missing_title_is_none() {
        let session = parse_session(r#"{ "messages": [] }"#).unwrap();
        assert!(session.title.is_none());
    }

    #[test]
    fn missing_messages_is_empty() {
        let session = parse_session(r#"{ "title": "x" }"#).unwrap();
        assert!(session.messages.is_empty());
    }

    #[test]
    fn non_array_messages_is_empty() {
        let session = parse_session(r#"{ "messages": "oops" }"#).unwrap();
        assert!(session.messages.is_empty());
    }

    #[test]
    fn trims_speaker_alias() {
        let json = export_json("s", &message_json("  Mira  ", "x"));
        let session = parse_session(&json).unwrap();
        assert_eq!(session.messages[0].speaker.as_deref(), Some("Mira"));
    }

    #[test]
    fn empty_alias_is_no_speaker() {
        let json = export_json("s", &message_json("   ", "x"));
        let session = parse_session(&json).unwrap();
        assert!(session.messages[0].speaker.is_none());
    }

    #[test]
    fn missing_speaker_block_is_no_speaker() {
        let session = parse_session(r#"{ "messages": [{ "content": "x" }] }"#).unwrap();
        assert!(session.messages[0].speaker.is_none());
    }

    #[test]
    fn null_content_is_none() {
        let session =
            parse_session(r#"{ "messages": [{ "speaker": { "alias": "A" }, "content": null }] }"#)
                .unwrap();
        assert!(session.messages[0].content.is_none());
    }

    #[test]
    fn captures_flavor() {
        let session =
            parse_session(r#"{ "messages": [{ "content": "x", "flavor": "Perception Check" }] }"#)
                .unwrap();
        assert_eq!(
            session.messages[0].flavor.as_deref(),
            Some("Perception Check")
        );
    }

    #[test]
    fn style_one_is_narration() {
        let session = parse_session(r#"{ "messages": [{ "style": 1 }] }"#).unwrap();
        assert_eq!(session.messages[0].style, MessageStyle::Narration);
    }

    #[test]
    fn style_falls_back_to_type() {
        let session = parse_session(r#"{ "messages": [{ "type": 1 }] }"#).unwrap();
        assert_eq!(session.messages[0].style, MessageStyle::Narration);
    }

    #[test]
    fn unknown_style_is_other() {
        let session = parse_session(r#"{ "messages": [{ "style": 99 }] }"#).unwrap();
        assert_eq!(session.messages[0].style, MessageStyle::Other);
        assert_eq!(MessageStyle::from_code(3), MessageStyle::Emote);
    }

    #[test]
    fn reads_date_from_millisecond_epoch() {
        let session = parse_session(r#"{ "created": 1733356800000, "messages": [] }"#).unwrap();
        assert_eq!(session.date, DateTime::from_timestamp(1_733_356_800, 0));
    }

    #[test]
    fn reads_date_from_second_epoch() {
        let session = parse_session(r#"{ "created": 1733356800, "messages": [] }"#).unwrap();
        assert_eq!(session.date, DateTime::from_timestamp(1_733_356_800, 0));
    }

    #[test]
    fn reads_date_from_digit_string() {
        let session = parse_session(r#"{ "modified": "1733356800000", "messages": [] }"#).unwrap();
        assert_eq!(session.date, DateTime::from_timestamp(1_733_356_800, 0));
    }

    #[test]
    fn reads_date_from_rfc3339_string() {
        let session =
            parse_session(r#"{ "created": "2025-03-02T19:00:00Z", "messages": [] }"#).unwrap();
        assert!(session.date.unwrap().to_rfc3339().starts_with("2025-03-02T19:00:00"));
    }

    #[test]
    fn reads_date_from_naive_string() {
        let session =
            parse_session(r#"{ "created": "2025-03-02 19:30:00", "messages": [] }"#).unwrap();
        assert!(session.date.is_some());

        let session = parse_session(r#"{ "created": "2025-03-02", "messages": [] }"#).unwrap();
        assert!(session.date.unwrap().to_rfc3339().starts_with("2025-03-02T00:00:00"));
    }

    #[test]
    fn reads_date_from_stats_block() {
        let session = parse_session(
            r#"{ "data": { "_stats": { "createdTime": 1733356800000 } }, "messages": [] }"#,
        )
        .unwrap();
        assert_eq!(session.date, DateTime::from_timestamp(1_733_356_800, 0));
    }

    #[test]
    fn earlier_date_key_wins() {
        let session = parse_session(
            r#"{ "modified": 1733443200, "created": 1733356800, "messages": [] }"#,
        )
        .unwrap();
        assert_eq!(session.date, DateTime::from_timestamp(1_733_356_800, 0));
    }

    #[test]
    fn data_block_wins_over_root_for_same_key() {
        let session = parse_session(
            r#"{ "created": 1733443200, "data": { "created": 1733356800 }, "messages": [] }"#,
        )
        .unwrap();
        assert_eq!(session.date, DateTime::from_timestamp(1_733_356_800, 0));
    }

    #[test]
    fn unparseable_date_is_none() {
        let session = parse_session(r#"{ "created": "next Tuesday", "messages": [] }"#).unwrap();
        assert!(session.date.is_none());

        let session = parse_session(r#"{ "created": true, "messages": [] }"#).unwrap();
        assert!(session.date.is_none());
    }

    #[test]
    fn returns_error_for_invalid_json() {
        assert!(parse_session("not valid json").is_err());
    }

    #[test]
    fn returns_error_for_non_object_root() {
        let result = parse_session(r#"[{ "messages": [] }]"#);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("JSON object"));
    }

    #[test]
    fn collects_and_orders_session_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["session_10.json", "session_2.json", "notes.txt", "intro.json"] {
            std::fs::write(dir.path().join(name), "{}").unwrap();
        }

        let files = collect_session_files(dir.path());
        let names: Vec<_> = files
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .collect();
        assert_eq!(names, ["intro.json", "session_2.json", "session_10.json"]);
    }

    #[test]
    fn orders_by_first_number_even_with_padding() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["Session 03 - Heist.json", "Session 1 - Intro.json"] {
            std::fs::write(dir.path().join(name), "{}").unwrap();
        }

        let files = collect_session_files(dir.path());
        let names: Vec<_> = files
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .collect();
        assert_eq!(names, ["Session 1 - Intro.json", "Session 03 - Heist.json"]);
    }

    #[test]
    fn missing_directory_collects_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let files = collect_session_files(&dir.path().join("nope"));
        assert!(files.is_empty());
    }
}
