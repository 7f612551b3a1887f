// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Settings and cast overrides, loaded from plain `KEY=VALUE` files.
//!
//! Two optional files in the config directory drive a run:
//!
//! - `config.txt` holds the transcript settings. Keys are case-insensitive,
//!   `#` starts a comment line, unknown keys are ignored, and anything
//!   missing falls back to its default.
//! - `actors.txt` maps speaker names to player names, one `Speaker=Player`
//!   per line, and doubles as the explicit cast list: when present, the
//!   cast section shows exactly these entries in file order.
//!
//! Both loaders are immune to malformed lines; there is no way to fail a
//! run from a config file.

use std::path::{Path, PathBuf};

/// Transcript title when `config.txt` does not set one.
pub const DEFAULT_TITLE: &str = "FoundryVTT Session Transcript";

/// Speaker attributed to messages without an alias.
pub const DEFAULT_SPEAKER: &str = "Handler";

/// Settings for one conversion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Document title, also the base of the output file name.
    pub title: String,

    /// Speaker name used for messages without an alias.
    pub default_speaker: String,

    /// Whether to hand the finished transcript to the PDF converter.
    pub print_to_pdf: bool,

    /// Directory searched for cast portrait images.
    pub portraits_dir: PathBuf,

    /// Directory the transcript and omitted log are written to.
    pub output_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_owned(),
            default_speaker: DEFAULT_SPEAKER.to_owned(),
            print_to_pdf: true,
            portraits_dir: PathBuf::from("portraits"),
            output_dir: PathBuf::from("export"),
        }
    }
}

impl Settings {
    /// Reads settings from a `config.txt`. A missing or unreadable file
    /// yields the defaults.
    #[must_use]
    pub fn from_file(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .map(|content| Self::parse(&content))
            .unwrap_or_default()
    }

    /// Parses `KEY=VALUE` settings content.
    #[must_use]
    pub fn parse(content: &str) -> Self {
        let mut settings = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim();
            match key.trim().to_ascii_uppercase().as_str() {
                "TITLE" if !value.is_empty() => settings.title = value.to_owned(),
                "DEFAULT_SPEAKER" if !value.is_empty() => {
                    settings.default_speaker = value.to_owned();
                }
                // Anything that is not exactly NO means yes.
                "PRINT2PDF" => settings.print_to_pdf = !value.eq_ignore_ascii_case("no"),
                "PORTRAITS_DIR" if !value.is_empty() => {
                    settings.portraits_dir = PathBuf::from(value);
                }
                "OUTPUT_DIR" if !value.is_empty() => settings.output_dir = PathBuf::from(value),
                _ => {}
            }
        }
        settings
    }
}

/// The explicit cast list from `actors.txt`, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CastList {
    entries: Vec<(String, String)>,
}

impl CastList {
    /// Reads the cast list, or `None` when the file does not exist so the
    /// caller can fall back to deriving the cast from speakers.
    #[must_use]
    pub fn from_file(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        Some(Self::parse(&content))
    }

    /// Parses `Speaker=Player` lines. A speaker repeated later in the file
    /// updates the earlier entry in place, keeping its original position.
    #[must_use]
    pub fn parse(content: &str) -> Self {
        let mut list = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((speaker, player)) = line.split_once('=') else {
                continue;
            };
            let speaker = speaker.trim();
            if speaker.is_empty() {
                continue;
            }
            list.upsert(speaker, player.trim());
        }
        list
    }

    fn upsert(&mut self, speaker: &str, player: &str) {
        if let Some(entry) = self.entries.iter_mut().find(|(name, _)| name == speaker) {
            entry.1 = player.to_owned();
        } else {
            self.entries.push((speaker.to_owned(), player.to_owned()));
        }
    }

    /// Returns `true` when no entries were parsed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of cast entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterates `(speaker, player)` pairs in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(speaker, player)| (speaker.as_str(), player.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.title, "FoundryVTT Session Transcript");
        assert_eq!(settings.default_speaker, "Handler");
        assert!(settings.print_to_pdf);
        assert_eq!(settings.portraits_dir, PathBuf::from("portraits"));
        assert_eq!(settings.output_dir, PathBuf::from("export"));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::from_file(&dir.path().join("config.txt"));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn parses_settings_file() {
        let settings = Settings::parse(
            "# transcript settings\n\
             TITLE=Shadows Over Innsmouth\n\
             DEFAULT_SPEAKER=Keeper\n\
             PRINT2PDF=NO\n\
             OUTPUT_DIR=out\n",
        );
        assert_eq!(settings.title, "Shadows Over Innsmouth");
        assert_eq!(settings.default_speaker, "Keeper");
        assert!(!settings.print_to_pdf);
        assert_eq!(settings.output_dir, PathBuf::from("out"));
    }

    #[test]
    fn keys_are_case_insensitive_and_values_trimmed() {
        let settings = Settings::parse("title =  Night Shift  \nprint2pdf=no\n");
        assert_eq!(settings.title, "Night Shift");
        assert!(!settings.print_to_pdf);
    }

    #[test]
    fn unknown_keys_and_garbage_are_ignored() {
        let settings = Settings::parse("FONT=Comic Sans\nnot a setting\n===\n");
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn blank_values_keep_defaults() {
        let settings = Settings::parse("TITLE=\nDEFAULT_SPEAKER=   \n");
        assert_eq!(settings.title, DEFAULT_TITLE);
        assert_eq!(settings.default_speaker, DEFAULT_SPEAKER);
    }

    #[test]
    fn print2pdf_defaults_to_yes_for_odd_values() {
        assert!(Settings::parse("PRINT2PDF=YES").print_to_pdf);
        assert!(Settings::parse("PRINT2PDF=maybe").print_to_pdf);
        assert!(!Settings::parse("PRINT2PDF=no").print_to_pdf);
        assert!(!Settings::parse("PRINT2PDF=No").print_to_pdf);
    }

    #[test]
    fn cast_list_preserves_file_order() {
        let cast = CastList::parse("Mira=Alice\nTheron=Bob\nLuna=Carol\n");
        let pairs: Vec<_> = cast.iter().collect();
        assert_eq!(
            pairs,
            [("Mira", "Alice"), ("Theron", "Bob"), ("Luna", "Carol")]
        );
    }

    #[test]
    fn repeated_speaker_updates_in_place() {
        let cast = CastList::parse("Mira=Alice\nTheron=Bob\nMira=Dana\n");
        let pairs: Vec<_> = cast.iter().collect();
        assert_eq!(pairs, [("Mira", "Dana"), ("Theron", "Bob")]);
    }

    #[test]
    fn skips_malformed_cast_lines() {
        let cast = CastList::parse("# cast\njust a name\n=NoSpeaker\nMira=Alice\n\n");
        assert_eq!(cast.len(), 1);
        assert!(!cast.is_empty());
    }

    #[test]
    fn missing_cast_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CastList::from_file(&dir.path().join("actors.txt")).is_none());
    }

    #[test]
    fn reads_cast_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("actors.txt");
        std::fs::write(&path, "Mira=Alice\n").unwrap();
        let cast = CastList::from_file(&path).unwrap();
        assert_eq!(cast.len(), 1);
    }
}
