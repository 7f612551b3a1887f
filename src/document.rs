// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Assembly of normalized sessions into a structured document.
//!
//! This module decides what the transcript contains and in what order;
//! how it is serialized is the renderer's business. The shape produced
//! here:
//!
//! - A front matter section with the document title, a session count
//!   line, the first-to-last session date range, and the cast list with
//!   portraits. This section shows no page number.
//! - One section per session, holding the session heading (the only
//!   heading level in the document, so PDF bookmarks map one-to-one to
//!   sessions), the session date, and the deduplicated utterances. Page
//!   numbering starts at 1 on the first session section and runs on from
//!   there.
//!
//! Duplicates removed along the way are collected into an [`OmittedLog`],
//! rendered as a separate document when non-empty.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::{CastList, Settings};
use crate::dedup;
use crate::parser::SessionExport;
use crate::transcript::{self, Utterance};

/// One successfully loaded session file, in processing order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedSession {
    /// The file name the session was loaded from, extension included.
    pub file_name: String,
    /// The parsed export.
    pub export: SessionExport,
}

/// One styled fragment of a rendered paragraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    /// The text content.
    pub text: String,
    /// Bold weight.
    pub bold: bool,
    /// Italic slant.
    pub italic: bool,
}

/// One cast list entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastEntry {
    /// The in-game speaker name.
    pub name: String,
    /// The player behind the speaker, when known.
    pub player: Option<String>,
    /// Path to the portrait image, when one was found.
    pub portrait: Option<PathBuf>,
}

/// One block of document content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// The document title on the front page.
    DocumentTitle(String),
    /// A centered front matter line below the title.
    Subtitle(String),
    /// The "Cast:" lead-in line.
    CastHeading,
    /// One cast entry, rendered as a portrait-and-name table.
    CastMember(CastEntry),
    /// A session heading. Carries the document's only outline level.
    SessionHeading(String),
    /// The session date line under a heading.
    SessionDate(String),
    /// One spoken paragraph.
    Utterance(Vec<TextRun>),
    /// An empty spacing paragraph.
    Spacer,
}

/// Page numbering behavior of a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageNumbers {
    /// No page number is shown.
    Hidden,
    /// Numbering restarts at 1 and a page number footer appears.
    RestartAtOne,
    /// Numbering and footer continue from the previous section.
    Continued,
}

/// A run of blocks sharing page setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocSection {
    /// How this section is numbered.
    pub numbering: PageNumbers,
    /// The content blocks in order.
    pub blocks: Vec<Block>,
}

/// The structured transcript document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDocument {
    /// Front matter first, then one section per session.
    pub sections: Vec<DocSection>,
}

/// The removed duplicates of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OmittedGroup {
    /// One-based session number.
    pub index: usize,
    /// The session title.
    pub title: String,
    /// The session date line.
    pub date_label: String,
    /// The removed `(speaker, text)` pairs in original order.
    pub entries: Vec<(String, String)>,
}

/// Every duplicate removed across the run, grouped by session. Sessions
/// without removals do not appear.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OmittedLog {
    /// The display title of the omitted-duplicates document.
    pub title: String,
    /// Non-empty per-session groups, in session order.
    pub groups: Vec<OmittedGroup>,
}

impl OmittedLog {
    /// Returns `true` when no duplicates were removed anywhere.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// The full result of structuring a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    /// The main transcript document.
    pub document: OutputDocument,
    /// The removed duplicates, possibly empty.
    pub omitted: OmittedLog,
}

/// Date line shown when a session carries no recognizable date.
const UNKNOWN_DATE: &str = "Date unknown";

/// Builds the structured transcript from loaded sessions.
///
/// Messages are normalized against the default speaker, deduplicated per
/// session, and laid out as described in the module docs. When
/// `cast_overrides` is present it defines the cast outright; otherwise
/// the cast is derived from speakers in order of first appearance.
#[must_use]
pub fn assemble(
    settings: &Settings,
    cast_overrides: Option<&CastList>,
    sessions: &[LoadedSession],
) -> Transcript {
    let normalized: Vec<Vec<Utterance>> = sessions
        .iter()
        .map(|session| {
            session
                .export
                .messages
                .iter()
                .map(|message| transcript::normalize_message(message, &settings.default_speaker))
                .collect()
        })
        .collect();

    let cast = build_cast(cast_overrides, &normalized, &settings.portraits_dir);

    let mut doc_sections = Vec::with_capacity(sessions.len() + 1);
    doc_sections.push(front_matter(settings, &cast, sessions));

    let mut groups = Vec::new();
    for (index, (session, utterances)) in sessions.iter().zip(normalized).enumerate() {
        let title = session_title(session);
        let date = date_label(session.export.date);
        let (kept, omitted) = dedup::split_consecutive_duplicates(utterances);

        let mut blocks = vec![
            Block::SessionHeading(title.clone()),
            Block::SessionDate(date.clone()),
            Block::Spacer,
        ];
        blocks.extend(
            kept.iter()
                .filter(|utterance| !utterance.is_blank())
                .map(|utterance| Block::Utterance(utterance_runs(utterance))),
        );

        doc_sections.push(DocSection {
            numbering: if index == 0 {
                PageNumbers::RestartAtOne
            } else {
                PageNumbers::Continued
            },
            blocks,
        });

        if !omitted.is_empty() {
            groups.push(OmittedGroup {
                index: index + 1,
                title,
                date_label: date,
                entries: omitted
                    .into_iter()
                    .map(|utterance| (utterance.speaker, utterance.text))
                    .collect(),
            });
        }
    }

    Transcript {
        document: OutputDocument {
            sections: doc_sections,
        },
        omitted: OmittedLog {
            title: format!(
                "Deleted Duplicate Messages — {}",
                sanitize_title(&settings.title)
            ),
            groups,
        },
    }
}

fn front_matter(settings: &Settings, cast: &[CastEntry], sessions: &[LoadedSession]) -> DocSection {
    let start = sessions.first().and_then(|session| session.export.date);
    let end = sessions.last().and_then(|session| session.export.date);

    let mut blocks = vec![
        Block::DocumentTitle(settings.title.clone()),
        Block::Subtitle(format!("Sessions 1 - {}", sessions.len())),
        Block::Subtitle(format!("{} - {}", date_label(start), date_label(end))),
        Block::Spacer,
    ];
    if !cast.is_empty() {
        blocks.push(Block::CastHeading);
        blocks.extend(cast.iter().cloned().map(Block::CastMember));
        blocks.push(Block::Spacer);
    }

    DocSection {
        numbering: PageNumbers::Hidden,
        blocks,
    }
}

/// Resolves the cast: the override list verbatim when present, otherwise
/// every distinct speaker in order of first appearance.
fn build_cast(
    overrides: Option<&CastList>,
    normalized: &[Vec<Utterance>],
    portraits_dir: &Path,
) -> Vec<CastEntry> {
    if let Some(list) = overrides {
        return list
            .iter()
            .map(|(speaker, player)| {
                let lookup = if player.is_empty() { speaker } else { player };
                CastEntry {
                    name: speaker.to_owned(),
                    player: (!player.is_empty()).then(|| player.to_owned()),
                    portrait: find_portrait(portraits_dir, lookup),
                }
            })
            .collect();
    }

    let mut cast: Vec<CastEntry> = Vec::new();
    for session in normalized {
        for utterance in session {
            if utterance.is_blank() {
                continue;
            }
            if cast.iter().all(|entry| entry.name != utterance.speaker) {
                cast.push(CastEntry {
                    name: utterance.speaker.clone(),
                    player: None,
                    portrait: find_portrait(portraits_dir, &utterance.speaker),
                });
            }
        }
    }
    cast
}

/// Looks for `{name}.jpg` then `{name}.png` in the portraits directory.
fn find_portrait(dir: &Path, name: &str) -> Option<PathBuf> {
    for ext in ["jpg", "png"] {
        let path = dir.join(format!("{name}.{ext}"));
        if path.is_file() {
            return Some(path);
        }
    }
    None
}

fn session_title(session: &LoadedSession) -> String {
    session.export.title.clone().unwrap_or_else(|| {
        Path::new(&session.file_name)
            .file_stem()
            .map_or_else(|| session.file_name.clone(), |stem| {
                stem.to_string_lossy().into_owned()
            })
    })
}

fn date_label(date: Option<DateTime<Utc>>) -> String {
    date.map_or_else(
        || UNKNOWN_DATE.to_owned(),
        |date| date.format("%B %-d, %Y").to_string(),
    )
}

static OUTCOME_KEYWORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Critical Success|Critical Failure|Success|Failure").unwrap());

/// Builds the runs of one utterance paragraph: a bold `"Speaker: "`
/// prefix, then the message spans with roll outcome keywords bolded.
/// Keyword runs are upright even inside narration.
fn utterance_runs(utterance: &Utterance) -> Vec<TextRun> {
    let mut runs = vec![TextRun {
        text: format!("{}: ", utterance.speaker),
        bold: true,
        italic: false,
    }];

    for span in &utterance.spans {
        let italic = span.italic || utterance.narration;
        let mut last = 0;
        for keyword in OUTCOME_KEYWORDS.find_iter(&span.text) {
            if keyword.start() > last {
                runs.push(TextRun {
                    text: span.text[last..keyword.start()].to_owned(),
                    bold: span.bold,
                    italic,
                });
            }
            runs.push(TextRun {
                text: keyword.as_str().to_owned(),
                bold: true,
                italic: false,
            });
            last = keyword.end();
        }
        if last < span.text.len() {
            runs.push(TextRun {
                text: span.text[last..].to_owned(),
                bold: span.bold,
                italic,
            });
        }
    }

    runs
}

static TITLE_SANITIZER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").unwrap());
static FILENAME_ILLEGAL: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[<>:"/\\|?*]"#).unwrap());

/// Strips punctuation that has no place in a file name, keeping word
/// characters, whitespace, and hyphens.
fn sanitize_title(title: &str) -> String {
    TITLE_SANITIZER.replace_all(title, "").trim().to_owned()
}

/// File name of the main transcript: the sanitized title, spaces as
/// underscores, followed by the run timestamp.
#[must_use]
pub fn transcript_file_name(title: &str, timestamp: &str) -> String {
    let base = sanitize_title(title).replace(' ', "_");
    let base = if base.is_empty() {
        "transcript".to_owned()
    } else {
        base
    };
    format!("{base}_{timestamp}.docx")
}

/// File name of the omitted-duplicates document: the display title with
/// filesystem-hostile characters removed. Not timestamped; a later run
/// replaces it.
#[must_use]
pub fn omitted_file_name(omitted_title: &str) -> String {
    let safe = FILENAME_ILLEGAL.replace_all(omitted_title, "");
    format!("{}.docx", safe.trim())
}
