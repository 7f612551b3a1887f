// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Normalization of raw chat messages into renderable utterances.
//!
//! Each [`ChatMessage`] becomes one [`Utterance`]: the speaker resolved
//! against the configured default, the HTML content flattened to styled
//! spans, and dice-roll chat cards replaced by a one-line summary. The
//! whole card collapses to `"{speaker} rolls {formula} -> {total}"`, with
//! the flavor line appended in parentheses when present and `?` standing
//! in for pieces the card does not carry.
//!
//! Utterances with no visible text are kept as blanks rather than dropped
//! here; the deduplicator treats them as run breaks and the renderer skips
//! them.

use std::fmt::Write;

use crate::markup::{self, Node, Span};
use crate::parser::{ChatMessage, MessageStyle};

/// One normalized message, ready for deduplication and rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    /// The resolved speaker name, never empty.
    pub speaker: String,

    /// The styled text fragments of the message body.
    pub spans: Vec<Span>,

    /// The concatenated span texts. This is the identity the deduplicator
    /// compares on.
    pub text: String,

    /// Whether the message renders as italic narration.
    pub narration: bool,
}

impl Utterance {
    /// Returns `true` when the message has no visible text.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.text.is_empty()
    }
}

/// Class token marking a dice-roll chat card.
const DICE_ROLL_CLASS: &str = "dice-roll";

/// Normalizes one chat message.
///
/// A message with no speaker alias speaks as `default_speaker`. Missing
/// content yields a blank utterance.
#[must_use]
pub fn normalize_message(message: &ChatMessage, default_speaker: &str) -> Utterance {
    let speaker = message
        .speaker
        .clone()
        .unwrap_or_else(|| default_speaker.to_owned());

    let Some(content) = message.content.as_deref() else {
        return Utterance {
            speaker,
            spans: Vec::new(),
            text: String::new(),
            narration: false,
        };
    };

    let nodes = markup::parse(content);

    if let Some(summary) = roll_summary(&nodes, message.flavor.as_deref(), &speaker) {
        return Utterance {
            speaker,
            spans: vec![Span {
                text: summary.clone(),
                bold: false,
                italic: false,
            }],
            text: summary,
            narration: false,
        };
    }

    let spans = markup::spans(&nodes);
    let text = spans.iter().map(|span| span.text.as_str()).collect();

    Utterance {
        speaker,
        spans,
        text,
        narration: message.style == MessageStyle::Narration,
    }
}

/// Summarizes a dice-roll chat card, or returns `None` for ordinary
/// messages.
fn roll_summary(nodes: &[Node], flavor: Option<&str>, speaker: &str) -> Option<String> {
    if !markup::has_class(nodes, DICE_ROLL_CLASS) {
        return None;
    }

    let formula = card_field(nodes, "dice-formula");
    let total = card_field(nodes, "dice-total");

    let mut summary = format!("{speaker} rolls {formula} -> {total}");
    if let Some(flavor) = flavor {
        let flavor_text = markup::plain_text(&markup::parse(flavor));
        if !flavor_text.is_empty() {
            write!(summary, " ({flavor_text})").unwrap();
        }
    }
    Some(summary)
}

fn card_field(nodes: &[Node], class: &str) -> String {
    markup::find_class_text(nodes, class)
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| "?".to_owned())
}
