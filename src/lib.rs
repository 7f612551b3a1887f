// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Convert FoundryVTT chat log exports to DOCX transcripts.
//!
//! This crate turns the JSON chat logs a FoundryVTT game leaves behind
//! into a single print-ready transcript document, with an optional PDF
//! conversion step on top.
//!
//! # Overview
//!
//! FoundryVTT exports each session's chat as a JSON file of messages
//! whose content is HTML. This crate:
//!
//! 1. Parses the exports into typed session and message representations
//! 2. Normalizes the HTML into styled text, summarizing dice roll cards
//! 3. Removes consecutive duplicate messages, keeping a log of what was
//!    dropped
//! 4. Assembles front matter, cast list, and per-session sections, and
//!    serializes them as a `.docx` package
//!
//! # Example
//!
//! ```no_run
//! use fvtt2docx::{config, document, docx, parser};
//!
//! let settings = config::Settings::default();
//! let json = std::fs::read_to_string("sessions/session_1.json").unwrap();
//! let session = document::LoadedSession {
//!     file_name: "session_1.json".to_owned(),
//!     export: parser::parse_session(&json).unwrap(),
//! };
//!
//! let transcript = document::assemble(&settings, None, &[session]);
//! let bytes = docx::render_transcript(&transcript.document).unwrap();
//! std::fs::write("transcript.docx", bytes).unwrap();
//! ```
//!
//! # Modules
//!
//! - [`parser`]: JSON parsing and type definitions for chat log exports
//! - [`markup`]: Tolerant HTML parsing and flattening into styled spans
//! - [`transcript`]: Message normalization, including dice roll summaries
//! - [`dedup`]: Consecutive duplicate removal
//! - [`document`]: Assembly of sessions into a structured document
//! - [`docx`]: DOCX serialization
//! - [`pdf`]: Optional PDF conversion through an external converter
//! - [`config`]: Run settings and the cast override list

#![deny(missing_docs)]

pub mod config;
pub mod dedup;
pub mod document;
pub mod docx;
pub mod markup;
pub mod parser;
pub mod pdf;
pub mod transcript;
