// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Optional PDF conversion of the rendered transcript.
//!
//! Conversion runs through an external converter behind the
//! [`PdfEngine`] trait; the transcript itself never depends on one
//! being installed. [`LibreOffice`] drives a headless `soffice`
//! process and is picked up by [`LibreOffice::detect`] when present.

use std::path::{Path, PathBuf};
use std::process::Command;

use snafu::{ResultExt, Snafu, ensure};

/// Errors produced while converting a document to PDF.
#[derive(Debug, Snafu)]
pub enum PdfError {
    /// The scratch directory for the converter could not be created.
    #[snafu(display("failed to create scratch directory: {source}"))]
    Scratch {
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// The converter process could not be started.
    #[snafu(display("failed to launch {program}: {source}"))]
    Launch {
        /// The program that was invoked.
        program: String,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// The converter ran but reported failure.
    #[snafu(display("{program} failed ({status}): {stderr}"))]
    Failed {
        /// The program that was invoked.
        program: String,
        /// The process exit status.
        status: String,
        /// Trimmed standard error output.
        stderr: String,
    },

    /// The converter reported success but wrote no output file.
    #[snafu(display("converter produced no output at {}", path.display()))]
    MissingOutput {
        /// Where the output was expected.
        path: PathBuf,
    },

    /// The converted output could not be read back.
    #[snafu(display("failed to read converted output: {source}"))]
    ReadOutput {
        /// Underlying IO error.
        source: std::io::Error,
    },
}

/// Converts a rendered `.docx` file into PDF bytes.
pub trait PdfEngine {
    /// Converts the document at `docx` and returns the PDF bytes.
    ///
    /// # Errors
    ///
    /// Returns a [`PdfError`] when the converter cannot run, fails, or
    /// produces unreadable output.
    fn render(&self, docx: &Path) -> Result<Vec<u8>, PdfError>;
}

/// A [`PdfEngine`] backed by a headless LibreOffice process.
#[derive(Debug, Clone)]
pub struct LibreOffice {
    program: String,
}

impl LibreOffice {
    /// Uses the given program name or path as the converter binary.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Probes the usual LibreOffice binary names and returns an engine
    /// for the first one that answers `--version`.
    #[must_use]
    pub fn detect() -> Option<Self> {
        ["soffice", "libreoffice"]
            .into_iter()
            .find(|program| {
                Command::new(program)
                    .arg("--version")
                    .output()
                    .is_ok_and(|output| output.status.success())
            })
            .map(Self::new)
    }
}

impl PdfEngine for LibreOffice {
    fn render(&self, docx: &Path) -> Result<Vec<u8>, PdfError> {
        // LibreOffice only converts into a directory, so give it a
        // scratch one and pick the result up from there.
        let scratch = tempfile::tempdir().context(ScratchSnafu)?;

        let output = Command::new(&self.program)
            .arg("--headless")
            .arg("--norestore")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(scratch.path())
            .arg(docx)
            .output()
            .context(LaunchSnafu {
                program: &self.program,
            })?;
        ensure!(
            output.status.success(),
            FailedSnafu {
                program: &self.program,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            }
        );

        let pdf = scratch
            .path()
            .join(docx.file_stem().unwrap_or_default())
            .with_extension("pdf");
        ensure!(pdf.is_file(), MissingOutputSnafu { path: pdf });
        std::fs::read(&pdf).context(ReadOutputSnafu)
    }
}
