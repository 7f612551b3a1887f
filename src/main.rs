// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Command-line interface for fvtt2docx.
//!
//! This binary provides the `fvtt2docx` command for converting a
//! directory of FoundryVTT chat log exports into a single DOCX
//! transcript, with an optional PDF conversion step.

use std::path::{Path, PathBuf};

use fvtt2docx::config::{CastList, Settings};
use fvtt2docx::document::{self, LoadedSession, OmittedLog};
use fvtt2docx::pdf::{LibreOffice, PdfEngine};
use fvtt2docx::{docx, parser};
use lexopt::prelude::*;
use snafu::{ensure, prelude::*};

const ICON: &str = "●";

// ANSI colour helpers (no extra deps)

fn blue(s: &str) -> String {
    format!("\x1b[34m{s}\x1b[0m")
}
fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}

/// Progress reporting to stderr. Warnings always print; progress lines
/// honor `--quiet`.
struct Status {
    quiet: bool,
}

impl Status {
    fn working(&self, message: &str) {
        if !self.quiet {
            eprintln!("{}", blue(&format!("{ICON} {message}")));
        }
    }

    fn done(&self, message: &str) {
        if !self.quiet {
            eprintln!("{}", green(&format!("{ICON} {message}")));
        }
    }

    fn warn(&self, message: &str) {
        eprintln!("{}", red(&format!("{ICON} {message}")));
    }
}

struct Cli {
    sessions_dir: PathBuf,
    config_dir: PathBuf,
    output_dir: Option<PathBuf>,
    portraits_dir: Option<PathBuf>,
    pdf: Option<bool>,
    quiet: bool,
}

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to parse arguments: {source}"))]
    ParseArgs { source: lexopt::Error },

    #[snafu(display("no session files found in {}", dir.display()))]
    NoSessions { dir: PathBuf },

    #[snafu(display("no session file could be loaded from {}", dir.display()))]
    NothingLoaded { dir: PathBuf },

    #[snafu(display("failed to create output directory {}: {source}", dir.display()))]
    CreateOutputDir {
        dir: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to render {name}: {source}"))]
    Render {
        name: String,
        source: docx::RenderError,
    },

    #[snafu(display("failed to write {}: {source}", path.display()))]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn print_help() {
    println!(
        "\
{name} {version}
Convert FoundryVTT chat log exports to a DOCX transcript

Usage: {name} [OPTIONS]

Options:
  -s, --sessions <DIR>   Directory of session JSON exports (default: sessions)
  -c, --config <DIR>     Directory holding config.txt and actors.txt (default: config)
  -o, --output <DIR>     Output directory (overrides OUTPUT_DIR, default: export)
      --portraits <DIR>  Directory of cast portraits (overrides PORTRAITS_DIR, default: portraits)
      --pdf              Convert the transcript to PDF (default: on)
      --no-pdf           Skip PDF conversion
  -q, --quiet            Suppress progress messages
  -h, --help             Print help
  -V, --version          Print version",
        name = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
    );
}

fn parse_args() -> Result<Cli, lexopt::Error> {
    let mut sessions_dir = PathBuf::from("sessions");
    let mut config_dir = PathBuf::from("config");
    let mut output_dir = None;
    let mut portraits_dir = None;
    let mut pdf = None;
    let mut quiet = false;

    let mut parser = lexopt::Parser::from_env();
    while let Some(arg) = parser.next()? {
        match arg {
            Short('s') | Long("sessions") => sessions_dir = parser.value()?.parse()?,
            Short('c') | Long("config") => config_dir = parser.value()?.parse()?,
            Short('o') | Long("output") => output_dir = Some(parser.value()?.parse()?),
            Long("portraits") => portraits_dir = Some(parser.value()?.parse()?),
            Long("pdf") => pdf = Some(true),
            Long("no-pdf") => pdf = Some(false),
            Short('q') | Long("quiet") => quiet = true,
            Short('h') | Long("help") => {
                print_help();
                std::process::exit(0);
            }
            Short('V') | Long("version") => {
                println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            _ => return Err(arg.unexpected()),
        }
    }

    Ok(Cli {
        sessions_dir,
        config_dir,
        output_dir,
        portraits_dir,
        pdf,
        quiet,
    })
}

fn main() -> Result<(), Error> {
    let cli = parse_args().context(ParseArgsSnafu)?;
    let status = Status { quiet: cli.quiet };

    // Config file first, CLI flags on top.
    let config_path = cli.config_dir.join("config.txt");
    let mut settings = Settings::from_file(&config_path);
    if config_path.is_file() {
        status.working(&format!(
            "Loaded configuration from {}",
            config_path.display()
        ));
    } else {
        status.working("No config.txt found, using defaults");
    }
    if let Some(dir) = cli.portraits_dir {
        settings.portraits_dir = dir;
    }
    if let Some(dir) = cli.output_dir {
        settings.output_dir = dir;
    }
    if let Some(pdf) = cli.pdf {
        settings.print_to_pdf = pdf;
    }

    let actors_path = cli.config_dir.join("actors.txt");
    let cast = CastList::from_file(&actors_path);
    if let Some(cast) = &cast {
        status.working(&format!(
            "Loaded {} actors from {}",
            cast.len(),
            actors_path.display()
        ));
    }

    let files = parser::collect_session_files(&cli.sessions_dir);
    ensure!(
        !files.is_empty(),
        NoSessionsSnafu {
            dir: &cli.sessions_dir
        }
    );

    let sessions = load_sessions(&files, &status);
    ensure!(
        !sessions.is_empty(),
        NothingLoadedSnafu {
            dir: &cli.sessions_dir
        }
    );

    let transcript = document::assemble(&settings, cast.as_ref(), &sessions);
    for group in &transcript.omitted.groups {
        status.working(&format!(
            "Removed {} consecutive duplicate message(s) from {}",
            group.entries.len(),
            sessions[group.index - 1].file_name
        ));
    }

    std::fs::create_dir_all(&settings.output_dir).context(CreateOutputDirSnafu {
        dir: &settings.output_dir,
    })?;

    let timestamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
    let file_name = document::transcript_file_name(&settings.title, &timestamp);
    let out_path = settings.output_dir.join(&file_name);
    let bytes =
        docx::render_transcript(&transcript.document).context(RenderSnafu { name: &file_name })?;
    std::fs::write(&out_path, &bytes).context(WriteFileSnafu { path: &out_path })?;
    status.done(&format!("Export complete: {}", out_path.display()));

    export_omitted(&transcript.omitted, &settings.output_dir, &status)?;

    if settings.print_to_pdf {
        export_pdf(&out_path, &status)?;
    } else {
        status.working("PRINT2PDF=no, skipping PDF export");
    }

    Ok(())
}

/// Loads every session export in order, skipping files that fail to
/// read or parse with a warning.
fn load_sessions(files: &[PathBuf], status: &Status) -> Vec<LoadedSession> {
    let mut sessions = Vec::with_capacity(files.len());
    for path in files {
        let name = path.file_name().map_or_else(
            || path.display().to_string(),
            |name| name.to_string_lossy().into_owned(),
        );
        status.working(&format!("Processing {name}..."));
        let loaded = std::fs::read_to_string(path)
            .map_err(|err| err.to_string())
            .and_then(|json| parser::parse_session(&json).map_err(|err| err.to_string()));
        match loaded {
            Ok(export) => sessions.push(LoadedSession {
                file_name: name,
                export,
            }),
            Err(message) => status.warn(&format!("Skipping {name}: {message}")),
        }
    }
    sessions
}

/// Writes the omitted-duplicates document under `{output}/omitted/`,
/// only when something was actually removed.
fn export_omitted(omitted: &OmittedLog, output_dir: &Path, status: &Status) -> Result<(), Error> {
    if omitted.is_empty() {
        status.working("No omitted duplicates to write");
        return Ok(());
    }

    let omitted_dir = output_dir.join("omitted");
    std::fs::create_dir_all(&omitted_dir).context(CreateOutputDirSnafu { dir: &omitted_dir })?;
    let name = document::omitted_file_name(&omitted.title);
    let path = omitted_dir.join(&name);
    let bytes = docx::render_omitted(omitted).context(RenderSnafu { name: &name })?;
    std::fs::write(&path, &bytes).context(WriteFileSnafu { path: &path })?;
    status.done(&format!("Omitted duplicates exported to: {}", path.display()));
    Ok(())
}

/// Converts the finished transcript to PDF alongside it. A missing
/// converter or a failed conversion is a warning, not an error; the
/// DOCX outputs already exist.
fn export_pdf(docx_path: &Path, status: &Status) -> Result<(), Error> {
    let Some(engine) = LibreOffice::detect() else {
        status.warn("LibreOffice not found, skipping PDF export");
        return Ok(());
    };

    status.working("Converting to PDF...");
    match engine.render(docx_path) {
        Ok(bytes) => {
            let pdf_path = docx_path.with_extension("pdf");
            std::fs::write(&pdf_path, &bytes).context(WriteFileSnafu { path: &pdf_path })?;
            status.done(&format!("PDF created: {}", pdf_path.display()));
        }
        Err(err) => status.warn(&format!("PDF conversion failed: {err}")),
    }
    Ok(())
}
