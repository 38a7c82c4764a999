//! pdfdupe - Duplicate PDF Detection
//!
//! A detection engine that tracks a set of in-memory PDF files, fingerprints
//! them by raw bytes and by extracted content, clusters duplicates with a
//! choice of strategies and picks which copy of each cluster to keep.
//!
//! The library surface is [`duplicates::DetectionEngine`]; the `pdfdupe`
//! binary wraps it with file collection, layered configuration, progress
//! display and text/JSON reports.

pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod fingerprint;
pub mod logging;
pub mod output;
pub mod progress;
pub mod registry;
pub mod signal;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use walkdir::WalkDir;

use crate::cli::{Cli, Commands, OutputFormat, ScanArgs};
use crate::config::Config;
use crate::duplicates::DetectionEngine;
use crate::error::ExitCode;
use crate::fingerprint::FingerprintError;
use crate::output::{JsonOutput, TextOutput};
use crate::progress::Progress;
use crate::registry::{RawFile, TrackedFile, PDF_EXTENSION};

/// Run the application with parsed arguments.
///
/// # Errors
///
/// Returns an error for invalid configuration, unreadable input paths or
/// a cancelled detection run. Per-file fingerprinting failures are not
/// errors; they are reported in the outcome and reflected in the exit code.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);
    if cli.no_color {
        yansi::disable();
    }

    match cli.command {
        Commands::Scan(ref args) => run_scan(&cli, args),
        Commands::Config(ref args) => {
            let config = Config::load(args.config.as_deref())?;
            print!("{}", config.to_toml()?);
            Ok(ExitCode::Success)
        }
    }
}

fn run_scan(cli: &Cli, args: &ScanArgs) -> Result<ExitCode> {
    let config = Config::load(args.config.as_deref())?.with_cli_overrides(args);
    log::debug!("Effective configuration: {:?}", config);

    let options = config.to_detect_options();
    let collected = collect_files(&args.paths, options.max_file_size)?;
    log::info!(
        "Collected {} candidate files ({} skipped)",
        collected.files.len(),
        collected.skipped.len()
    );

    let mut engine = DetectionEngine::new();
    let tracked = engine.register(collected.files);
    log::info!("Registered {} PDF files", tracked.len());

    let hide_progress = cli.quiet || args.output == OutputFormat::Json;
    let shutdown = signal::install_handler().context("Failed to install signal handler")?;
    let options = options
        .with_progress(Arc::new(Progress::new(hide_progress)))
        .with_error_sink(Arc::new(log_detect_error))
        .with_cancel_flag(shutdown.get_flag());

    let mut outcome = engine.detect(&options).context("Duplicate detection failed")?;
    outcome.errors.extend(collected.skipped);

    let remaining = if args.remove {
        let before = engine.len();
        let files = engine.remove_duplicates(config.keep);
        outcome.duplicates_removed += before - files.len();
        Some(files)
    } else {
        None
    };
    let exit_code = ExitCode::from_outcome(&outcome);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match args.output {
        OutputFormat::Json => {
            let mut report = JsonOutput::new(&outcome, exit_code);
            if let Some(ref files) = remaining {
                report = report.with_remaining(files);
            }
            report.write_to(&mut out).context("Failed to write JSON output")?;
        }
        OutputFormat::Text if !cli.quiet => {
            let mut report = TextOutput::new(&outcome);
            if let Some(ref files) = remaining {
                report = report.with_remaining(files);
            }
            report.write_to(&mut out).context("Failed to write output")?;
        }
        OutputFormat::Text => {}
    }
    out.flush().context("Failed to flush output")?;

    Ok(exit_code)
}

fn log_detect_error(err: &(dyn std::error::Error + Send + Sync + 'static), file: Option<&TrackedFile>) {
    match file {
        Some(file) => log::warn!("{}: {}", file.name, err),
        None => log::warn!("{}", err),
    }
}

/// Inputs read from disk.
#[derive(Debug, Default)]
pub struct Collected {
    /// Files read into memory, in walk order
    pub files: Vec<RawFile>,
    /// One message per file left unread for exceeding the size limit
    pub skipped: Vec<String>,
}

impl Collected {
    fn push(&mut self, path: &Path, size: u64, limit: Option<u64>) -> Result<()> {
        match limit {
            Some(limit) if size > limit => {
                let message = format!(
                    "{}: {}",
                    path.display(),
                    FingerprintError::TooLarge { size, limit }
                );
                log::warn!("Skipping {}", message);
                self.skipped.push(message);
            }
            _ => self.files.push(read_file(path)?),
        }
        Ok(())
    }
}

/// Read every input into memory.
///
/// Files named explicitly are always read (the registry rejects non-PDFs).
/// Directories are walked recursively and only `.pdf` files are read.
/// Files over `max_file_size` are checked by metadata and never read.
///
/// # Errors
///
/// Returns an error if an input path does not exist or a file cannot be read.
pub fn collect_files(paths: &[PathBuf], max_file_size: Option<u64>) -> Result<Collected> {
    let mut collected = Collected::default();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry = entry.with_context(|| format!("Failed to walk {}", path.display()))?;
                if entry.file_type().is_file() && has_pdf_extension(entry.path()) {
                    let size = entry
                        .metadata()
                        .with_context(|| format!("Failed to stat {}", entry.path().display()))?
                        .len();
                    collected.push(entry.path(), size, max_file_size)?;
                }
            }
        } else if path.is_file() {
            let size = std::fs::metadata(path)
                .with_context(|| format!("Failed to stat {}", path.display()))?
                .len();
            collected.push(path, size, max_file_size)?;
        } else {
            anyhow::bail!("Path not found: {}", path.display());
        }
    }
    Ok(collected)
}

fn read_file(path: &Path) -> Result<RawFile> {
    let mut raw =
        RawFile::from_path(path).with_context(|| format!("Failed to read {}", path.display()))?;
    raw.name = path.display().to_string();
    Ok(raw)
}

fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(&PDF_EXTENSION[1..]))
}
