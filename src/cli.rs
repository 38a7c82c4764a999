//! Command-line interface definitions.
//!
//! Defined with the clap derive API: global options (verbosity, color,
//! error format) plus a `scan` subcommand.
//!
//! # Example
//!
//! ```bash
//! # Byte-exact duplicates in a folder
//! pdfdupe scan ~/Documents --strategy byte-exact
//!
//! # Fuzzy matching, keep the largest copy, JSON report
//! pdfdupe scan ~/Documents --strategy fuzzy --threshold 0.9 --keep largest --output json
//!
//! # Show which files would remain after removing duplicates
//! pdfdupe -v scan a.pdf b.pdf c.pdf --remove
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::duplicates::{KeepPolicy, StrategyKind};

/// Duplicate PDF detector.
///
/// Fingerprints PDF files by their bytes and their extracted content,
/// clusters duplicates with a choice of strategies and picks which copy to
/// keep. Files on disk are never modified.
#[derive(Debug, Parser)]
#[command(name = "pdfdupe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Print errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Detect duplicate PDFs among files and directories
    Scan(ScanArgs),
    /// Print the resolved configuration as TOML
    Config(ConfigArgs),
}

/// Arguments for the config subcommand.
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Configuration file (TOML)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Arguments for the scan subcommand.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Files or directories to scan (directories are walked recursively)
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,

    /// Grouping strategy: byte-exact, structured, combined, fuzzy, token
    #[arg(short, long, value_name = "NAME", value_parser = parse_strategy)]
    pub strategy: Option<StrategyKind>,

    /// Similarity threshold for the fuzzy strategy (0.0 to 1.0)
    #[arg(short, long, value_name = "T")]
    pub threshold: Option<f64>,

    /// Which copy to keep: first, smallest, largest, newest, oldest
    #[arg(short, long, value_name = "POLICY", value_parser = parse_keep)]
    pub keep: Option<KeepPolicy>,

    /// Include document metadata in the content fingerprint
    #[arg(long)]
    pub extract_metadata: bool,

    /// Leave the text layer out of the content fingerprint
    #[arg(long)]
    pub no_extract_text: bool,

    /// Fuzzy matching: compare case-sensitively
    #[arg(long)]
    pub case_sensitive: bool,

    /// Fuzzy matching: ignore whitespace
    #[arg(long)]
    pub ignore_whitespace: bool,

    /// Fuzzy matching: ignore punctuation
    #[arg(long)]
    pub ignore_punctuation: bool,

    /// Number of fingerprinting threads (default: 4)
    #[arg(long, value_name = "N")]
    pub threads: Option<usize>,

    /// Skip files larger than this (e.g., 100MB, 1GiB; 0 for no limit)
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub max_file_size: Option<u64>,

    /// Drop duplicates from the result set and list the files that remain
    #[arg(long)]
    pub remove: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Configuration file (TOML)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Output format for detection results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary
    Text,
    /// JSON report for scripting
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

fn parse_strategy(s: &str) -> Result<StrategyKind, String> {
    s.parse().map_err(|e: crate::duplicates::DetectError| e.to_string())
}

fn parse_keep(s: &str) -> Result<KeepPolicy, String> {
    s.parse().map_err(|e: crate::duplicates::DetectError| e.to_string())
}

/// Parse a human-readable size string into bytes.
///
/// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
/// Case-insensitive. Numbers without suffix are treated as bytes.
///
/// # Examples
///
/// ```
/// use pdfdupe::cli::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1KB").unwrap(), 1000);
/// assert_eq!(parse_size("500MiB").unwrap(), 524_288_000);
/// ```
///
/// # Errors
///
/// Returns an error if the string is empty, contains an invalid number,
/// a negative number, or an unknown size suffix.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }
    if s.starts_with('-') {
        return Err("Size cannot be negative".to_string());
    }

    let (num_str, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => (&s[..idx], s[idx..].trim().to_uppercase()),
        None => (s, String::new()),
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "KB" | "K" => 1_000,
        "KIB" => 1_024,
        "MB" | "M" => 1_000_000,
        "MIB" => 1_048_576,
        "GB" | "G" => 1_000_000_000,
        "GIB" => 1_073_741_824,
        "TB" | "T" => 1_000_000_000_000,
        "TIB" => 1_099_511_627_776,
        _ => return Err(format!("Unknown size suffix: '{suffix}'")),
    };

    Ok((num * multiplier as f64) as u64)
}
