//! Layered configuration.
//!
//! Settings are merged with figment, later layers winning:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. TOML file (`--config PATH`, else `<config_dir>/pdfdupe/config.toml`)
//! 3. Environment variables prefixed `PDFDUPE_` (e.g. `PDFDUPE_STRATEGY=fuzzy`)
//! 4. Command-line flags ([`Config::with_cli_overrides`])
//!
//! # Example
//!
//! ```toml
//! strategy = "fuzzy"
//! threshold = 0.9
//! keep = "largest"
//! extract_metadata = true
//! max_file_size = 104857600
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::cli::ScanArgs;
use crate::duplicates::{
    DetectOptions, KeepPolicy, SimilarityOptions, StrategyKind, DEFAULT_THREADS,
    DEFAULT_THRESHOLD,
};
use crate::fingerprint::ExtractOptions;

/// Default per-file size limit (500 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 500 * 1024 * 1024;

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "PDFDUPE_";

/// Resolved detection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Grouping strategy
    pub strategy: StrategyKind,
    /// Fuzzy similarity threshold
    pub threshold: f64,
    /// Feed the text layer into the structured digest
    pub extract_text: bool,
    /// Feed document metadata into the structured digest
    pub extract_metadata: bool,
    /// Fuzzy scoring without case folding
    pub case_sensitive: bool,
    /// Fuzzy scoring ignores whitespace
    pub ignore_whitespace: bool,
    /// Fuzzy scoring ignores punctuation
    pub ignore_punctuation: bool,
    /// Keeper policy
    pub keep: KeepPolicy,
    /// Fingerprinting threads
    pub threads: usize,
    /// Per-file size limit in bytes; 0 disables the limit
    pub max_file_size: u64,
}

impl Default for Config {
    fn default() -> Self {
        let extract = ExtractOptions::default();
        Self {
            strategy: StrategyKind::default(),
            threshold: DEFAULT_THRESHOLD,
            extract_text: extract.extract_text,
            extract_metadata: extract.extract_metadata,
            case_sensitive: false,
            ignore_whitespace: false,
            ignore_punctuation: false,
            keep: KeepPolicy::default(),
            threads: DEFAULT_THREADS,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl Config {
    /// Load defaults, the config file and the environment.
    ///
    /// An explicit `path` must exist; the default path is optional.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit file is missing or any layer holds
    /// an invalid value.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            if !path.is_file() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
        }

        let file = path.map(Path::to_path_buf).or_else(default_config_path);
        match file {
            Some(ref p) => log::debug!("Loading config from {}", p.display()),
            None => log::debug!("No config directory available, using defaults"),
        }

        Self::figment(file.as_deref())
            .extract()
            .context("Invalid configuration")
    }

    /// The merged figment for `file` (if any) plus the environment.
    #[must_use]
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = file {
            figment = figment.merge(Toml::file(file));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// Apply command-line flags on top of the loaded settings.
    ///
    /// Boolean flags only ever switch their feature on, except
    /// `--no-extract-text`, which switches text extraction off.
    #[must_use]
    pub fn with_cli_overrides(mut self, args: &ScanArgs) -> Self {
        if let Some(strategy) = args.strategy {
            self.strategy = strategy;
        }
        if let Some(threshold) = args.threshold {
            self.threshold = threshold;
        }
        if let Some(keep) = args.keep {
            self.keep = keep;
        }
        if let Some(threads) = args.threads {
            self.threads = threads;
        }
        if let Some(limit) = args.max_file_size {
            self.max_file_size = limit;
        }
        if args.no_extract_text {
            self.extract_text = false;
        }
        self.extract_metadata |= args.extract_metadata;
        self.case_sensitive |= args.case_sensitive;
        self.ignore_whitespace |= args.ignore_whitespace;
        self.ignore_punctuation |= args.ignore_punctuation;
        self
    }

    /// Convert into engine options (without sinks, plugins or cancel flag).
    #[must_use]
    pub fn to_detect_options(&self) -> DetectOptions {
        DetectOptions::default()
            .with_strategy(self.strategy)
            .with_threshold(self.threshold)
            .with_extract(ExtractOptions {
                extract_text: self.extract_text,
                extract_metadata: self.extract_metadata,
            })
            .with_similarity(SimilarityOptions {
                case_sensitive: self.case_sensitive,
                ignore_whitespace: self.ignore_whitespace,
                ignore_punctuation: self.ignore_punctuation,
            })
            .with_keep(self.keep)
            .with_threads(self.threads)
            .with_max_file_size((self.max_file_size > 0).then_some(self.max_file_size))
    }

    /// Render as a TOML document.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be represented in TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}

/// `<config_dir>/pdfdupe/config.toml` for the current platform.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "pdfdupe").map(|dirs| dirs.config_dir().join("config.toml"))
}
