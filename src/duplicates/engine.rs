//! Detection orchestrator.
//!
//! # Overview
//!
//! [`DetectionEngine`] owns the file registry and runs the pipeline:
//!
//! 1. Validate options (contract violations fail before any work)
//! 2. Fingerprint every file the strategy needs, in parallel on a bounded
//!    rayon pool, writing results back by registry index
//! 3. Cluster with the chosen built-in strategy, or with caller plugins
//! 4. Pick a keeper per cluster and stamp each file's grouping key
//!
//! Per-file failures are recorded in [`DetectionOutcome::errors`] and sent
//! to the error sink; they never abort the run.
//!
//! # Example
//!
//! ```
//! use pdfdupe::duplicates::{DetectOptions, DetectionEngine, StrategyKind};
//! use pdfdupe::registry::RawFile;
//!
//! let mut engine = DetectionEngine::new();
//! engine.register(vec![
//!     RawFile::new("a.pdf", b"x".to_vec()),
//!     RawFile::new("b.pdf", b"x".to_vec()),
//!     RawFile::new("c.pdf", b"y".to_vec()),
//! ]);
//!
//! let options = DetectOptions::default().with_strategy(StrategyKind::ByteExact);
//! let outcome = engine.detect(&options).unwrap();
//!
//! assert_eq!(outcome.duplicates_found, 1);
//! assert_eq!(outcome.unique_files, 2);
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use super::groups::{bucket_by_key, DuplicateCluster};
use super::keep::KeepPolicy;
use super::strategy::{DetectionStrategy, SimilarityOptions, Strategy, StrategyKind};
use crate::fingerprint::{DigestCache, ExtractOptions, FingerprintError, Fingerprinter};
use crate::progress::{ErrorSink, ProgressReporter, ProgressSink};
use crate::registry::{RawFile, Registry, TrackedFile};

/// Default fuzzy similarity threshold.
pub const DEFAULT_THRESHOLD: f64 = 0.8;

/// Default number of fingerprinting threads.
pub const DEFAULT_THREADS: usize = 4;

/// Caller-contract violations and cancellation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectError {
    /// Threshold outside `[0, 1]` or NaN.
    #[error("Invalid threshold {0}: must be between 0 and 1")]
    InvalidThreshold(f64),

    /// Strategy name not recognised.
    #[error("Unknown strategy '{name}'{}", did_you_mean(.suggestion))]
    UnknownStrategy {
        /// Name as given
        name: String,
        /// Closest known name
        suggestion: Option<String>,
    },

    /// Keep policy name not recognised.
    #[error("Unknown keep policy '{name}'{}", did_you_mean(.suggestion))]
    UnknownKeepPolicy {
        /// Name as given
        name: String,
        /// Closest known name
        suggestion: Option<String>,
    },

    /// Zero worker threads requested.
    #[error("Thread count must be at least 1")]
    InvalidThreadCount,

    /// The cancel flag was raised mid-run.
    #[error("Detection cancelled after {processed} of {total} files")]
    Cancelled {
        /// Files fingerprinted before the flag was seen
        processed: usize,
        /// Files registered
        total: usize,
    },
}

fn did_you_mean(suggestion: &Option<String>) -> String {
    suggestion
        .as_deref()
        .map(|s| format!(" (did you mean '{s}'?)"))
        .unwrap_or_default()
}

/// Options for one detection run.
#[derive(Clone)]
pub struct DetectOptions {
    /// Built-in strategy (ignored when plugins are supplied)
    pub strategy: StrategyKind,
    /// Fuzzy similarity threshold in `[0, 1]`
    pub threshold: f64,
    /// What feeds the structured digest
    pub extract: ExtractOptions,
    /// Fuzzy scoring flags
    pub similarity: SimilarityOptions,
    /// Keeper policy applied to every cluster
    pub keep: KeepPolicy,
    /// Fingerprinting worker threads
    pub threads: usize,
    /// Per-file size limit in bytes
    pub max_file_size: Option<u64>,
    /// External strategies; when non-empty, built-ins are bypassed
    pub plugins: Vec<Arc<dyn DetectionStrategy>>,
    /// Progress callback
    pub progress: Option<Arc<dyn ProgressSink>>,
    /// Error callback
    pub on_error: Option<Arc<dyn ErrorSink>>,
    /// Checked once per file before fingerprinting
    pub cancel_flag: Option<Arc<AtomicBool>>,
}

impl std::fmt::Debug for DetectOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectOptions")
            .field("strategy", &self.strategy)
            .field("threshold", &self.threshold)
            .field("extract", &self.extract)
            .field("similarity", &self.similarity)
            .field("keep", &self.keep)
            .field("threads", &self.threads)
            .field("max_file_size", &self.max_file_size)
            .field(
                "plugins",
                &self.plugins.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field("progress", &self.progress.as_ref().map(|_| "<callback>"))
            .field("on_error", &self.on_error.as_ref().map(|_| "<callback>"))
            .field("cancel_flag", &self.cancel_flag)
            .finish()
    }
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            threshold: DEFAULT_THRESHOLD,
            extract: ExtractOptions::default(),
            similarity: SimilarityOptions::default(),
            keep: KeepPolicy::default(),
            threads: DEFAULT_THREADS,
            max_file_size: None,
            plugins: Vec::new(),
            progress: None,
            on_error: None,
            cancel_flag: None,
        }
    }
}

impl DetectOptions {
    /// Set the built-in strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the fuzzy threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the extraction options.
    #[must_use]
    pub fn with_extract(mut self, extract: ExtractOptions) -> Self {
        self.extract = extract;
        self
    }

    /// Set the fuzzy scoring flags.
    #[must_use]
    pub fn with_similarity(mut self, similarity: SimilarityOptions) -> Self {
        self.similarity = similarity;
        self
    }

    /// Set the keep policy.
    #[must_use]
    pub fn with_keep(mut self, keep: KeepPolicy) -> Self {
        self.keep = keep;
        self
    }

    /// Set the worker thread count.
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Set the per-file size limit.
    #[must_use]
    pub fn with_max_file_size(mut self, limit: Option<u64>) -> Self {
        self.max_file_size = limit;
        self
    }

    /// Add an external strategy.
    #[must_use]
    pub fn with_plugin(mut self, plugin: Arc<dyn DetectionStrategy>) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    /// Set the error callback.
    #[must_use]
    pub fn with_error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.on_error = Some(sink);
        self
    }

    /// Set the cancellation flag.
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel_flag = Some(flag);
        self
    }

    /// Check if cancellation has been requested.
    fn is_cancelled(&self) -> bool {
        self.cancel_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    fn report_error(
        &self,
        error: &(dyn std::error::Error + Send + Sync + 'static),
        file: Option<&TrackedFile>,
    ) {
        if let Some(ref sink) = self.on_error {
            sink.on_error(error, file);
        }
    }
}

/// Result of one detection run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionOutcome {
    /// Files registered at detection time
    pub total_files: usize,
    /// `total_files - duplicates_found`
    pub unique_files: usize,
    /// Clusters, in first-seen order
    pub duplicate_groups: Vec<DuplicateCluster>,
    /// Non-keepers across all clusters
    pub duplicates_found: usize,
    /// Files dropped by `remove_duplicates` since the last clear
    pub duplicates_removed: usize,
    /// Wall time of the run
    pub processing_time_ms: u64,
    /// Non-fatal error messages
    pub errors: Vec<String>,
    /// Strategy requested
    pub method: StrategyKind,
    /// Threshold, for fuzzy runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    /// Plugins that ran instead of the built-in strategy
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<String>,
}

impl DetectionOutcome {
    fn empty(method: StrategyKind, threshold: Option<f64>, duplicates_removed: usize) -> Self {
        Self {
            total_files: 0,
            unique_files: 0,
            duplicate_groups: Vec::new(),
            duplicates_found: 0,
            duplicates_removed,
            processing_time_ms: 0,
            errors: Vec::new(),
            method,
            threshold,
            plugins: Vec::new(),
        }
    }

    /// Whether any duplicates were found.
    #[must_use]
    pub fn has_duplicates(&self) -> bool {
        !self.duplicate_groups.is_empty()
    }

    /// Bytes that removing every duplicate would free.
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        self.duplicate_groups.iter().map(|g| g.wasted_space()).sum()
    }
}

/// Lifecycle of the engine's registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    /// No files registered
    Empty,
    /// Files registered, no current outcome
    Populated,
    /// A run is in progress
    Detecting,
    /// The last outcome matches the registry
    Detected,
}

/// Owns the registry and runs detection over it.
///
/// All mutating operations take `&mut self`, so registration can never
/// overlap an in-flight [`DetectionEngine::detect`].
#[derive(Debug)]
pub struct DetectionEngine {
    registry: Registry,
    state: EngineState,
    last_outcome: Option<DetectionOutcome>,
    removed_total: usize,
}

impl Default for DetectionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectionEngine {
    /// Create an engine with an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            state: EngineState::Empty,
            last_outcome: None,
            removed_total: 0,
        }
    }

    fn invalidate(&mut self) {
        self.last_outcome = None;
        self.state = if self.registry.is_empty() {
            EngineState::Empty
        } else {
            EngineState::Populated
        };
    }

    /// Register raw files; non-PDFs are silently dropped.
    ///
    /// Returns the files that were accepted, in input order.
    pub fn register(&mut self, raw_files: impl IntoIterator<Item = RawFile>) -> Vec<TrackedFile> {
        let added = self.registry.register(raw_files);
        if !added.is_empty() {
            log::debug!("Registered {} files", added.len());
            self.invalidate();
        }
        added
    }

    /// Remove a file by id.
    pub fn unregister(&mut self, id: &str) -> Option<TrackedFile> {
        let removed = self.registry.remove(id);
        self.invalidate();
        removed
    }

    /// Drop every file and reset the removal counter.
    pub fn clear(&mut self) {
        self.registry.clear();
        self.removed_total = 0;
        self.invalidate();
    }

    /// Registered files in registration order.
    #[must_use]
    pub fn files(&self) -> &[TrackedFile] {
        self.registry.files()
    }

    /// Look up a registered file.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&TrackedFile> {
        self.registry.get(id)
    }

    /// Number of registered files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// Whether no files are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Outcome of the last run, if the registry has not changed since.
    #[must_use]
    pub fn last_outcome(&self) -> Option<&DetectionOutcome> {
        self.last_outcome.as_ref()
    }

    /// Run duplicate detection over the registry.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError`] for invalid options (before any work is
    /// done) or when the cancel flag trips. Per-file failures are not
    /// errors; they are listed in the outcome.
    pub fn detect(&mut self, options: &DetectOptions) -> Result<DetectionOutcome, DetectError> {
        let strategy = Strategy::from_options(options)?;
        if options.threads == 0 {
            return Err(DetectError::InvalidThreadCount);
        }

        let started = Instant::now();
        let total = self.registry.len();
        let reporter = ProgressReporter::new(options.progress.clone(), total).with_file_range(20, 90);

        if total == 0 {
            reporter.emit(100, "Detection complete");
            let outcome =
                DetectionOutcome::empty(strategy.kind(), strategy.threshold(), self.removed_total);
            self.last_outcome = Some(outcome.clone());
            return Ok(outcome);
        }

        self.state = EngineState::Detecting;
        log::info!(
            "Detecting duplicates among {} files ({})",
            total,
            strategy.kind()
        );
        reporter.emit(10, "Starting duplicate detection...");

        for file in self.registry.files_mut() {
            file.fingerprint = None;
        }

        let mut errors = Vec::new();
        let result = if options.plugins.is_empty() {
            self.run_builtin(&strategy, options, &reporter, &mut errors)
        } else {
            self.run_plugins(options, &reporter, &mut errors)
        };

        let mut clusters = match result {
            Ok(clusters) => clusters,
            Err(e) => {
                log::warn!("{}", e);
                self.invalidate();
                return Err(e);
            }
        };

        reporter.emit(90, "Analyzing duplicates...");
        self.finalize_clusters(&mut clusters, options.keep);

        let duplicates_found: usize = clusters.iter().map(DuplicateCluster::duplicate_count).sum();
        let processing_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        log::info!(
            "Found {} duplicate groups ({} duplicates) in {}ms",
            clusters.len(),
            duplicates_found,
            processing_time_ms
        );
        reporter.emit(100, "Detection complete");

        let outcome = DetectionOutcome {
            total_files: total,
            unique_files: total - duplicates_found,
            duplicate_groups: clusters,
            duplicates_found,
            duplicates_removed: self.removed_total,
            processing_time_ms,
            errors,
            method: strategy.kind(),
            threshold: strategy.threshold(),
            plugins: options.plugins.iter().map(|p| p.name().to_string()).collect(),
        };

        self.state = EngineState::Detected;
        self.last_outcome = Some(outcome.clone());
        Ok(outcome)
    }

    fn run_builtin(
        &mut self,
        strategy: &Strategy,
        options: &DetectOptions,
        reporter: &ProgressReporter,
        errors: &mut Vec<String>,
    ) -> Result<Vec<DuplicateCluster>, DetectError> {
        reporter.emit(20, &format!("Using detection method: {}...", strategy.kind()));

        let results = self.fingerprint_all(strategy, options, reporter);
        let total = results.len();
        let processed = results.iter().filter(|r| r.is_some()).count();

        let mut failed = HashSet::new();
        let mut failures = Vec::new();
        {
            let files = self.registry.files_mut();
            for (index, result) in results.into_iter().enumerate() {
                match result {
                    Some(Ok(digests)) => files[index].set_digests(digests),
                    Some(Err(e)) => {
                        failed.insert(index);
                        failures.push((index, e));
                    }
                    None => {}
                }
            }
        }

        // Failures seen before a cancellation still reach the sink
        for (index, error) in failures {
            let file = &self.registry.files()[index];
            let message = format!("{}: {}", file.name, error);
            log::warn!("Failed to fingerprint {}", message);
            options.report_error(&error, Some(file));
            errors.push(message);
        }

        if processed < total {
            return Err(DetectError::Cancelled { processed, total });
        }

        let eligible: Vec<&TrackedFile> = self
            .registry
            .files()
            .iter()
            .enumerate()
            .filter(|(i, _)| !failed.contains(i))
            .map(|(_, f)| f)
            .collect();
        let clusters = strategy.cluster(&eligible);

        let keys: Vec<Option<String>> = self
            .registry
            .files()
            .iter()
            .enumerate()
            .map(|(i, f)| {
                if failed.contains(&i) {
                    None
                } else {
                    strategy.fingerprint_key(f)
                }
            })
            .collect();
        for (file, key) in self.registry.files_mut().iter_mut().zip(keys) {
            file.fingerprint = key;
        }

        Ok(clusters)
    }

    /// Fingerprint every file on a bounded pool.
    ///
    /// Results are indexed like the registry; `None` marks a file skipped
    /// after cancellation.
    fn fingerprint_all(
        &self,
        strategy: &Strategy,
        options: &DetectOptions,
        reporter: &ProgressReporter,
    ) -> Vec<Option<Result<DigestCache, FingerprintError>>> {
        let needs = strategy.needs();
        let fingerprinter = Fingerprinter::new().with_max_file_size(options.max_file_size);
        let files = self.registry.files();

        let work = || -> Vec<Option<Result<DigestCache, FingerprintError>>> {
            files
                .par_iter()
                .map(|file| {
                    if options.is_cancelled() {
                        log::debug!("Cancellation requested, skipping {}", file.name);
                        return None;
                    }
                    log::trace!("Fingerprinting {}", file.name);
                    let result = fingerprinter.fingerprint(file, &needs);
                    reporter.file_done(&file.name);
                    Some(result)
                })
                .collect()
        };

        match rayon::ThreadPoolBuilder::new()
            .num_threads(options.threads)
            .build()
        {
            Ok(pool) => pool.install(work),
            Err(e) => {
                log::warn!(
                    "Failed to create thread pool ({}), using global pool with {} threads",
                    e,
                    rayon::current_num_threads()
                );
                work()
            }
        }
    }

    fn run_plugins(
        &self,
        options: &DetectOptions,
        reporter: &ProgressReporter,
        errors: &mut Vec<String>,
    ) -> Result<Vec<DuplicateCluster>, DetectError> {
        let mut raw = Vec::new();
        for plugin in &options.plugins {
            if options.is_cancelled() {
                return Err(DetectError::Cancelled {
                    processed: 0,
                    total: self.registry.len(),
                });
            }
            reporter.emit(30, &format!("Using plugin: {}...", plugin.name()));
            match plugin.detect(self.registry.files(), options) {
                Ok(clusters) => raw.extend(clusters),
                Err(e) => {
                    let message = format!("Error during detection: {e}");
                    log::warn!("Plugin {} failed: {}", plugin.name(), e);
                    options.report_error(e.as_ref(), None);
                    errors.push(message);
                }
            }
        }

        Ok(self.reconcile(raw))
    }

    /// Map plugin clusters back onto the registry.
    ///
    /// Unknown ids are dropped, each file joins at most one cluster and
    /// members become the registry's own copies. Labels get a `#n` suffix
    /// when already taken; [`Self::duplicate_clusters`] regroups on them.
    fn reconcile(&self, raw: Vec<DuplicateCluster>) -> Vec<DuplicateCluster> {
        let by_id: HashMap<&str, &TrackedFile> = self
            .registry
            .files()
            .iter()
            .map(|f| (f.id.as_str(), f))
            .collect();
        let mut claimed: HashSet<String> = HashSet::new();
        let mut labels: HashSet<String> = HashSet::new();

        raw.into_iter()
            .filter_map(|cluster| {
                let mut members = Vec::new();
                for file in &cluster.files {
                    if let Some(tracked) = by_id.get(file.id.as_str()) {
                        if claimed.insert(file.id.clone()) {
                            members.push((*tracked).clone());
                        }
                    }
                }
                let mut cluster = DuplicateCluster::new(cluster.fingerprint, members)?;
                cluster.fingerprint = unique_label(&mut labels, cluster.fingerprint);
                Some(cluster)
            })
            .collect()
    }

    /// Apply the keep policy and copy each cluster's key onto its members.
    fn finalize_clusters(&mut self, clusters: &mut [DuplicateCluster], keep: KeepPolicy) {
        let mut stamps: HashMap<String, String> = HashMap::new();
        for cluster in clusters.iter_mut() {
            for file in &cluster.files {
                stamps.insert(file.id.clone(), cluster.fingerprint.clone());
            }
            for file in cluster.files.iter_mut() {
                file.fingerprint = Some(cluster.fingerprint.clone());
            }
            cluster.apply_keep_policy(keep);
        }

        for file in self.registry.files_mut() {
            if let Some(key) = stamps.remove(&file.id) {
                file.fingerprint = Some(key);
            }
        }
    }

    /// Clusters from the cached grouping keys, without re-fingerprinting.
    ///
    /// Keepers are the first member of each cluster.
    #[must_use]
    pub fn duplicate_clusters(&self) -> Vec<DuplicateCluster> {
        bucket_by_key(
            self.registry
                .files()
                .iter()
                .filter_map(|f| f.fingerprint.clone().map(|key| (key, f))),
        )
    }

    /// One file per distinct grouping key, plus every file with no key.
    #[must_use]
    pub fn list_unique(&self) -> Vec<TrackedFile> {
        let mut seen = HashSet::new();
        self.registry
            .files()
            .iter()
            .filter(|f| match f.fingerprint {
                Some(ref key) => seen.insert(key.clone()),
                None => true,
            })
            .cloned()
            .collect()
    }

    /// Drop every non-keeper from the registry.
    ///
    /// Clusters come from the cached grouping keys; nothing is
    /// re-fingerprinted. Returns the remaining files.
    pub fn remove_duplicates(&mut self, policy: KeepPolicy) -> Vec<TrackedFile> {
        let mut doomed = HashSet::new();
        for mut cluster in self.duplicate_clusters() {
            cluster.apply_keep_policy(policy);
            doomed.extend(cluster.duplicates.into_iter().map(|f| f.id));
        }

        if !doomed.is_empty() {
            let before = self.registry.len();
            self.registry.retain(|f| !doomed.contains(&f.id));
            let removed = before - self.registry.len();
            self.removed_total += removed;
            log::info!("Removed {} duplicates (keep {})", removed, policy);
            self.invalidate();
        }

        self.registry.files().to_vec()
    }
}

fn unique_label(used: &mut HashSet<String>, label: String) -> String {
    if used.insert(label.clone()) {
        return label;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{label}#{n}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
