//! Progress and error reporting.
//!
//! This module provides:
//! - [`ProgressSink`] and [`ErrorSink`], the callbacks a detection run
//!   reports through
//! - [`ProgressReporter`], the single reporting point that keeps
//!   percentages monotonic when files are fingerprinted in parallel
//! - [`Progress`], an indicatif progress bar implementing [`ProgressSink`]
//!
//! # Milestones
//!
//! A detection run reports 10% at start, interpolates per file between the
//! strategy milestone and 90%, reports 90% before analysis and 100% when
//! done. An empty registry only reports 100%.

use std::error::Error;
use std::sync::{Arc, Mutex, MutexGuard};

use indicatif::{ProgressBar, ProgressStyle};

use crate::registry::TrackedFile;

/// Receives `(percent, status message)` updates.
///
/// Implement this trait to follow a detection run. Closures taking
/// `(u8, &str)` implement it automatically.
pub trait ProgressSink: Send + Sync {
    /// Called with a percentage in `0..=100` and a status message.
    fn on_progress(&self, percent: u8, message: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(u8, &str) + Send + Sync,
{
    fn on_progress(&self, percent: u8, message: &str) {
        self(percent, message);
    }
}

/// Receives non-fatal errors, with the offending file when there is one.
pub trait ErrorSink: Send + Sync {
    /// Called once per recorded error.
    fn on_error(&self, error: &(dyn Error + Send + Sync + 'static), file: Option<&TrackedFile>);
}

impl<F> ErrorSink for F
where
    F: Fn(&(dyn Error + Send + Sync + 'static), Option<&TrackedFile>) + Send + Sync,
{
    fn on_error(&self, error: &(dyn Error + Send + Sync + 'static), file: Option<&TrackedFile>) {
        self(error, file);
    }
}

#[derive(Debug, Default)]
struct ReporterState {
    last_percent: u8,
    done: usize,
}

/// Serialises progress notifications for one detection run.
///
/// Percentages never decrease as observed by the sink, whatever order
/// worker threads finish in.
pub struct ProgressReporter {
    sink: Option<Arc<dyn ProgressSink>>,
    total: usize,
    start: u8,
    end: u8,
    state: Mutex<ReporterState>,
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("sink", &self.sink.as_ref().map(|_| "<sink>"))
            .field("total", &self.total)
            .field("start", &self.start)
            .field("end", &self.end)
            .finish()
    }
}

impl ProgressReporter {
    /// Reporter for a run over `total` files, interpolating 10–90%.
    #[must_use]
    pub fn new(sink: Option<Arc<dyn ProgressSink>>, total: usize) -> Self {
        Self {
            sink,
            total,
            start: 10,
            end: 90,
            state: Mutex::new(ReporterState::default()),
        }
    }

    /// Interpolate per-file progress between `start` and `end` instead.
    #[must_use]
    pub fn with_file_range(mut self, start: u8, end: u8) -> Self {
        self.start = start.min(100);
        self.end = end.clamp(self.start, 100);
        self
    }

    fn lock(&self) -> MutexGuard<'_, ReporterState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn emit_locked(&self, state: &mut ReporterState, percent: u8, message: &str) {
        let percent = percent.min(100).max(state.last_percent);
        state.last_percent = percent;
        if let Some(ref sink) = self.sink {
            sink.on_progress(percent, message);
        }
    }

    /// Report a milestone. Lower values than already reported are raised.
    pub fn emit(&self, percent: u8, message: &str) {
        let mut state = self.lock();
        self.emit_locked(&mut state, percent, message);
    }

    /// Record one finished file and report the interpolated percentage.
    pub fn file_done(&self, name: &str) {
        let mut state = self.lock();
        state.done += 1;
        let span = usize::from(self.end - self.start);
        let step = span * state.done / self.total.max(1);
        let percent = self.start + u8::try_from(step.min(span)).unwrap_or(self.end - self.start);
        let message = format!(
            "Fingerprinting {} ({}/{})",
            truncate_name(name, 40),
            state.done,
            self.total
        );
        self.emit_locked(&mut state, percent, &message);
    }

    /// Highest percentage reported so far.
    #[must_use]
    pub fn last_percent(&self) -> u8 {
        self.lock().last_percent
    }
}

/// Terminal progress bar using indicatif.
///
/// Shows a single 0–100 bar for the whole detection run. Nothing is drawn
/// in quiet mode.
pub struct Progress {
    bar: Option<ProgressBar>,
}

impl Progress {
    /// Create a new progress bar.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, no progress bar will be displayed.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdfdupe::progress::Progress;
    ///
    /// let progress = Progress::new(true);
    /// assert!(progress.is_hidden());
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        if quiet {
            return Self { bar: None };
        }
        let bar = ProgressBar::new(100);
        bar.set_style(Self::style());
        Self { bar: Some(bar) }
    }

    /// Whether this progress bar draws nothing.
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.bar.is_none()
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█>-")
    }
}

impl ProgressSink for Progress {
    fn on_progress(&self, percent: u8, message: &str) {
        let Some(ref bar) = self.bar else {
            return;
        };
        bar.set_position(u64::from(percent));
        if percent >= 100 {
            bar.finish_with_message(message.to_string());
        } else {
            bar.set_message(message.to_string());
        }
    }
}

/// Shorten a file name for display, keeping its tail.
fn truncate_name(name: &str, max_len: usize) -> String {
    let count = name.chars().count();
    if count <= max_len {
        return name.to_string();
    }
    let tail: String = name.chars().skip(count - (max_len - 3)).collect();
    format!("...{tail}")
}
