//! Human-readable report.
//!
//! One block per duplicate cluster (keeper first, marked), followed by a
//! summary line. Colours come from yansi and are switched off globally
//! with `--no-color`.

use std::io::Write;

use bytesize::ByteSize;
use yansi::Paint;

use crate::duplicates::{DetectionOutcome, DuplicateCluster};
use crate::registry::TrackedFile;

/// Length of the fingerprint prefix shown per cluster.
const FINGERPRINT_PREVIEW: usize = 16;

/// Text report over a detection outcome.
#[derive(Debug, Clone)]
pub struct TextOutput<'a> {
    outcome: &'a DetectionOutcome,
    remaining: Option<&'a [TrackedFile]>,
}

impl<'a> TextOutput<'a> {
    /// Create a text report.
    #[must_use]
    pub fn new(outcome: &'a DetectionOutcome) -> Self {
        Self {
            outcome,
            remaining: None,
        }
    }

    /// Also list the files left after removal.
    #[must_use]
    pub fn with_remaining(mut self, files: &'a [TrackedFile]) -> Self {
        self.remaining = Some(files);
        self
    }

    /// Write the report.
    ///
    /// # Errors
    ///
    /// Returns any error from the writer.
    pub fn write_to<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        for (index, cluster) in self.outcome.duplicate_groups.iter().enumerate() {
            write_cluster(w, index + 1, cluster)?;
        }

        for error in &self.outcome.errors {
            writeln!(w, "{} {}", "warning:".yellow().bold(), error)?;
        }

        if let Some(remaining) = self.remaining {
            writeln!(w, "{}", "Remaining files:".bold())?;
            for file in remaining {
                writeln!(w, "  {} ({})", file.name, ByteSize::b(file.size))?;
            }
        }

        self.write_summary(w)
    }

    fn write_summary<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        let o = self.outcome;
        let method = match o.threshold {
            Some(t) => format!("{} @ {t}", o.method),
            None => o.method.to_string(),
        };

        if o.has_duplicates() {
            writeln!(
                w,
                "{} {} duplicates in {} groups among {} files ({} unique, {} reclaimable) [{}, {}ms]",
                "Found".green().bold(),
                o.duplicates_found,
                o.duplicate_groups.len(),
                o.total_files,
                o.unique_files,
                ByteSize::b(o.wasted_space()),
                method,
                o.processing_time_ms
            )?;
        } else {
            writeln!(
                w,
                "{} among {} files [{}, {}ms]",
                "No duplicates".green(),
                o.total_files,
                method,
                o.processing_time_ms
            )?;
        }

        if o.duplicates_removed > 0 {
            writeln!(w, "Removed {} duplicates from the set", o.duplicates_removed)?;
        }
        Ok(())
    }

    /// Render the report to a string.
    #[must_use]
    pub fn render(&self) -> String {
        let mut buf = Vec::new();
        // Writing to a Vec cannot fail
        let _ = self.write_to(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

fn write_cluster<W: Write>(w: &mut W, number: usize, cluster: &DuplicateCluster) -> std::io::Result<()> {
    let preview: String = cluster.fingerprint.chars().take(FINGERPRINT_PREVIEW).collect();
    writeln!(
        w,
        "{} {} ({} files, {} wasted)",
        format!("Group {number}").cyan().bold(),
        preview.dim(),
        cluster.len(),
        ByteSize::b(cluster.wasted_space())
    )?;

    writeln!(
        w,
        "  {} {} ({})",
        "keep".green(),
        cluster.keep_file.name,
        ByteSize::b(cluster.keep_file.size)
    )?;
    for dup in &cluster.duplicates {
        writeln!(w, "  {} {} ({})", "dupe".red(), dup.name, ByteSize::b(dup.size))?;
    }
    Ok(())
}
