//! JSON report for scripting.
//!
//! The report is the detection outcome itself, with the exit code and
//! (after `--remove`) the retained files appended:
//!
//! ```json
//! {
//!   "totalFiles": 3,
//!   "uniqueFiles": 2,
//!   "duplicateGroups": [
//!     { "fingerprint": "…", "files": [...], "keepFile": {...}, "duplicates": [...] }
//!   ],
//!   "duplicatesFound": 1,
//!   "duplicatesRemoved": 0,
//!   "processingTimeMs": 4,
//!   "errors": [],
//!   "method": "combined",
//!   "exitCode": 0,
//!   "exitCodeName": "PD000"
//! }
//! ```

use std::io::Write;

use serde::Serialize;

use crate::duplicates::DetectionOutcome;
use crate::error::ExitCode;
use crate::registry::TrackedFile;

/// Complete JSON output structure.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonOutput<'a> {
    /// The detection outcome, inlined
    #[serde(flatten)]
    pub outcome: &'a DetectionOutcome,
    /// Files left after removing duplicates, when removal ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_files: Option<&'a [TrackedFile]>,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "PD000")
    pub exit_code_name: &'static str,
}

impl<'a> JsonOutput<'a> {
    /// Create a JSON report for an outcome and exit code.
    #[must_use]
    pub fn new(outcome: &'a DetectionOutcome, exit_code: ExitCode) -> Self {
        Self {
            outcome,
            remaining_files: None,
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix(),
        }
    }

    /// Include the files that remain after removal.
    #[must_use]
    pub fn with_remaining(mut self, files: &'a [TrackedFile]) -> Self {
        self.remaining_files = Some(files);
        self
    }

    /// Serialize to compact JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty-printed JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write pretty-printed JSON followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        serde_json::to_writer_pretty(&mut *writer, self)?;
        writeln!(writer)
    }
}
