//! Exit codes and structured error output.

use serde::Serialize;

use crate::duplicates::{DetectError, DetectionOutcome};

/// Process exit codes.
///
/// - 0: Detection completed and duplicates were found
/// - 1: General error (bad arguments, unreadable input, invalid options)
/// - 2: Detection completed, no duplicates
/// - 3: Detection completed with non-fatal per-file errors
/// - 130: Interrupted by Ctrl+C
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Duplicates were found.
    Success = 0,
    /// An unexpected error occurred.
    GeneralError = 1,
    /// No duplicates were found.
    NoDuplicates = 2,
    /// Some files could not be fingerprinted.
    PartialSuccess = 3,
    /// Cancelled by the user.
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "PD000",
            Self::GeneralError => "PD001",
            Self::NoDuplicates => "PD002",
            Self::PartialSuccess => "PD003",
            Self::Interrupted => "PD130",
        }
    }

    /// Exit code for a completed run.
    ///
    /// Non-fatal errors take precedence over the duplicate count.
    #[must_use]
    pub fn from_outcome(outcome: &DetectionOutcome) -> Self {
        if !outcome.errors.is_empty() {
            Self::PartialSuccess
        } else if outcome.has_duplicates() {
            Self::Success
        } else {
            Self::NoDuplicates
        }
    }

    /// Exit code for a failed run.
    #[must_use]
    pub fn from_error(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<DetectError>() {
            Some(DetectError::Cancelled { .. }) => Self::Interrupted,
            _ => Self::GeneralError,
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "PD001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message, including context
    pub message: String,
    /// Whether the run was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duplicates::{DetectOptions, DetectionEngine, StrategyKind};
    use crate::registry::RawFile;
    use anyhow::Context;

    fn outcome_for(contents: &[&[u8]]) -> DetectionOutcome {
        let mut engine = DetectionEngine::new();
        engine.register(
            contents
                .iter()
                .enumerate()
                .map(|(i, c)| RawFile::new(format!("{i}.pdf"), c.to_vec())),
        );
        engine
            .detect(&DetectOptions::default().with_strategy(StrategyKind::ByteExact))
            .unwrap()
    }

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Success.as_i32(), 0);
        assert_eq!(ExitCode::GeneralError.as_i32(), 1);
        assert_eq!(ExitCode::NoDuplicates.as_i32(), 2);
        assert_eq!(ExitCode::PartialSuccess.as_i32(), 3);
        assert_eq!(ExitCode::Interrupted.as_i32(), 130);
    }

    #[test]
    fn test_from_outcome() {
        assert_eq!(ExitCode::from_outcome(&outcome_for(&[b"x", b"x"])), ExitCode::Success);
        assert_eq!(
            ExitCode::from_outcome(&outcome_for(&[b"x", b"y"])),
            ExitCode::NoDuplicates
        );

        let mut outcome = outcome_for(&[b"x", b"x"]);
        outcome.errors.push("bad.pdf: too large".into());
        assert_eq!(ExitCode::from_outcome(&outcome), ExitCode::PartialSuccess);
    }

    #[test]
    fn test_from_error() {
        let cancelled: anyhow::Error = DetectError::Cancelled {
            processed: 1,
            total: 2,
        }
        .into();
        assert_eq!(ExitCode::from_error(&cancelled), ExitCode::Interrupted);

        let wrapped = Err::<(), _>(DetectError::Cancelled {
            processed: 0,
            total: 2,
        })
        .context("Detection failed")
        .unwrap_err();
        assert_eq!(ExitCode::from_error(&wrapped), ExitCode::Interrupted);

        let other = anyhow::anyhow!("boom");
        assert_eq!(ExitCode::from_error(&other), ExitCode::GeneralError);
    }

    #[test]
    fn test_structured_error() {
        let err = Err::<(), _>(DetectError::InvalidThreadCount)
            .context("Invalid options")
            .unwrap_err();
        let structured = StructuredError::new(&err, ExitCode::GeneralError);

        assert_eq!(structured.code, "PD001");
        assert_eq!(structured.exit_code, 1);
        assert_eq!(
            structured.message,
            "Invalid options: Thread count must be at least 1"
        );
        assert!(!structured.interrupted);
    }
}
