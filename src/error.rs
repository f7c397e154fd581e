//! Exit codes and structured error output.

use serde::Serialize;

use crate::dedupe::DedupeRunError;

/// Process exit codes.
///
/// - 0: Success
/// - 1: General error (unexpected failure, catalog unavailable)
/// - 2: Pre-flight failed; nothing was changed
/// - 3: Partial success (the run finished but recorded per-file errors)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    PreflightFailed = 2,
    PartialSuccess = 3,
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
            Self::Success => "DG000",
            Self::GeneralError => "DG001",
            Self::PreflightFailed => "DG002",
            Self::PartialSuccess => "DG003",
        }
    }

    /// Exit code for an error that ended the run.
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<DedupeRunError>() {
            Some(DedupeRunError::Preflight(_)) => Self::PreflightFailed,
            _ => Self::GeneralError,
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "DG001")
    pub code: String,
    pub exit_code: i32,
    /// Human-readable message including the cause chain
    pub message: String,
}

impl StructuredError {
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedupe::PreflightError;

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Success.as_i32(), 0);
        assert_eq!(ExitCode::GeneralError.as_i32(), 1);
        assert_eq!(ExitCode::PreflightFailed.as_i32(), 2);
        assert_eq!(ExitCode::PartialSuccess.as_i32(), 3);
        assert_eq!(ExitCode::PartialSuccess.code_prefix(), "DG003");
    }

    #[test]
    fn test_preflight_maps_to_its_own_code() {
        let err = anyhow::Error::new(DedupeRunError::Preflight(
            PreflightError::InsufficientSpace {
                available: 1,
                required: 2,
            },
        ))
        .context("deduplication aborted");
        assert_eq!(ExitCode::for_error(&err), ExitCode::PreflightFailed);
        assert_eq!(
            ExitCode::for_error(&anyhow::anyhow!("boom")),
            ExitCode::GeneralError
        );
    }

    #[test]
    fn test_structured_error_json() {
        let err = anyhow::anyhow!("catalog locked").context("scan failed");
        let structured = StructuredError::new(&err, ExitCode::GeneralError);
        let json = serde_json::to_string(&structured).unwrap();
        assert!(json.contains("\"code\":\"DG001\""));
        assert!(json.contains("scan failed: catalog locked"));
    }
}
