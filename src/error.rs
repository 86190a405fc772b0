//! Exit codes, structured errors and configuration errors.

use serde::Serialize;

/// Process exit codes.
///
/// - 0: Success (run completed, duplicates found)
/// - 1: General error (unexpected failure)
/// - 2: No duplicates found
/// - 3: Partial success (some duplicates could not be removed)
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: run completed and duplicates were found.
    Success = 0,
    /// General error: an unexpected error occurred.
    GeneralError = 1,
    /// No duplicates: run completed but nothing matched.
    NoDuplicates = 2,
    /// Partial success: some removals failed.
    PartialSuccess = 3,
    /// Interrupted: run was interrupted by user (Ctrl+C).
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
            Self::Success => "MD000",
            Self::GeneralError => "MD001",
            Self::NoDuplicates => "MD002",
            Self::PartialSuccess => "MD003",
            Self::Interrupted => "MD130",
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "MD001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
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

/// Invalid run configuration, detected before any work starts.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// No equivalence profile was selected.
    #[error("no dedupe profile selected (use --audio, --extractor-id, --title, --duration or --fs)")]
    NoProfile,

    /// The similarity ratio is not a number in `[0, 1]`.
    #[error("minimum similarity ratio must be between 0 and 1, got {0}")]
    InvalidRatio(f64),

    /// The hashing pool needs at least one thread.
    #[error("io_threads must be at least 1")]
    ZeroIoThreads,

    /// A dedupe command was given but has no program.
    #[error("dedupe command is empty")]
    EmptyDedupeCommand,

    /// A sort key names an unknown column.
    #[error("unknown sort column '{column}'{}", did_you_mean(.suggestion))]
    UnknownSortColumn {
        /// The column as written
        column: String,
        /// Closest known column, if any is close
        suggestion: Option<String>,
    },

    /// A sort key could not be parsed.
    #[error("invalid sort key '{0}' (expected 'column', 'column asc', 'column desc' or '-column')")]
    InvalidSortKey(String),
}

fn did_you_mean(suggestion: &Option<String>) -> String {
    suggestion
        .as_ref()
        .map(|s| format!(" (did you mean '{s}'?)"))
        .unwrap_or_default()
}
