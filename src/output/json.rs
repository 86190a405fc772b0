//! JSON output formatter for dedupe reports.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "decisions": [
//!     {
//!       "keep_path": "/music/a.flac",
//!       "reclaimable_bytes": 4096,
//!       "duplicates": [
//!         { "path": "/music/copy/a.flac", "size": 4096, "location": "local" }
//!       ]
//!     }
//!   ],
//!   "summary": {
//!     "profile": "music_identity",
//!     "dry_run": true,
//!     "candidate_groups": 1,
//!     "verified_groups": 1,
//!     "duplicate_files": 1,
//!     "deleted_files": 0,
//!     "removed": [],
//!     "failed_deletions": [],
//!     "reclaimable_bytes": 4096,
//!     "interrupted": false,
//!     "exit_code": 0,
//!     "exit_code_name": "MD000",
//!     "generated_at": "2024-01-01T00:00:00+00:00"
//!   }
//! }
//! ```

use std::io::Write;

use chrono::Utc;
use serde::Serialize;

use crate::actions::{DeleteFailure, DeleteResult};
use crate::duplicates::{DuplicateDecision, DuplicateEntry, Report};

/// One decision in JSON form.
#[derive(Debug, Clone, Serialize)]
pub struct JsonDecision {
    /// Path that is kept
    pub keep_path: String,
    /// Bytes freed by removing the duplicates
    pub reclaimable_bytes: u64,
    /// Paths removed in favour of `keep_path`
    pub duplicates: Vec<DuplicateEntry>,
}

impl From<&DuplicateDecision> for JsonDecision {
    fn from(decision: &DuplicateDecision) -> Self {
        Self {
            keep_path: decision.keep_path.clone(),
            reclaimable_bytes: decision.reclaimable_bytes(),
            duplicates: decision.duplicates.clone(),
        }
    }
}

/// Run statistics in JSON form.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    /// Profile name
    pub profile: &'static str,
    /// Whether nothing was removed
    pub dry_run: bool,
    /// Groups found by profile matching
    pub candidate_groups: usize,
    /// Groups that survived verification
    pub verified_groups: usize,
    /// Duplicates across all decisions
    pub duplicate_files: usize,
    /// Duplicates removed and marked deleted
    pub deleted_files: usize,
    /// How each removed duplicate was handled
    pub removed: Vec<DeleteResult>,
    /// Removals that failed
    pub failed_deletions: Vec<DeleteFailure>,
    /// Bytes freed if every decision is applied
    pub reclaimable_bytes: u64,
    /// Whether deletion stopped on Ctrl+C
    pub interrupted: bool,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "MD000")
    pub exit_code_name: &'static str,
    /// Report time (RFC 3339)
    pub generated_at: String,
}

impl JsonSummary {
    /// Summarize a report.
    #[must_use]
    pub fn from_report(report: &Report) -> Self {
        let exit_code = report.exit_code();
        Self {
            profile: report.profile.name(),
            dry_run: report.dry_run,
            candidate_groups: report.candidate_groups,
            verified_groups: report.verified_groups,
            duplicate_files: report.duplicate_count(),
            deleted_files: report.deleted_files,
            removed: report.removed.clone(),
            failed_deletions: report.failed_deletions.clone(),
            reclaimable_bytes: report.reclaimable_bytes,
            interrupted: report.interrupted,
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix(),
            generated_at: Utc::now().to_rfc3339(),
        }
    }
}

/// Complete JSON output structure.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput {
    /// Decisions, largest reclaimable first
    pub decisions: Vec<JsonDecision>,
    /// Run statistics
    pub summary: JsonSummary,
}

impl JsonOutput {
    /// Build the JSON view of a report.
    #[must_use]
    pub fn new(report: &Report) -> Self {
        Self {
            decisions: report.decisions.iter().map(JsonDecision::from).collect(),
            summary: JsonSummary::from_report(report),
        }
    }

    /// Serialize to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write JSON followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        let json = if pretty {
            self.to_json_pretty()?
        } else {
            serde_json::to_string(self)?
        };
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error during JSON generation: {0}")]
    Io(#[from] std::io::Error),
}
