//! CSV output formatter for dedupe reports.
//!
//! One row is generated for each duplicate.
//!
//! # Columns
//!
//! - `group_id`: 1-based index of the decision
//! - `keep_path`: Path that is kept
//! - `duplicate_path`: Path removed in favour of `keep_path`
//! - `size`: Duplicate size in bytes
//! - `location`: `local` or `remote`
//! - `status`: `dry_run`, `failed`, `skipped` (not reached), or how the
//!   duplicate was removed (`trash`, `permanent`, `command`, `remote`,
//!   `already_missing`)
//! - `generated_at`: Report time (RFC 3339)

use std::collections::{HashMap, HashSet};
use std::io;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

use crate::actions::DeleteMethod;
use crate::catalog::Location;
use crate::duplicates::Report;

/// Errors that can occur during CSV output generation.
#[derive(Debug, Error)]
pub enum CsvOutputError {
    /// I/O error during writing.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error during CSV serialization.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

const HEADER: [&str; 7] = [
    "group_id",
    "keep_path",
    "duplicate_path",
    "size",
    "location",
    "status",
    "generated_at",
];

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    group_id: usize,
    keep_path: &'a str,
    duplicate_path: &'a str,
    size: u64,
    location: Location,
    status: &'static str,
    generated_at: &'a str,
}

/// CSV output formatter.
pub struct CsvOutput<'a> {
    report: &'a Report,
}

impl<'a> CsvOutput<'a> {
    /// Create a new CSV output formatter.
    #[must_use]
    pub fn new(report: &'a Report) -> Self {
        Self { report }
    }

    /// Write the CSV output to the given writer.
    ///
    /// # Errors
    ///
    /// Returns `CsvOutputError` if writing or serialization fails.
    pub fn write_to<W: io::Write>(&self, writer: W) -> Result<(), CsvOutputError> {
        let mut csv_writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        csv_writer.write_record(HEADER)?;
        let generated_at = Utc::now().to_rfc3339();
        let failed: HashSet<&str> = self
            .report
            .failed_deletions
            .iter()
            .map(|f| f.path.as_str())
            .collect();
        let removed: HashMap<String, DeleteMethod> = self
            .report
            .removed
            .iter()
            .map(|r| (r.path.to_string_lossy().into_owned(), r.method))
            .collect();

        for (idx, decision) in self.report.decisions.iter().enumerate() {
            for dup in &decision.duplicates {
                let status = if self.report.dry_run {
                    "dry_run"
                } else if failed.contains(dup.path.as_str()) {
                    "failed"
                } else {
                    removed.get(&dup.path).map_or("skipped", |m| method_name(*m))
                };
                csv_writer.serialize(CsvRow {
                    group_id: idx + 1,
                    keep_path: &decision.keep_path,
                    duplicate_path: &dup.path,
                    size: dup.size,
                    location: dup.location,
                    status,
                    generated_at: &generated_at,
                })?;
            }
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Generate CSV output as a string.
    ///
    /// # Errors
    ///
    /// Returns `CsvOutputError` if serialization fails.
    pub fn to_string(&self) -> Result<String, CsvOutputError> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn method_name(method: DeleteMethod) -> &'static str {
    match method {
        DeleteMethod::Trash => "trash",
        DeleteMethod::Permanent => "permanent",
        DeleteMethod::Command => "command",
        DeleteMethod::Remote => "remote",
        DeleteMethod::AlreadyMissing => "already_missing",
    }
}
