//! Output formatters for dedupe reports.
//!
//! - [`TextOutput`]: human-readable summary for the terminal
//! - [`json::JsonOutput`]: JSON for automation and scripting
//! - [`csv::CsvOutput`]: CSV for spreadsheet import
//!
//! # Example
//!
//! ```no_run
//! use mediadedupe::catalog::SqliteCatalog;
//! use mediadedupe::duplicates::{DedupeEngine, Profile, RunOptions};
//! use mediadedupe::output::json::JsonOutput;
//! use std::path::Path;
//!
//! let catalog = SqliteCatalog::open(Path::new("media.db")).unwrap();
//! let report = DedupeEngine::new(RunOptions::new(Profile::Duration).with_dry_run(true))
//!     .run(&catalog)
//!     .unwrap();
//! println!("{}", JsonOutput::new(&report).to_json_pretty().unwrap());
//! ```

pub mod csv;
pub mod json;

use std::io::{self, Write};

use bytesize::ByteSize;
use yansi::Paint;

use crate::duplicates::Report;

pub use self::csv::CsvOutput;
pub use self::json::JsonOutput;

/// Plain-text report.
pub struct TextOutput<'a> {
    report: &'a Report,
}

impl<'a> TextOutput<'a> {
    /// Create a text formatter.
    #[must_use]
    pub fn new(report: &'a Report) -> Self {
        Self { report }
    }

    /// Write every decision followed by a summary.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let report = self.report;
        let verb = if report.dry_run { "would remove" } else { "remove" };

        for decision in &report.decisions {
            writeln!(
                writer,
                "{} {} ({})",
                "keep".green().bold(),
                decision.keep_path,
                ByteSize::b(decision.reclaimable_bytes())
            )?;
            for dup in &decision.duplicates {
                let marker = if dup.location.is_remote() {
                    " [remote]"
                } else {
                    ""
                };
                writeln!(writer, "  {} {}{marker}", verb.red(), dup.path)?;
            }
        }

        if !report.decisions.is_empty() {
            writeln!(writer)?;
        }
        self.write_summary(writer)
    }

    fn write_summary<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let report = self.report;
        writeln!(
            writer,
            "Profile {}: {} candidate groups, {} verified",
            report.profile.name().bold(),
            report.candidate_groups,
            report.verified_groups
        )?;
        writeln!(
            writer,
            "{} duplicates in {} groups, {} reclaimable",
            report.duplicate_count().yellow(),
            report.decisions.len(),
            ByteSize::b(report.reclaimable_bytes).yellow()
        )?;

        if report.dry_run {
            writeln!(writer, "{}", "Dry run: nothing was removed".cyan())?;
        } else {
            writeln!(writer, "Removed {}", report.deleted_files.green())?;
        }
        for failure in &report.failed_deletions {
            writeln!(
                writer,
                "{} {}: {}",
                "failed".red().bold(),
                failure.path,
                failure.message
            )?;
        }
        if report.interrupted {
            writeln!(writer, "{}", "Interrupted before all duplicates were handled".red())?;
        }
        Ok(())
    }

    /// Render to a string.
    #[must_use]
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        // Writing to a Vec cannot fail.
        let _ = self.write_to(&mut buffer);
        String::from_utf8_lossy(&buffer).into_owned()
    }
}
