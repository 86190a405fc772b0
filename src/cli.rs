//! Command-line interface definitions for mediadedupe.
//!
//! This module defines all CLI arguments, subcommands, and options using the clap derive API.
//! Global options (verbosity, color, error format, config file) apply to every subcommand.
//!
//! # Example
//!
//! ```bash
//! # Preview duplicate songs without removing anything
//! mediadedupe dedupe library.db --audio --dry-run
//!
//! # Byte-identical files, largest first, JSON report
//! mediadedupe dedupe library.db --fs --min-size 10MB --output json
//!
//! # Same title, and only when basenames look alike
//! mediadedupe dedupe library.db --title --basename --min-similarity-ratio 0.9
//!
//! # Show the digests used for verification
//! mediadedupe hash a.mkv b.mkv
//!
//! # Write the effective settings to the config file
//! mediadedupe init-config --force
//! ```

use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::duplicates::Profile;

/// Remove duplicate media from a catalog database.
///
/// mediadedupe groups catalog records by an equivalence profile, picks one
/// file to keep per group, and removes (or hands to a command) the rest.
#[derive(Debug, Parser)]
#[command(name = "mediadedupe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Print errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Find and remove duplicates recorded in a catalog
    Dedupe(DedupeArgs),
    /// Print sample and full digests of files
    Hash(HashArgs),
    /// Write the effective configuration to the config file
    InitConfig(InitConfigArgs),
}

/// Arguments for the dedupe subcommand.
#[derive(Debug, Args)]
#[command(group(
    ArgGroup::new("profile")
        .args(["audio", "extractor_id", "title", "duration", "fs"])
        .multiple(false)
))]
pub struct DedupeArgs {
    /// Catalog database (falls back to `database` in the config file)
    #[arg(value_name = "DATABASE")]
    pub database: Option<PathBuf>,

    /// Same title, artist and album with duration within 8 seconds
    #[arg(long)]
    pub audio: bool,

    /// Same extractor id with duration within 8 seconds
    #[arg(long)]
    pub extractor_id: bool,

    /// Same title with duration within 8 seconds
    #[arg(long)]
    pub title: bool,

    /// Exactly equal duration
    #[arg(long)]
    pub duration: bool,

    /// Byte-identical file content
    #[arg(long)]
    pub fs: bool,

    /// Minimum path similarity (0 to 1) for --basename/--dirname
    #[arg(long, value_name = "RATIO")]
    pub min_similarity_ratio: Option<f64>,

    /// Require similar file names within a group
    #[arg(long)]
    pub basename: bool,

    /// Require similar parent directories within a group
    #[arg(long)]
    pub dirname: bool,

    /// Run this command with each duplicate path instead of removing it
    ///
    /// The string is split on whitespace; the duplicate path and then the
    /// kept path are appended as the last two arguments.
    #[arg(long = "dedupe-cmd", value_name = "CMD")]
    pub dedupe_cmd: Option<String>,

    /// Delete permanently instead of moving to the trash
    #[arg(long)]
    pub no_trash: bool,

    /// Report what would be removed without removing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Number of I/O threads for hashing
    #[arg(long, value_name = "N")]
    pub io_threads: Option<usize>,

    /// Keep-ranking sort key, e.g. `-size` or `time_modified desc`
    ///
    /// Repeatable; earlier keys take priority over later ones.
    #[arg(long = "sort", value_name = "KEY", allow_hyphen_values = true)]
    pub sort: Vec<String>,

    /// Minimum file size to consider (e.g., 1KB, 1MB, 1GB)
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub min_size: Option<u64>,

    /// Maximum file size to consider (e.g., 1KB, 1MB, 1GB)
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub max_size: Option<u64>,

    /// Only consider paths containing this text (repeatable)
    #[arg(long, value_name = "TEXT")]
    pub include: Vec<String>,

    /// Skip paths containing this text (repeatable)
    #[arg(long, value_name = "TEXT")]
    pub exclude: Vec<String>,

    /// Consider at most this many catalog records
    #[arg(long, value_name = "N")]
    pub limit: Option<u64>,

    /// Output format for the report
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Hide progress bars
    #[arg(long)]
    pub no_progress: bool,
}

impl DedupeArgs {
    /// The profile selected by flags, if any.
    #[must_use]
    pub fn profile(&self) -> Option<Profile> {
        if self.audio {
            Some(Profile::MusicIdentity)
        } else if self.extractor_id {
            Some(Profile::ExtractorId)
        } else if self.title {
            Some(Profile::Title)
        } else if self.duration {
            Some(Profile::Duration)
        } else if self.fs {
            Some(Profile::FilesystemContent)
        } else {
            None
        }
    }
}

/// Arguments for the hash subcommand.
#[derive(Debug, Args)]
pub struct HashArgs {
    /// Files to hash
    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<PathBuf>,
}

/// Arguments for the init-config subcommand.
#[derive(Debug, Args)]
pub struct InitConfigArgs {
    /// Overwrite an existing configuration file
    #[arg(long)]
    pub force: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary
    Text,
    /// JSON report for scripting
    Json,
    /// One CSV row per duplicate
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

/// Parse a human-readable size string into bytes.
///
/// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
/// Case-insensitive. Numbers without suffix are treated as bytes.
///
/// # Examples
///
/// ```
/// use mediadedupe::cli::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1KB").unwrap(), 1000);
/// assert_eq!(parse_size("1MiB").unwrap(), 1_048_576);
/// ```
///
/// # Errors
///
/// Returns an error if the string is empty, contains an invalid number,
/// a negative number, or an unknown size suffix.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }
    if s.starts_with('-') {
        return Err("Size cannot be negative".to_string());
    }

    let (num_str, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => (&s[..idx], s[idx..].trim().to_uppercase()),
        None => (s, String::new()),
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "KB" | "K" => 1_000,
        "KIB" => 1_024,
        "MB" | "M" => 1_000_000,
        "MIB" => 1_048_576,
        "GB" | "G" => 1_000_000_000,
        "GIB" => 1_073_741_824,
        "TB" | "T" => 1_000_000_000_000,
        "TIB" => 1_099_511_627_776,
        _ => return Err(format!("Unknown size suffix: '{suffix}'")),
    };

    Ok((num * multiplier as f64) as u64)
}
