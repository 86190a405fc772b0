//! Removal of duplicates and catalog bookkeeping.
//!
//! # Overview
//!
//! [`DeletionExecutor`] applies [`DuplicateDecision`]s. Each duplicate is
//! removed by one of three methods:
//!
//! - a user-supplied dedupe command, run as `cmd args.. <duplicate> <keep>`
//! - the system trash (default, recoverable)
//! - permanent removal (only with `use_trash = false`)
//!
//! Every removal that succeeds, and every duplicate that is already gone, is
//! marked deleted in the catalog. Remote duplicates are never touched on
//! disk; they are only marked.
//!
//! # Safety
//!
//! A decision's keep path is never removed. A local removal failure leaves
//! the catalog untouched for that path and the run carries on; a catalog
//! failure aborts.
//!
//! # Example
//!
//! ```no_run
//! use mediadedupe::actions::delete::delete_to_trash;
//! use std::path::PathBuf;
//!
//! let path = PathBuf::from("/path/to/duplicate.mkv");
//! match delete_to_trash(&path) {
//!     Ok(result) => println!("Deleted: {}", result.path.display()),
//!     Err(e) => eprintln!("Failed: {}", e),
//! }
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::catalog::{local_path, Catalog, CatalogError};
use crate::duplicates::{DuplicateDecision, DuplicateEntry};
use crate::progress::ProgressCallback;

/// Error type for deletion operations.
#[derive(Debug, Error)]
pub enum DeleteError {
    /// File was not found (may have been deleted or moved).
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// Permission denied when attempting to delete.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Trash operation failed.
    #[error("trash operation failed for {path}: {message}")]
    TrashFailed {
        /// Path that could not be trashed
        path: PathBuf,
        /// Reason reported by the trash backend
        message: String,
    },

    /// Permanent delete operation failed.
    #[error("permanent delete failed for {path}: {message}")]
    PermanentDeleteFailed {
        /// Path that could not be removed
        path: PathBuf,
        /// Reason reported by the OS
        message: String,
    },

    /// The dedupe command could not be run or exited unsuccessfully.
    #[error("dedupe command failed for {path}: {message}")]
    CommandFailed {
        /// Duplicate the command was run for
        path: PathBuf,
        /// Spawn error or exit status
        message: String,
    },

    /// A decision asked to delete its own keep path.
    #[error("refusing to delete keep path {0}")]
    KeepProtected(PathBuf),

    /// General I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Marking a record deleted failed; the run must stop.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl DeleteError {
    fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }

    /// Get the path associated with this error (if any).
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::NotFound(p)
            | Self::PermissionDenied(p)
            | Self::KeepProtected(p)
            | Self::TrashFailed { path: p, .. }
            | Self::PermanentDeleteFailed { path: p, .. }
            | Self::CommandFailed { path: p, .. }
            | Self::Io { path: p, .. } => Some(p),
            Self::Catalog(_) => None,
        }
    }
}

/// How a duplicate is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteMethod {
    /// Moved to the system trash
    Trash,
    /// Removed permanently
    Permanent,
    /// Handed to the dedupe command
    Command,
    /// Remote record, only marked deleted
    Remote,
    /// Already gone from disk, only marked deleted
    AlreadyMissing,
}

/// Result of one successful deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteResult {
    /// Path that was deleted.
    pub path: PathBuf,
    /// Size of the deleted file in bytes.
    pub size: u64,
    /// How it was removed.
    pub method: DeleteMethod,
}

impl DeleteResult {
    /// Create a new delete result.
    #[must_use]
    pub fn new(path: PathBuf, size: u64, method: DeleteMethod) -> Self {
        Self { path, size, method }
    }
}

/// A duplicate that could not be removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteFailure {
    /// Path of the duplicate
    pub path: String,
    /// Error description
    pub message: String,
}

/// Outcome of applying a batch of decisions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionSummary {
    /// Duplicates removed (or marked) successfully.
    pub deleted: Vec<DeleteResult>,
    /// Duplicates that could not be removed.
    pub failures: Vec<DeleteFailure>,
    /// Total bytes freed.
    pub bytes_freed: u64,
    /// Duplicates that a dry run would have removed.
    pub dry_run_skipped: usize,
    /// Whether shutdown stopped the batch early.
    pub interrupted: bool,
}

impl DeletionSummary {
    /// Number of successful deletions.
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.deleted.len()
    }

    /// Number of failed deletions.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Check if all deletions succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// Human-readable summary of the operation.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.all_succeeded() {
            format!(
                "Deleted {} file(s), freed {} bytes",
                self.success_count(),
                self.bytes_freed
            )
        } else {
            format!(
                "Deleted {} file(s), {} failed, freed {} bytes",
                self.success_count(),
                self.failure_count(),
                self.bytes_freed
            )
        }
    }
}

/// Configuration for deletion.
#[derive(Clone)]
pub struct DeleteConfig {
    /// Command and leading arguments; duplicate and keep are appended.
    pub dedupe_command: Option<Vec<String>>,
    /// Move to trash instead of removing permanently.
    pub use_trash: bool,
    /// Log what would happen without changing anything.
    pub dry_run: bool,
    /// Optional shutdown flag, checked between decisions.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for DeleteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeleteConfig")
            .field("dedupe_command", &self.dedupe_command)
            .field("use_trash", &self.use_trash)
            .field("dry_run", &self.dry_run)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "ProgressCallback"),
            )
            .finish()
    }
}

impl Default for DeleteConfig {
    fn default() -> Self {
        Self {
            dedupe_command: None,
            use_trash: true,
            dry_run: false,
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl DeleteConfig {
    /// Create config for trash deletion.
    #[must_use]
    pub fn trash() -> Self {
        Self::default()
    }

    /// Create config for permanent deletion.
    #[must_use]
    pub fn permanent() -> Self {
        Self {
            use_trash: false,
            ..Self::default()
        }
    }

    /// Use a dedupe command, split on whitespace.
    #[must_use]
    pub fn with_dedupe_command(mut self, command: &str) -> Self {
        self.dedupe_command = Some(split_command(command));
        self
    }

    /// Enable/disable dry run.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set the shutdown flag.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Split a dedupe command string into program and arguments.
#[must_use]
pub fn split_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(str::to_string).collect()
}

fn file_size(path: &Path) -> Result<u64, DeleteError> {
    fs::symlink_metadata(path)
        .map(|m| m.len())
        .map_err(|e| DeleteError::from_io(path, e))
}

/// Delete a single file to the system trash.
///
/// # Errors
///
/// - `NotFound` if the file doesn't exist
/// - `PermissionDenied` if the file can't be accessed
/// - `TrashFailed` if the trash operation fails
pub fn delete_to_trash(path: &Path) -> Result<DeleteResult, DeleteError> {
    let size = file_size(path)?;

    trash::delete(path).map_err(|e| DeleteError::TrashFailed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    log::info!("Moved to trash: {} ({} bytes)", path.display(), size);
    Ok(DeleteResult::new(path.to_path_buf(), size, DeleteMethod::Trash))
}

/// Permanently delete a single file.
///
/// **WARNING**: This operation cannot be undone.
///
/// # Errors
///
/// - `NotFound` if the file doesn't exist
/// - `PermissionDenied` if the file can't be accessed
/// - `PermanentDeleteFailed` if the delete operation fails
pub fn permanent_delete(path: &Path) -> Result<DeleteResult, DeleteError> {
    let size = file_size(path)?;

    fs::remove_file(path).map_err(|e| DeleteError::PermanentDeleteFailed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    log::info!("Permanently deleted: {} ({} bytes)", path.display(), size);
    Ok(DeleteResult::new(path.to_path_buf(), size, DeleteMethod::Permanent))
}

/// Run the dedupe command as `command.. <duplicate> <keep>`.
///
/// The command is responsible for the duplicate; success is judged by its
/// exit status.
///
/// # Errors
///
/// - `NotFound` if the duplicate doesn't exist
/// - `CommandFailed` if the command can't be spawned or exits non-zero
pub fn run_dedupe_command(
    command: &[String],
    duplicate: &Path,
    keep: &Path,
) -> Result<DeleteResult, DeleteError> {
    let size = file_size(duplicate)?;
    let Some((program, args)) = command.split_first() else {
        return Err(DeleteError::CommandFailed {
            path: duplicate.to_path_buf(),
            message: "empty command".to_string(),
        });
    };

    let status = Command::new(program)
        .args(args)
        .arg(duplicate)
        .arg(keep)
        .status()
        .map_err(|e| DeleteError::CommandFailed {
            path: duplicate.to_path_buf(),
            message: format!("could not run {program}: {e}"),
        })?;

    if !status.success() {
        return Err(DeleteError::CommandFailed {
            path: duplicate.to_path_buf(),
            message: format!("{program} exited with {status}"),
        });
    }

    log::info!(
        "Dedupe command handled {} (keeping {})",
        duplicate.display(),
        keep.display()
    );
    Ok(DeleteResult::new(duplicate.to_path_buf(), size, DeleteMethod::Command))
}

/// Applies decisions to disk and catalog.
#[derive(Debug)]
pub struct DeletionExecutor<'a, C: Catalog> {
    catalog: &'a C,
    config: DeleteConfig,
}

impl<'a, C: Catalog> DeletionExecutor<'a, C> {
    /// Create an executor writing through `catalog`.
    #[must_use]
    pub fn new(catalog: &'a C, config: DeleteConfig) -> Self {
        Self { catalog, config }
    }

    /// Apply every decision in order.
    ///
    /// # Errors
    ///
    /// Returns `DeleteError::Catalog` if marking a record deleted fails.
    /// Decisions applied before the failure stay committed.
    pub fn execute(&self, decisions: &[DuplicateDecision]) -> Result<DeletionSummary, DeleteError> {
        let mut summary = DeletionSummary::default();
        let total: usize = decisions.iter().map(DuplicateDecision::duplicate_count).sum();

        if total == 0 {
            return Ok(summary);
        }

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start("delete", total);
        }
        log::info!(
            "{} {} duplicate(s) across {} group(s)",
            if self.config.dry_run { "Dry run: would remove" } else { "Removing" },
            total,
            decisions.len()
        );

        let mut done = 0;
        for decision in decisions {
            if self.config.is_shutdown_requested() {
                log::info!("Deletion interrupted by shutdown signal");
                summary.interrupted = true;
                break;
            }

            for dup in &decision.duplicates {
                done += 1;
                if let Some(ref callback) = self.config.progress_callback {
                    callback.on_progress(done, &dup.path);
                }
                self.apply_one(&decision.keep_path, dup, &mut summary)?;
            }
        }

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end("delete");
        }
        log::info!("{}", summary.summary());

        Ok(summary)
    }

    fn apply_one(
        &self,
        keep_path: &str,
        dup: &DuplicateEntry,
        summary: &mut DeletionSummary,
    ) -> Result<(), DeleteError> {
        let aliases_keep =
            !dup.location.is_remote() && local_path(&dup.path) == local_path(keep_path);
        if dup.path == keep_path || aliases_keep {
            let err = DeleteError::KeepProtected(PathBuf::from(keep_path));
            log::error!("{}", err);
            summary.failures.push(DeleteFailure {
                path: dup.path.clone(),
                message: err.to_string(),
            });
            return Ok(());
        }

        if self.config.dry_run {
            log::info!("Would delete {} (keeping {})", dup.path, keep_path);
            summary.dry_run_skipped += 1;
            return Ok(());
        }

        let result = if dup.location.is_remote() {
            log::debug!("Remote duplicate, marking only: {}", dup.path);
            Ok(DeleteResult::new(PathBuf::from(&dup.path), 0, DeleteMethod::Remote))
        } else {
            self.remove_local(&local_path(&dup.path), &local_path(keep_path))
        };

        let mut result = match result {
            Ok(result) => result,
            Err(DeleteError::NotFound(path)) => {
                log::warn!("Duplicate already missing, marking deleted: {}", path.display());
                DeleteResult::new(path, 0, DeleteMethod::AlreadyMissing)
            }
            Err(e) => {
                log::error!("Failed to delete {}: {}", dup.path, e);
                summary.failures.push(DeleteFailure {
                    path: dup.path.clone(),
                    message: e.to_string(),
                });
                return Ok(());
            }
        };
        result.path = PathBuf::from(&dup.path);

        self.catalog
            .mark_deleted(&dup.path, chrono::Utc::now().timestamp())?;

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_item_completed(result.size);
        }
        summary.bytes_freed += result.size;
        summary.deleted.push(result);
        Ok(())
    }

    fn remove_local(&self, duplicate: &Path, keep: &Path) -> Result<DeleteResult, DeleteError> {
        match self.config.dedupe_command {
            Some(ref command) => run_dedupe_command(command, duplicate, keep),
            None if self.config.use_trash => delete_to_trash(duplicate),
            None => permanent_delete(duplicate),
        }
    }
}
