//! Media catalog interface.
//!
//! The catalog is the persistent store of media records. The dedupe engine
//! only needs three operations from it:
//!
//! * query the non-deleted records matching a filter, in a stable order
//! * write a computed sample hash back onto a record (idempotent upsert)
//! * mark a record deleted with a timestamp
//!
//! These are captured by the [`Catalog`] trait. [`SqliteCatalog`] is the
//! bundled implementation.
//!
//! # Architecture
//!
//! * [`record`]: the [`MediaRecord`] row type and its [`Location`].
//! * [`filter`]: caller-supplied [`RecordFilter`] constraints.
//! * [`database`]: SQLite persistence and schema management.

pub mod database;
pub mod filter;
pub mod record;

use std::path::PathBuf;

pub use database::SqliteCatalog;
pub use filter::RecordFilter;
pub use record::{local_path, strip_file_url, Location, MediaRecord, StreamCounts};

/// Errors raised by catalog operations.
///
/// Catalog failures are not recoverable locally; the engine aborts the run
/// when it sees one.
#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    /// The underlying database reported an error.
    #[error("catalog database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The catalog location could not be prepared.
    #[error("catalog I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The database was written by a newer schema version.
    #[error("unsupported catalog schema version {0}")]
    UnsupportedSchema(i64),
}

/// Convenience alias for catalog results.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Persistent store of media records consumed by the dedupe engine.
pub trait Catalog {
    /// All non-deleted records matching `filter`, in a deterministic order.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the query fails.
    fn query(&self, filter: &RecordFilter) -> CatalogResult<Vec<MediaRecord>>;

    /// Persist a computed sample hash for `path`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the write fails.
    fn set_sample_hash(&self, path: &str, hash: &str) -> CatalogResult<()>;

    /// Mark `path` deleted at `time_deleted` (unix seconds).
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the write fails.
    fn mark_deleted(&self, path: &str, time_deleted: i64) -> CatalogResult<()>;
}

impl<C: Catalog + ?Sized> Catalog for &C {
    fn query(&self, filter: &RecordFilter) -> CatalogResult<Vec<MediaRecord>> {
        (**self).query(filter)
    }

    fn set_sample_hash(&self, path: &str, hash: &str) -> CatalogResult<()> {
        (**self).set_sample_hash(path, hash)
    }

    fn mark_deleted(&self, path: &str, time_deleted: i64) -> CatalogResult<()> {
        (**self).mark_deleted(path, time_deleted)
    }
}
