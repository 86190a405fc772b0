//! Actions applied to duplicates.
//!
//! Removal goes through one of:
//! - a caller-supplied dedupe command (`cmd args.. <duplicate> <keep>`)
//! - the system trash (default, recoverable)
//! - permanent deletion (requires explicit configuration)
//!
//! ```no_run
//! use mediadedupe::actions::{DeleteConfig, DeletionExecutor};
//! use mediadedupe::catalog::SqliteCatalog;
//! use std::path::Path;
//!
//! let catalog = SqliteCatalog::open(Path::new("media.db")).unwrap();
//! let executor = DeletionExecutor::new(&catalog, DeleteConfig::trash().with_dry_run(true));
//! let summary = executor.execute(&[]).unwrap();
//! println!("{}", summary.summary());
//! ```

pub mod delete;

pub use delete::{
    delete_to_trash, permanent_delete, run_dedupe_command, split_command, DeleteConfig,
    DeleteError, DeleteFailure, DeleteMethod, DeleteResult, DeletionExecutor, DeletionSummary,
};
