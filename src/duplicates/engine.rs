//! The dedupe pipeline.
//!
//! # Overview
//!
//! [`DedupeEngine::run`] drives one run end to end:
//!
//! 1. Query the catalog with the caller's filter
//! 2. Group records under the active [`Profile`]
//! 3. Content-verify groups (filesystem profile only)
//! 4. Rank each group, apply the similarity filter, pick keep and duplicates
//! 5. Remove duplicates and mark them deleted in the catalog
//!
//! The result is a [`Report`]. A dry run stops short of step 5's side
//! effects; sample hashes computed during step 3 are still cached.
//!
//! # Example
//!
//! ```no_run
//! use mediadedupe::catalog::SqliteCatalog;
//! use mediadedupe::duplicates::{DedupeEngine, Profile, RunOptions};
//! use std::path::Path;
//!
//! let catalog = SqliteCatalog::open(Path::new("media.db")).unwrap();
//! let options = RunOptions::new(Profile::FilesystemContent).with_dry_run(true);
//! let report = DedupeEngine::new(options).run(&catalog).unwrap();
//!
//! for decision in &report.decisions {
//!     println!("keep {} ({} duplicates)", decision.keep_path, decision.duplicate_count());
//! }
//! ```

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use super::{
    ClaimSet, DuplicateDecision, FilesystemVerifier, KeepSelector, Profile, ProfileMatcher,
    SimilarityConfig, SortKey, VerifierConfig, VerifyError,
};
use crate::actions::{DeleteConfig, DeleteError, DeleteFailure, DeleteResult, DeletionExecutor};
use crate::catalog::{Catalog, CatalogError, RecordFilter};
use crate::error::{ConfigError, ExitCode};
use crate::hasher::Hasher;
use crate::progress::ProgressCallback;

/// Errors that abort a run.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    /// The run options are invalid.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The catalog failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Content verification could not run.
    #[error(transparent)]
    Verify(VerifyError),

    /// Deletion could not continue.
    #[error(transparent)]
    Delete(DeleteError),

    /// Shutdown was requested before any deletion started.
    #[error("run interrupted by user")]
    Interrupted,
}

impl From<VerifyError> for EngineError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::Catalog(e) => Self::Catalog(e),
            other => Self::Verify(other),
        }
    }
}

impl From<DeleteError> for EngineError {
    fn from(err: DeleteError) -> Self {
        match err {
            DeleteError::Catalog(e) => Self::Catalog(e),
            other => Self::Delete(other),
        }
    }
}

type ExistenceCheck = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

/// Options for one run.
#[derive(Clone)]
pub struct RunOptions {
    /// Equivalence profile; required
    pub profile: Option<Profile>,
    /// Which catalog records take part
    pub filter: RecordFilter,
    /// Path-similarity guard
    pub similarity: SimilarityConfig,
    /// Caller ranking keys, applied after the audio-stream rule
    pub sort_keys: Vec<SortKey>,
    /// Command to run instead of trash/permanent removal
    pub dedupe_command: Option<String>,
    /// Use the system trash (otherwise remove permanently)
    pub use_trash: bool,
    /// Report only; change nothing on disk or in the catalog's deleted state
    pub dry_run: bool,
    /// Hashing threads
    pub io_threads: usize,
    /// Cancellation flag
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Progress reporting
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunOptions")
            .field("profile", &self.profile)
            .field("filter", &self.filter)
            .field("similarity", &self.similarity)
            .field("sort_keys", &self.sort_keys)
            .field("dedupe_command", &self.dedupe_command)
            .field("use_trash", &self.use_trash)
            .field("dry_run", &self.dry_run)
            .field("io_threads", &self.io_threads)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "ProgressCallback"),
            )
            .finish()
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            profile: None,
            filter: RecordFilter::default(),
            similarity: SimilarityConfig::default(),
            sort_keys: Vec::new(),
            dedupe_command: None,
            use_trash: true,
            dry_run: false,
            io_threads: 4,
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl RunOptions {
    /// Options for `profile` with defaults elsewhere.
    #[must_use]
    pub fn new(profile: Profile) -> Self {
        Self {
            profile: Some(profile),
            ..Self::default()
        }
    }

    /// Set the record filter.
    #[must_use]
    pub fn with_filter(mut self, filter: RecordFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Set the similarity guard.
    #[must_use]
    pub fn with_similarity(mut self, similarity: SimilarityConfig) -> Self {
        self.similarity = similarity;
        self
    }

    /// Set caller sort keys.
    #[must_use]
    pub fn with_sort_keys(mut self, keys: Vec<SortKey>) -> Self {
        self.sort_keys = keys;
        self
    }

    /// Set a dedupe command.
    #[must_use]
    pub fn with_dedupe_command(mut self, command: impl Into<String>) -> Self {
        self.dedupe_command = Some(command.into());
        self
    }

    /// Choose trash or permanent removal.
    #[must_use]
    pub fn with_trash(mut self, use_trash: bool) -> Self {
        self.use_trash = use_trash;
        self
    }

    /// Enable/disable dry run.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set the number of hashing threads.
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads;
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

    /// Check the options before any work starts.
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigError` found.
    pub fn validate(&self) -> Result<Profile, ConfigError> {
        let profile = self.profile.ok_or(ConfigError::NoProfile)?;
        let ratio = self.similarity.min_similarity_ratio;
        if !ratio.is_finite() || !(0.0..=1.0).contains(&ratio) {
            return Err(ConfigError::InvalidRatio(ratio));
        }
        if self.io_threads == 0 {
            return Err(ConfigError::ZeroIoThreads);
        }
        if self
            .dedupe_command
            .as_deref()
            .is_some_and(|c| c.trim().is_empty())
        {
            return Err(ConfigError::EmptyDedupeCommand);
        }
        Ok(profile)
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Outcome of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    /// Profile the run used
    pub profile: Profile,
    /// Whether the run was a dry run
    pub dry_run: bool,
    /// Candidate groups produced by profile matching
    pub candidate_groups: usize,
    /// Groups that survived verification (equal to candidates for
    /// metadata profiles)
    pub verified_groups: usize,
    /// Bytes freed if every decision is applied
    pub reclaimable_bytes: u64,
    /// Decisions, largest reclaimable bytes first, then by keep path
    pub decisions: Vec<DuplicateDecision>,
    /// Duplicates removed and marked deleted
    pub deleted_files: usize,
    /// How each removed duplicate was handled
    pub removed: Vec<DeleteResult>,
    /// Duplicates that could not be removed
    pub failed_deletions: Vec<DeleteFailure>,
    /// Whether deletion stopped early on shutdown
    pub interrupted: bool,
}

impl Report {
    /// Total duplicates across all decisions.
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.decisions.iter().map(DuplicateDecision::duplicate_count).sum()
    }

    /// Whether any duplicates were found.
    #[must_use]
    pub fn has_duplicates(&self) -> bool {
        !self.decisions.is_empty()
    }

    /// Process exit code for this outcome.
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        if self.interrupted {
            ExitCode::Interrupted
        } else if !self.failed_deletions.is_empty() {
            ExitCode::PartialSuccess
        } else if self.has_duplicates() {
            ExitCode::Success
        } else {
            ExitCode::NoDuplicates
        }
    }
}

/// Runs the dedupe pipeline.
pub struct DedupeEngine {
    options: RunOptions,
    hasher: Arc<Hasher>,
    existence_check: Option<ExistenceCheck>,
}

impl std::fmt::Debug for DedupeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupeEngine")
            .field("options", &self.options)
            .field("hasher", &self.hasher)
            .finish_non_exhaustive()
    }
}

impl DedupeEngine {
    /// Create an engine with a default hasher.
    #[must_use]
    pub fn new(options: RunOptions) -> Self {
        let mut hasher = Hasher::new();
        if let Some(ref flag) = options.shutdown_flag {
            hasher = hasher.with_shutdown_flag(Arc::clone(flag));
        }
        Self {
            options,
            hasher: Arc::new(hasher),
            existence_check: None,
        }
    }

    /// Replace the hasher.
    #[must_use]
    pub fn with_hasher(mut self, hasher: Arc<Hasher>) -> Self {
        self.hasher = hasher;
        self
    }

    /// Replace the on-disk existence check used for keep candidates.
    #[must_use]
    pub fn with_existence_check<F>(mut self, check: F) -> Self
    where
        F: Fn(&Path) -> bool + Send + Sync + 'static,
    {
        self.existence_check = Some(Arc::new(check));
        self
    }

    /// The options this engine runs with.
    #[must_use]
    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Execute one run against `catalog`.
    ///
    /// # Errors
    ///
    /// - `Config` if the options are invalid (nothing is touched)
    /// - `Catalog` if the catalog fails at any point
    /// - `Verify` if the hashing pool cannot be built
    /// - `Interrupted` if shutdown is requested before deletion starts
    pub fn run<C: Catalog>(&self, catalog: &C) -> Result<Report, EngineError> {
        let profile = self.options.validate()?;

        let records = catalog.query(&self.options.filter)?;
        log::info!("Loaded {} records from catalog", records.len());

        let (groups, match_stats) = ProfileMatcher::new(profile).candidate_groups(records);
        log::debug!("Match stats: {:?}", match_stats);

        let selector = self.keep_selector(profile);
        let mut claims = ClaimSet::new();
        let mut decisions = Vec::new();
        let candidate_groups;
        let verified_groups;

        if profile.verifies_content() {
            let groups: Vec<_> = groups.collect();
            candidate_groups = groups.len();

            let verifier = FilesystemVerifier::new(Arc::clone(&self.hasher), self.verifier_config());
            let (verified, verify_stats) = verifier.verify(groups, catalog)?;
            log::info!(
                "Sample hashes: {} cached, {} computed, {} failed; full hashes: {} computed, {} failed",
                verify_stats.sample_cache_hits,
                verify_stats.sample_cache_misses,
                verify_stats.sample_failures,
                verify_stats.full_hashed,
                verify_stats.full_failures
            );
            if verify_stats.interrupted {
                return Err(EngineError::Interrupted);
            }

            verified_groups = verified.len();
            for group in verified {
                if self.options.is_shutdown_requested() {
                    return Err(EngineError::Interrupted);
                }
                decisions.extend(selector.decide(group, &mut claims));
            }
        } else {
            let mut count = 0;
            for group in groups {
                if self.options.is_shutdown_requested() {
                    return Err(EngineError::Interrupted);
                }
                count += 1;
                decisions.extend(selector.decide(group, &mut claims));
            }
            candidate_groups = count;
            verified_groups = count;
        }

        if self.options.is_shutdown_requested() {
            return Err(EngineError::Interrupted);
        }

        decisions.sort_by(|a, b| {
            b.reclaimable_bytes()
                .cmp(&a.reclaimable_bytes())
                .then_with(|| a.keep_path.cmp(&b.keep_path))
        });
        let reclaimable_bytes = decisions.iter().map(DuplicateDecision::reclaimable_bytes).sum();

        log::info!(
            "{} decisions, {} keeps, {} duplicates, {} bytes reclaimable",
            decisions.len(),
            claims.keep_count(),
            claims.duplicate_count(),
            reclaimable_bytes
        );

        let summary = DeletionExecutor::new(catalog, self.delete_config()).execute(&decisions)?;

        Ok(Report {
            profile,
            dry_run: self.options.dry_run,
            candidate_groups,
            verified_groups,
            reclaimable_bytes,
            decisions,
            deleted_files: summary.success_count(),
            removed: summary.deleted,
            failed_deletions: summary.failures,
            interrupted: summary.interrupted,
        })
    }

    fn keep_selector(&self, profile: Profile) -> KeepSelector {
        let selector = KeepSelector::new(profile)
            .with_sort_keys(self.options.sort_keys.clone())
            .with_similarity(self.options.similarity);
        match self.existence_check {
            Some(ref check) => {
                let check = Arc::clone(check);
                selector.with_existence_check(move |p| check(p))
            }
            None => selector,
        }
    }

    fn verifier_config(&self) -> VerifierConfig {
        let mut config = VerifierConfig::default().with_io_threads(self.options.io_threads);
        if let Some(ref flag) = self.options.shutdown_flag {
            config = config.with_shutdown_flag(Arc::clone(flag));
        }
        if let Some(ref callback) = self.options.progress_callback {
            config = config.with_progress_callback(Arc::clone(callback));
        }
        config
    }

    fn delete_config(&self) -> DeleteConfig {
        let mut config = DeleteConfig::default().with_dry_run(self.options.dry_run);
        config.use_trash = self.options.use_trash;
        if let Some(ref command) = self.options.dedupe_command {
            config = config.with_dedupe_command(command);
        }
        if let Some(ref flag) = self.options.shutdown_flag {
            config = config.with_shutdown_flag(Arc::clone(flag));
        }
        if let Some(ref callback) = self.options.progress_callback {
            config = config.with_progress_callback(Arc::clone(callback));
        }
        config
    }
}
