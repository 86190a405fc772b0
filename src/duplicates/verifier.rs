//! Content verification for filesystem candidate groups.
//!
//! # Overview
//!
//! Candidate groups from the filesystem profile share only a size. The
//! verifier narrows them to byte-identical groups in two hashing stages:
//!
//! 1. **Sample stage**: members without a cached `sample_hash` are
//!    sample-hashed in a bounded thread pool. New digests are written
//!    through to the catalog so the next run skips them. Members are
//!    partitioned by sample digest and singletons are discarded.
//! 2. **Full stage**: every member of a surviving partition is full-hashed.
//!    Partitions by full digest with 2+ members are verified groups.
//!
//! Full digests are never cached. A record whose hash fails is dropped from
//! its group and the rest of the group carries on.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mediadedupe::catalog::{Catalog, RecordFilter, SqliteCatalog};
//! use mediadedupe::duplicates::{FilesystemVerifier, Profile, ProfileMatcher, VerifierConfig};
//! use mediadedupe::hasher::Hasher;
//!
//! let catalog = SqliteCatalog::open(std::path::Path::new("media.db")).unwrap();
//! let records = catalog.query(&RecordFilter::default()).unwrap();
//! let (groups, _) = ProfileMatcher::new(Profile::FilesystemContent).candidate_groups(records);
//!
//! let verifier = FilesystemVerifier::new(Arc::new(Hasher::new()), VerifierConfig::default());
//! let (verified, stats) = verifier.verify(groups, &catalog).unwrap();
//! println!("{} verified groups, {} bytes hashed", verified.len(), stats.bytes_hashed);
//! ```

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

use super::CandidateGroup;
use crate::catalog::{Catalog, CatalogError};
use crate::hasher::{hash_to_hex, Hash, HashError, Hasher};
use crate::progress::ProgressCallback;

/// Log files above this size at debug level before full hashing them.
const LARGE_FILE_THRESHOLD: u64 = 100 * 1024 * 1024;

/// Errors that abort verification.
#[derive(thiserror::Error, Debug)]
pub enum VerifyError {
    /// The hashing thread pool could not be created.
    #[error("failed to build hashing thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Writing a sample hash back to the catalog failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Configuration for the verifier.
#[derive(Clone)]
pub struct VerifierConfig {
    /// Number of I/O threads for parallel hashing.
    /// Default is 4 to prevent disk thrashing.
    pub io_threads: usize,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for VerifierConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifierConfig")
            .field("io_threads", &self.io_threads)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "ProgressCallback"),
            )
            .finish()
    }
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            io_threads: 4,
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl VerifierConfig {
    /// Set the number of I/O threads.
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
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

/// Statistics from verification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyStats {
    /// Records in the candidate groups handed to the verifier
    pub input_records: usize,
    /// Records whose cached sample hash was reused
    pub sample_cache_hits: usize,
    /// Records whose sample hash was computed (and written through)
    pub sample_cache_misses: usize,
    /// Records dropped because sample hashing failed
    pub sample_failures: usize,
    /// Records successfully full-hashed
    pub full_hashed: usize,
    /// Records dropped because full hashing failed
    pub full_failures: usize,
    /// Bytes read by the full stage
    pub bytes_hashed: u64,
    /// Byte-identical groups produced
    pub verified_groups: usize,
    /// Whether verification stopped early on shutdown
    pub interrupted: bool,
}

/// One hashing job: a member of one working group.
#[derive(Debug, Clone)]
struct Job {
    group: usize,
    member: usize,
    path: PathBuf,
    size: u64,
}

/// Result of one job; `None` when skipped after shutdown.
type JobResult = (Job, Option<Result<Hash, HashError>>);

/// Verifies filesystem candidate groups by content.
#[derive(Debug, Clone)]
pub struct FilesystemVerifier {
    hasher: Arc<Hasher>,
    config: VerifierConfig,
}

impl FilesystemVerifier {
    /// Create a verifier around a shared hasher.
    #[must_use]
    pub fn new(hasher: Arc<Hasher>, config: VerifierConfig) -> Self {
        Self { hasher, config }
    }

    /// Narrow `groups` to byte-identical groups.
    ///
    /// Computed sample hashes are persisted through `catalog` and set on the
    /// in-memory records. Output keeps the input group order; a group that
    /// splits yields its partitions in order of first member.
    ///
    /// # Errors
    ///
    /// Returns `VerifyError` if the thread pool cannot be built or a sample
    /// hash cannot be written to the catalog. Per-file hashing failures are
    /// not errors; those records are dropped and counted in the stats.
    pub fn verify<C: Catalog>(
        &self,
        groups: impl IntoIterator<Item = CandidateGroup>,
        catalog: &C,
    ) -> Result<(Vec<CandidateGroup>, VerifyStats), VerifyError> {
        let groups: Vec<CandidateGroup> = groups.into_iter().collect();
        let mut stats = VerifyStats {
            input_records: groups.iter().map(CandidateGroup::len).sum(),
            ..Default::default()
        };

        if groups.is_empty() {
            log::debug!("Verify: no candidate groups");
            return Ok((Vec::new(), stats));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.io_threads.max(1))
            .build()?;

        let sampled = self.sample_stage(&pool, groups, catalog, &mut stats)?;
        if stats.interrupted {
            return Ok((Vec::new(), stats));
        }

        let verified = self.full_stage(&pool, sampled, &mut stats);
        stats.verified_groups = verified.len();

        log::info!(
            "Verify complete: {} records → {} verified groups ({} sample hashes reused, {} computed)",
            stats.input_records,
            stats.verified_groups,
            stats.sample_cache_hits,
            stats.sample_cache_misses
        );

        Ok((verified, stats))
    }

    fn sample_stage<C: Catalog>(
        &self,
        pool: &rayon::ThreadPool,
        mut groups: Vec<CandidateGroup>,
        catalog: &C,
        stats: &mut VerifyStats,
    ) -> Result<Vec<CandidateGroup>, VerifyError> {
        let mut jobs = Vec::new();
        for (g, group) in groups.iter().enumerate() {
            for (m, record) in group.records.iter().enumerate() {
                if record.sample_hash.is_some() {
                    stats.sample_cache_hits += 1;
                    log::trace!("Sample hash cache hit: {}", record.path);
                } else {
                    jobs.push(Job {
                        group: g,
                        member: m,
                        path: record.fs_path(),
                        size: record.size_bytes().unwrap_or(0),
                    });
                }
            }
        }

        log::info!(
            "Sample stage: hashing {} files ({} cached)",
            jobs.len(),
            stats.sample_cache_hits
        );

        let results = self.run_jobs(pool, "sample_hash", jobs, |hasher, path| {
            hasher.sample_hash(path)
        });

        let mut dropped: HashSet<(usize, usize)> = HashSet::new();
        for (job, result) in results {
            match result {
                Some(Ok(hash)) => {
                    let hex = hash_to_hex(&hash);
                    let record = &mut groups[job.group].records[job.member];
                    catalog.set_sample_hash(&record.path, &hex)?;
                    record.sample_hash = Some(hex);
                    stats.sample_cache_misses += 1;
                }
                Some(Err(HashError::Interrupted(_))) | None => {
                    dropped.insert((job.group, job.member));
                }
                Some(Err(e)) => {
                    log::warn!("Failed to sample hash {}: {}", job.path.display(), e);
                    stats.sample_failures += 1;
                    dropped.insert((job.group, job.member));
                }
            }
        }

        if self.config.is_shutdown_requested() {
            stats.interrupted = true;
            log::info!("Sample stage: interrupted by shutdown signal");
            return Ok(Vec::new());
        }

        let mut partitions = Vec::new();
        for (g, group) in groups.into_iter().enumerate() {
            let members = group
                .records
                .into_iter()
                .enumerate()
                .filter(|(m, _)| !dropped.contains(&(g, *m)))
                .map(|(_, record)| record);

            let split = partition_by(members, |r| r.sample_hash.clone());
            for records in split {
                log::debug!(
                    "Sample partition: {} members, {} bytes each",
                    records.len(),
                    records[0].size
                );
                partitions.push(CandidateGroup::new(records));
            }
        }

        Ok(partitions)
    }

    fn full_stage(
        &self,
        pool: &rayon::ThreadPool,
        groups: Vec<CandidateGroup>,
        stats: &mut VerifyStats,
    ) -> Vec<CandidateGroup> {
        let jobs: Vec<Job> = groups
            .iter()
            .enumerate()
            .flat_map(|(g, group)| {
                group.records.iter().enumerate().map(move |(m, record)| Job {
                    group: g,
                    member: m,
                    path: record.fs_path(),
                    size: record.size_bytes().unwrap_or(0),
                })
            })
            .collect();

        log::info!("Full stage: hashing {} files", jobs.len());

        let results = self.run_jobs(pool, "full_hash", jobs, |hasher, path| {
            hasher.full_hash(path)
        });

        let mut digests: HashMap<(usize, usize), Hash> = HashMap::new();
        for (job, result) in results {
            match result {
                Some(Ok(hash)) => {
                    stats.full_hashed += 1;
                    stats.bytes_hashed += job.size;
                    digests.insert((job.group, job.member), hash);
                }
                Some(Err(HashError::Interrupted(_))) | None => {}
                Some(Err(e)) => {
                    log::warn!("Failed to hash {}: {}", job.path.display(), e);
                    stats.full_failures += 1;
                }
            }
        }

        if self.config.is_shutdown_requested() {
            stats.interrupted = true;
            log::info!("Full stage: interrupted by shutdown signal");
            return Vec::new();
        }

        let mut verified = Vec::new();
        for (g, group) in groups.into_iter().enumerate() {
            let members = group.records.into_iter().enumerate().filter_map(|(m, r)| {
                digests.get(&(g, m)).map(|hash| (*hash, r))
            });

            let mut order: Vec<Hash> = Vec::new();
            let mut buckets: HashMap<Hash, Vec<_>> = HashMap::new();
            for (hash, record) in members {
                buckets
                    .entry(hash)
                    .or_insert_with(|| {
                        order.push(hash);
                        Vec::new()
                    })
                    .push(record);
            }

            for hash in order {
                let Some(records) = buckets.remove(&hash) else {
                    continue;
                };
                if records.len() < 2 {
                    log::trace!("Unique content eliminated: {}", records[0].path);
                    continue;
                }
                log::debug!(
                    "Verified group {}: {} files, {} bytes each",
                    hash_to_hex(&hash),
                    records.len(),
                    records[0].size
                );
                verified.push(CandidateGroup::new(records));
            }
        }

        verified
    }

    /// Hash every job in the pool, preserving job order in the output.
    fn run_jobs<F>(
        &self,
        pool: &rayon::ThreadPool,
        phase: &str,
        jobs: Vec<Job>,
        hash: F,
    ) -> Vec<JobResult>
    where
        F: Fn(&Hasher, &Path) -> Result<Hash, HashError> + Sync,
    {
        if jobs.is_empty() {
            return Vec::new();
        }

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start(phase, jobs.len());
        }

        let done = AtomicUsize::new(0);
        let results: Vec<JobResult> = pool.install(|| {
            jobs.into_par_iter()
                .map(|job| {
                    if self.config.is_shutdown_requested() {
                        log::debug!("{phase}: shutdown requested, skipping {}", job.path.display());
                        return (job, None);
                    }

                    if phase == "full_hash" && job.size > LARGE_FILE_THRESHOLD {
                        log::debug!(
                            "Hashing large file ({} MB): {}",
                            job.size / (1024 * 1024),
                            job.path.display()
                        );
                    }

                    let result = hash(self.hasher.as_ref(), job.path.as_path());
                    if let Ok(ref digest) = result {
                        log::trace!("{phase} {}: {}", hash_to_hex(digest), job.path.display());
                    }

                    if let Some(ref callback) = self.config.progress_callback {
                        let current = done.fetch_add(1, Ordering::Relaxed) + 1;
                        callback.on_progress(current, job.path.to_string_lossy().as_ref());
                        if result.is_ok() {
                            callback.on_item_completed(job.size);
                        }
                    }

                    (job, Some(result))
                })
                .collect()
        });

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end(phase);
        }

        results
    }
}

/// Split `items` into partitions of equal key, in order of first
/// appearance, keeping only partitions with 2+ members. Items without a
/// key are dropped.
fn partition_by<T, K, F>(items: impl IntoIterator<Item = T>, key: F) -> Vec<Vec<T>>
where
    K: std::hash::Hash + Eq,
    F: Fn(&T) -> Option<K>,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut partitions: Vec<Vec<T>> = Vec::new();
    for item in items {
        let Some(k) = key(&item) else {
            continue;
        };
        let slot = *index.entry(k).or_insert_with(|| {
            partitions.push(Vec::new());
            partitions.len() - 1
        });
        partitions[slot].push(item);
    }
    partitions.retain(|p| p.len() > 1);
    partitions
}
