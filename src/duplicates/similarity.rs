//! Path-similarity filtering of candidate groups.
//!
//! An optional guard against profile matches that live in unrelated places,
//! e.g. two different songs that happen to share a title. When enabled, each
//! member is compared with the group's first member (the ranked provisional
//! keep) by basename and/or directory name, and rejected if an enabled
//! comparison scores strictly below the threshold.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::catalog::MediaRecord;

/// Default minimum similarity ratio.
pub const DEFAULT_MIN_SIMILARITY_RATIO: f64 = 0.8;

/// Which path components to compare and how similar they must be.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityConfig {
    /// Compare final path components
    pub compare_basename: bool,
    /// Compare parent directories
    pub compare_dirname: bool,
    /// Minimum accepted ratio in `[0, 1]`
    pub min_similarity_ratio: f64,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            compare_basename: false,
            compare_dirname: false,
            min_similarity_ratio: DEFAULT_MIN_SIMILARITY_RATIO,
        }
    }
}

impl SimilarityConfig {
    /// Enable or disable basename comparison.
    #[must_use]
    pub fn with_basename(mut self, enabled: bool) -> Self {
        self.compare_basename = enabled;
        self
    }

    /// Enable or disable dirname comparison.
    #[must_use]
    pub fn with_dirname(mut self, enabled: bool) -> Self {
        self.compare_dirname = enabled;
        self
    }

    /// Set the minimum ratio.
    #[must_use]
    pub fn with_min_ratio(mut self, ratio: f64) -> Self {
        self.min_similarity_ratio = ratio;
        self
    }

    /// Whether any comparison is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.compare_basename || self.compare_dirname
    }

    /// Whether `other` is similar enough to `first` to stay in its group.
    #[must_use]
    pub fn accepts(&self, first: &MediaRecord, other: &MediaRecord) -> bool {
        let (first_dir, first_base) = split_path(first);
        let (other_dir, other_base) = split_path(other);

        if self.compare_basename {
            let ratio = similarity_ratio(first_base, other_base);
            if ratio < self.min_similarity_ratio {
                log::debug!(
                    "Basename similarity {:.3} below {:.3}: {} vs {}",
                    ratio,
                    self.min_similarity_ratio,
                    first.path,
                    other.path
                );
                return false;
            }
        }
        if self.compare_dirname {
            let ratio = similarity_ratio(first_dir, other_dir);
            if ratio < self.min_similarity_ratio {
                log::debug!(
                    "Dirname similarity {:.3} below {:.3}: {} vs {}",
                    ratio,
                    self.min_similarity_ratio,
                    first.path,
                    other.path
                );
                return false;
            }
        }
        true
    }

    /// Drop members that are not similar to the first member.
    ///
    /// The first member always stays. A no-op when no comparison is enabled.
    #[must_use]
    pub fn filter(&self, records: Vec<MediaRecord>) -> Vec<MediaRecord> {
        if !self.is_enabled() {
            return records;
        }
        let mut iter = records.into_iter();
        let Some(first) = iter.next() else {
            return Vec::new();
        };
        let mut kept: Vec<MediaRecord> = iter.filter(|r| self.accepts(&first, r)).collect();
        kept.insert(0, first);
        kept
    }
}

/// Split a record path into `(dirname, basename)`.
///
/// Remote URLs are split on their last `/`.
fn split_path(record: &MediaRecord) -> (&str, &str) {
    if record.location.is_remote() {
        return record.path.rsplit_once('/').unwrap_or(("", &record.path));
    }
    let path = Path::new(&record.path);
    let base = path.file_name().and_then(|s| s.to_str()).unwrap_or("");
    let dir = path.parent().and_then(|p| p.to_str()).unwrap_or("");
    (dir, base)
}

/// Similarity of two strings as `2 * LCS / (len(a) + len(b))`.
///
/// LCS is the longest common subsequence over Unicode scalar values. The
/// result is symmetric and lies in `[0, 1]`; two empty strings score 1.0.
#[must_use]
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * lcs_len(&a, &b) as f64 / total as f64
}

fn lcs_len(a: &[char], b: &[char]) -> usize {
    let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    let mut prev = vec![0usize; short.len() + 1];
    let mut curr = vec![0usize; short.len() + 1];
    for x in long {
        for (j, y) in short.iter().enumerate() {
            curr[j + 1] = if x == y {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[short.len()]
}
