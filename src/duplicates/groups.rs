//! Candidate groups and duplicate decisions.
//!
//! # Overview
//!
//! A [`CandidateGroup`] holds catalog records that are *possibly* duplicates
//! under the active profile. For the filesystem profile the verifier narrows
//! these down to byte-identical groups; the keep selector then turns each
//! surviving group into at most one [`DuplicateDecision`].
//!
//! # Example
//!
//! ```
//! use mediadedupe::catalog::MediaRecord;
//! use mediadedupe::duplicates::CandidateGroup;
//!
//! let group = CandidateGroup::new(vec![
//!     MediaRecord::new("/a.mkv", 100),
//!     MediaRecord::new("/b.mkv", 100),
//! ]);
//!
//! assert_eq!(group.len(), 2);
//! assert!(group.has_duplicates());
//! ```

use serde::{Deserialize, Serialize};

use crate::catalog::{Location, MediaRecord};

/// Ordered records believed equivalent under the active profile.
///
/// Members are distinct by path and keep the order in which the catalog
/// returned them; the keep selector relies on that order as its final
/// fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateGroup {
    /// Members in stable catalog order
    pub records: Vec<MediaRecord>,
}

impl CandidateGroup {
    /// Create a group from records already in catalog order.
    #[must_use]
    pub fn new(records: Vec<MediaRecord>) -> Self {
        debug_assert!(
            {
                let mut paths: Vec<&str> = records.iter().map(|r| r.path.as_str()).collect();
                paths.sort_unstable();
                paths.windows(2).all(|w| w[0] != w[1])
            },
            "candidate group members must have distinct paths"
        );
        Self { records }
    }

    /// Number of records in this group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if this group is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Check if this group still has potential duplicates (2+ records).
    #[must_use]
    pub fn has_duplicates(&self) -> bool {
        self.records.len() > 1
    }

    /// Paths of the members, in group order.
    #[must_use]
    pub fn paths(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.path.as_str()).collect()
    }
}

/// One duplicate scheduled for removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateEntry {
    /// Path of the duplicate record
    pub path: String,
    /// Size in bytes, for reporting
    pub size: u64,
    /// Where the duplicate lives; remote duplicates are only marked deleted
    #[serde(default)]
    pub location: Location,
}

impl DuplicateEntry {
    /// Build an entry from a catalog record.
    #[must_use]
    pub fn from_record(record: &MediaRecord) -> Self {
        Self {
            path: record.path.clone(),
            size: record.size_bytes().unwrap_or(0),
            location: record.location,
        }
    }
}

/// The outcome for one verified group: what to keep and what to remove.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateDecision {
    /// The canonical record that survives
    pub keep_path: String,
    /// Records to remove; never empty and never contains `keep_path`
    pub duplicates: Vec<DuplicateEntry>,
}

impl DuplicateDecision {
    /// Bytes freed if every duplicate is removed.
    #[must_use]
    pub fn reclaimable_bytes(&self) -> u64 {
        self.duplicates.iter().map(|d| d.size).sum()
    }

    /// Number of duplicates in this decision.
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.duplicates.len()
    }

    /// Paths of the duplicates.
    #[must_use]
    pub fn duplicate_paths(&self) -> Vec<&str> {
        self.duplicates.iter().map(|d| d.path.as_str()).collect()
    }
}
