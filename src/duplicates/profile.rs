//! Equivalence profiles and candidate group enumeration.
//!
//! # Overview
//!
//! A [`Profile`] decides which catalog records *might* be duplicates of each
//! other. [`ProfileMatcher`] performs one grouping pass over the records,
//! keyed by the profile's matching key, and then lazily yields
//! [`CandidateGroup`]s. No file content is read here.
//!
//! | Profile             | Key                         | Duration rule |
//! |---------------------|-----------------------------|---------------|
//! | `MusicIdentity`     | title + artist + album      | within ±8 s   |
//! | `ExtractorId`       | extractor id                | within ±8 s   |
//! | `Title`             | title                       | within ±8 s   |
//! | `Duration`          | duration                    | exact         |
//! | `FilesystemContent` | size (> 0)                  | n/a           |
//!
//! The ±8 s rule is not transitive, so for the tolerance profiles every
//! record anchors its own window of records within tolerance of it.
//! Windows may overlap; the keep selector's claim set settles overlaps.
//!
//! # Example
//!
//! ```
//! use mediadedupe::catalog::MediaRecord;
//! use mediadedupe::duplicates::{Profile, ProfileMatcher};
//!
//! let records = vec![
//!     MediaRecord::new("/a.mp4", 100),
//!     MediaRecord::new("/b.mp4", 100),
//!     MediaRecord::new("/c.mp4", 200),
//! ];
//!
//! let (groups, stats) = ProfileMatcher::new(Profile::FilesystemContent).candidate_groups(records);
//! let groups: Vec<_> = groups.collect();
//!
//! assert_eq!(groups.len(), 1);
//! assert_eq!(groups[0].paths(), vec!["/a.mp4", "/b.mp4"]);
//! assert_eq!(stats.total_records, 3);
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::CandidateGroup;
use crate::catalog::MediaRecord;

/// Maximum duration difference (seconds) for the tolerance profiles.
pub const DURATION_TOLERANCE_SECS: f64 = 8.0;

/// The equivalence criterion for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// Same title, artist and album; duration within ±8 s
    MusicIdentity,
    /// Same extractor id; duration within ±8 s
    ExtractorId,
    /// Same title; duration within ±8 s
    Title,
    /// Exactly equal duration
    Duration,
    /// Same size, then verified byte-identical content
    FilesystemContent,
}

impl Profile {
    /// Short machine-readable name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::MusicIdentity => "music_identity",
            Self::ExtractorId => "extractor_id",
            Self::Title => "title",
            Self::Duration => "duration",
            Self::FilesystemContent => "filesystem_content",
        }
    }

    /// Whether matching applies the ±8 s duration tolerance.
    #[must_use]
    pub fn uses_duration_tolerance(self) -> bool {
        matches!(self, Self::MusicIdentity | Self::ExtractorId | Self::Title)
    }

    /// Whether candidate groups must be content-verified before deletion.
    #[must_use]
    pub fn verifies_content(self) -> bool {
        self == Self::FilesystemContent
    }

    /// The exact-equality part of the matching key, or `None` if the record
    /// cannot take part in this profile.
    fn key(self, record: &MediaRecord) -> Option<GroupKey> {
        record.size_bytes()?;
        match self {
            Self::MusicIdentity => {
                record.valid_duration()?;
                Some(GroupKey::Music(
                    non_empty(&record.title)?.to_string(),
                    non_empty(&record.artist)?.to_string(),
                    non_empty(&record.album)?.to_string(),
                ))
            }
            Self::ExtractorId => {
                record.valid_duration()?;
                Some(GroupKey::Text(non_empty(&record.extractor_id)?.to_string()))
            }
            Self::Title => {
                record.valid_duration()?;
                Some(GroupKey::Text(non_empty(&record.title)?.to_string()))
            }
            Self::Duration => record
                .valid_duration()
                .filter(|d| *d > 0.0)
                .map(|d| GroupKey::Bits(d.to_bits())),
            Self::FilesystemContent => {
                let size = record.size_bytes().filter(|s| *s > 0)?;
                if record.is_directory_path() || record.location.is_remote() {
                    return None;
                }
                Some(GroupKey::Bits(size))
            }
        }
    }

    /// Whether two records match under this profile.
    #[must_use]
    pub fn matches(self, a: &MediaRecord, b: &MediaRecord) -> bool {
        match (self.key(a), self.key(b)) {
            (Some(ka), Some(kb)) if ka == kb => {
                if self.uses_duration_tolerance() {
                    match (a.valid_duration(), b.valid_duration()) {
                        (Some(da), Some(db)) => within_tolerance(da, db),
                        _ => false,
                    }
                } else {
                    true
                }
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum GroupKey {
    Music(String, String, String),
    Text(String),
    Bits(u64),
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

fn within_tolerance(a: f64, b: f64) -> bool {
    (a - b).abs() <= DURATION_TOLERANCE_SECS
}

/// Statistics from the grouping pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchStats {
    /// Records handed to the matcher
    pub total_records: usize,
    /// Records without a usable key (malformed, empty fields, zero size)
    pub excluded_records: usize,
    /// Distinct keys shared by 2+ records
    pub shared_keys: usize,
    /// Records sharing a key with at least one other record
    pub potential_duplicates: usize,
}

/// Enumerates candidate groups for one profile.
#[derive(Debug, Clone, Copy)]
pub struct ProfileMatcher {
    profile: Profile,
}

impl ProfileMatcher {
    /// Create a matcher for `profile`.
    #[must_use]
    pub fn new(profile: Profile) -> Self {
        Self { profile }
    }

    /// The active profile.
    #[must_use]
    pub fn profile(&self) -> Profile {
        self.profile
    }

    /// Group `records` by the profile key and return a lazy sequence of
    /// candidate groups (each with 2+ members) plus grouping statistics.
    ///
    /// `records` must already be in the catalog's deterministic order; that
    /// order is preserved inside every group.
    #[must_use]
    pub fn candidate_groups(
        &self,
        records: impl IntoIterator<Item = MediaRecord>,
    ) -> (CandidateGroups, MatchStats) {
        let mut stats = MatchStats::default();
        let mut index: HashMap<GroupKey, usize> = HashMap::new();
        let mut buckets: Vec<Vec<MediaRecord>> = Vec::new();

        for record in records {
            stats.total_records += 1;
            let Some(key) = self.profile.key(&record) else {
                stats.excluded_records += 1;
                log::trace!("Excluded from {}: {}", self.profile, record.path);
                continue;
            };
            let slot = *index.entry(key).or_insert_with(|| {
                buckets.push(Vec::new());
                buckets.len() - 1
            });
            buckets[slot].push(record);
        }

        let buckets: Vec<Vec<MediaRecord>> = buckets
            .into_iter()
            .filter(|bucket| bucket.len() > 1)
            .collect();
        stats.shared_keys = buckets.len();
        stats.potential_duplicates = buckets.iter().map(Vec::len).sum();

        log::info!(
            "Grouping by {}: {} records → {} potential duplicates under {} keys ({} excluded)",
            self.profile,
            stats.total_records,
            stats.potential_duplicates,
            stats.shared_keys,
            stats.excluded_records
        );

        let groups = CandidateGroups {
            tolerance: self.profile.uses_duration_tolerance(),
            buckets: buckets.into_iter(),
            window: None,
        };
        (groups, stats)
    }
}

/// Lazy sequence of candidate groups produced by [`ProfileMatcher`].
#[derive(Debug)]
pub struct CandidateGroups {
    tolerance: bool,
    buckets: std::vec::IntoIter<Vec<MediaRecord>>,
    window: Option<WindowCursor>,
}

impl Iterator for CandidateGroups {
    type Item = CandidateGroup;

    fn next(&mut self) -> Option<CandidateGroup> {
        loop {
            if let Some(cursor) = self.window.as_mut() {
                if let Some(group) = cursor.next_window() {
                    return Some(group);
                }
                self.window = None;
            }

            let bucket = self.buckets.next()?;
            if self.tolerance {
                self.window = Some(WindowCursor::new(bucket));
            } else {
                return Some(CandidateGroup::new(bucket));
            }
        }
    }
}

/// Walks one same-key bucket, anchoring a duration window on each record.
#[derive(Debug)]
struct WindowCursor {
    records: Vec<MediaRecord>,
    durations: Vec<f64>,
    /// Record indices sorted by duration (ties keep catalog order)
    by_duration: Vec<usize>,
    next_anchor: usize,
    last_window: Vec<usize>,
}

impl WindowCursor {
    fn new(records: Vec<MediaRecord>) -> Self {
        // Every record in a tolerance bucket has a valid duration; see Profile::key.
        let durations: Vec<f64> = records
            .iter()
            .map(|r| r.valid_duration().unwrap_or(0.0))
            .collect();
        let mut by_duration: Vec<usize> = (0..records.len()).collect();
        by_duration.sort_by(|&a, &b| durations[a].total_cmp(&durations[b]));

        Self {
            records,
            durations,
            by_duration,
            next_anchor: 0,
            last_window: Vec::new(),
        }
    }

    fn next_window(&mut self) -> Option<CandidateGroup> {
        while self.next_anchor < self.records.len() {
            let anchor = self.durations[self.next_anchor];
            self.next_anchor += 1;

            let lo = self
                .by_duration
                .partition_point(|&i| anchor - self.durations[i] > DURATION_TOLERANCE_SECS);
            let hi = self
                .by_duration
                .partition_point(|&i| self.durations[i] - anchor <= DURATION_TOLERANCE_SECS);

            let mut members: Vec<usize> = self.by_duration[lo..hi].to_vec();
            if members.len() < 2 {
                continue;
            }
            members.sort_unstable();
            if members == self.last_window {
                continue;
            }

            let group = CandidateGroup::new(
                members.iter().map(|&i| self.records[i].clone()).collect(),
            );
            self.last_window = members;
            return Some(group);
        }
        None
    }
}
