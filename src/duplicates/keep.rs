//! Choosing the record to keep in each group.
//!
//! # Overview
//!
//! [`rank_group`] orders a group best-first. [`KeepSelector::decide`] takes
//! the first ranked member as the keep and every other eligible member as a
//! duplicate, recording both sides in a [`ClaimSet`] so that across
//! overlapping groups no file is ever deleted twice or deleted after being
//! chosen as a keep. A local keep must exist on disk; a remote keep can only
//! stand in for other remote records, so local files are never removed in
//! favour of a URL.
//!
//! Ranking rules, highest priority first:
//!
//! 1. has an audio stream
//! 2. caller-supplied [`SortKey`]s, in order
//! 3. has a video stream
//! 4. has a subtitle stream
//! 5. has an uploader
//! 6. more path separators (deeper path)
//! 7. fewer `.` characters in the path
//! 8. shorter path
//!
//! Rules 6 to 8 look at `file://` records without their URL prefix.
//! 9. larger size
//! 10. newer modification time
//! 11. newer creation time
//! 12. longer duration
//! 13. lexicographically larger path
//!
//! # Example
//!
//! ```
//! use mediadedupe::catalog::MediaRecord;
//! use mediadedupe::duplicates::{CandidateGroup, ClaimSet, KeepSelector, Profile};
//!
//! let selector = KeepSelector::new(Profile::Duration).with_existence_check(|_| true);
//! let mut claims = ClaimSet::new();
//!
//! let group = CandidateGroup::new(vec![
//!     MediaRecord::new("/media/clip.mp4", 100).with_duration(30.0),
//!     MediaRecord::new("/media/sub/clip.mp4", 100).with_duration(30.0),
//! ]);
//!
//! let decision = selector.decide(group, &mut claims).unwrap();
//! assert_eq!(decision.keep_path, "/media/sub/clip.mp4");
//! assert_eq!(decision.duplicate_paths(), vec!["/media/clip.mp4"]);
//! ```

use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{CandidateGroup, DuplicateDecision, DuplicateEntry, Profile, SimilarityConfig};
use crate::catalog::{strip_file_url, Location, MediaRecord};
use crate::error::ConfigError;

/// A column usable in caller sort keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortColumn {
    /// Record path
    Path,
    /// Size in bytes
    Size,
    /// Duration in seconds
    Duration,
    /// Modification time
    TimeModified,
    /// Creation time
    TimeCreated,
    /// Title
    Title,
    /// Artist
    Artist,
    /// Album
    Album,
    /// Extractor id
    ExtractorId,
    /// Uploader
    Uploader,
}

impl SortColumn {
    /// All columns, in documentation order.
    pub const ALL: [SortColumn; 10] = [
        Self::Path,
        Self::Size,
        Self::Duration,
        Self::TimeModified,
        Self::TimeCreated,
        Self::Title,
        Self::Artist,
        Self::Album,
        Self::ExtractorId,
        Self::Uploader,
    ];

    /// Column name as written in sort keys.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Size => "size",
            Self::Duration => "duration",
            Self::TimeModified => "time_modified",
            Self::TimeCreated => "time_created",
            Self::Title => "title",
            Self::Artist => "artist",
            Self::Album => "album",
            Self::ExtractorId => "extractor_id",
            Self::Uploader => "uploader",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Ascending comparison on this column. Absent values sort first.
    fn compare(self, a: &MediaRecord, b: &MediaRecord) -> Ordering {
        match self {
            Self::Path => a.path.cmp(&b.path),
            Self::Size => a.size.cmp(&b.size),
            Self::Duration => cmp_duration(a.duration, b.duration),
            Self::TimeModified => a.time_modified.cmp(&b.time_modified),
            Self::TimeCreated => a.time_created.cmp(&b.time_created),
            Self::Title => a.title.cmp(&b.title),
            Self::Artist => a.artist.cmp(&b.artist),
            Self::Album => a.album.cmp(&b.album),
            Self::ExtractorId => a.extractor_id.cmp(&b.extractor_id),
            Self::Uploader => a.uploader.cmp(&b.uploader),
        }
    }
}

/// One caller-supplied ordering rule, e.g. `size desc` or `-time_modified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortKey {
    /// Column to compare
    pub column: SortColumn,
    /// Larger values first
    pub descending: bool,
}

impl SortKey {
    /// Ascending key on `column`.
    #[must_use]
    pub fn asc(column: SortColumn) -> Self {
        Self {
            column,
            descending: false,
        }
    }

    /// Descending key on `column`.
    #[must_use]
    pub fn desc(column: SortColumn) -> Self {
        Self {
            column,
            descending: true,
        }
    }

    fn compare(&self, a: &MediaRecord, b: &MediaRecord) -> Ordering {
        let ord = self.column.compare(a, b);
        if self.descending {
            ord.reverse()
        } else {
            ord
        }
    }
}

impl FromStr for SortKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut words = trimmed.split_whitespace();
        let (Some(first), direction, None) = (words.next(), words.next(), words.next()) else {
            return Err(ConfigError::InvalidSortKey(s.to_string()));
        };

        let (column, descending) = match (first.strip_prefix('-'), direction) {
            (Some(column), None) => (column, true),
            (Some(_), Some(_)) => return Err(ConfigError::InvalidSortKey(s.to_string())),
            (None, None) => (first, false),
            (None, Some(dir)) if dir.eq_ignore_ascii_case("asc") => (first, false),
            (None, Some(dir)) if dir.eq_ignore_ascii_case("desc") => (first, true),
            (None, Some(_)) => return Err(ConfigError::InvalidSortKey(s.to_string())),
        };

        let column_lower = column.to_ascii_lowercase();
        let Some(column) = SortColumn::from_name(&column_lower) else {
            return Err(ConfigError::UnknownSortColumn {
                column: column.to_string(),
                suggestion: suggest_column(&column_lower),
            });
        };
        Ok(Self { column, descending })
    }
}

impl std::fmt::Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let dir = if self.descending { "desc" } else { "asc" };
        write!(f, "{} {}", self.column.name(), dir)
    }
}

/// Closest known column name, if any is reasonably close.
fn suggest_column(name: &str) -> Option<String> {
    SortColumn::ALL
        .into_iter()
        .map(|c| (c.name(), strsim::normalized_levenshtein(name, c.name())))
        .filter(|(_, score)| *score >= 0.5)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(n, _)| n.to_string())
}

/// Parse a list of sort key strings.
///
/// # Errors
///
/// Returns the first `ConfigError` encountered.
pub fn parse_sort_keys<S: AsRef<str>>(keys: &[S]) -> Result<Vec<SortKey>, ConfigError> {
    keys.iter().map(|k| k.as_ref().parse()).collect()
}

fn cmp_duration(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn dots(path: &str) -> usize {
    path.matches('.').count()
}

fn separators(path: &str) -> usize {
    path.chars()
        .filter(|c| *c == '/' || *c == std::path::MAIN_SEPARATOR)
        .count()
}

fn has_uploader(record: &MediaRecord) -> bool {
    record.uploader.is_some()
}

/// Same catalog path, or two local paths naming one file (`/x` and `file:///x`).
fn same_file(a: &MediaRecord, b: &MediaRecord) -> bool {
    a.path == b.path
        || (a.location == Location::Local
            && b.location == Location::Local
            && a.fs_path() == b.fs_path())
}

fn rank_path(record: &MediaRecord) -> &str {
    strip_file_url(&record.path).unwrap_or(&record.path)
}

/// Compare two records best-first.
fn compare_records(a: &MediaRecord, b: &MediaRecord, sort_keys: &[SortKey]) -> Ordering {
    let first = |x: bool, y: bool| y.cmp(&x);

    first(a.streams.audio > 0, b.streams.audio > 0)
        .then_with(|| {
            sort_keys
                .iter()
                .map(|k| k.compare(a, b))
                .find(|o| o.is_ne())
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| first(a.streams.video > 0, b.streams.video > 0))
        .then_with(|| first(a.streams.subtitle > 0, b.streams.subtitle > 0))
        .then_with(|| first(has_uploader(a), has_uploader(b)))
        .then_with(|| separators(rank_path(b)).cmp(&separators(rank_path(a))))
        // Fewer dots ranks first, so "a.b.mp4" loses to "ab.mp4".
        .then_with(|| dots(rank_path(a)).cmp(&dots(rank_path(b))))
        .then_with(|| rank_path(a).chars().count().cmp(&rank_path(b).chars().count()))
        .then_with(|| b.size.cmp(&a.size))
        .then_with(|| b.time_modified.cmp(&a.time_modified))
        .then_with(|| b.time_created.cmp(&a.time_created))
        .then_with(|| cmp_duration(b.duration, a.duration))
        .then_with(|| b.path.cmp(&a.path))
}

/// Order `records` best-first. The sort is stable.
pub fn rank_group(records: &mut [MediaRecord], sort_keys: &[SortKey]) {
    records.sort_by(|a, b| compare_records(a, b, sort_keys));
}

/// Paths already claimed by earlier decisions in this run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimSet {
    duplicates: HashSet<String>,
    keeps: HashSet<String>,
}

impl ClaimSet {
    /// Create an empty claim set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `path` is already scheduled for deletion.
    #[must_use]
    pub fn is_claimed_duplicate(&self, path: &str) -> bool {
        self.duplicates.contains(path)
    }

    /// Whether `path` was chosen as a keep.
    #[must_use]
    pub fn is_claimed_keep(&self, path: &str) -> bool {
        self.keeps.contains(path)
    }

    /// Record a decision's keep and duplicates.
    pub fn claim(&mut self, decision: &DuplicateDecision) {
        self.keeps.insert(decision.keep_path.clone());
        for dup in &decision.duplicates {
            self.duplicates.insert(dup.path.clone());
        }
    }

    /// Number of paths claimed as duplicates.
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.duplicates.len()
    }

    /// Number of paths claimed as keeps.
    #[must_use]
    pub fn keep_count(&self) -> usize {
        self.keeps.len()
    }
}

type ExistenceCheck = Box<dyn Fn(&Path) -> bool + Send + Sync>;

/// Turns groups into keep/duplicate decisions.
pub struct KeepSelector {
    profile: Profile,
    sort_keys: Vec<SortKey>,
    similarity: SimilarityConfig,
    exists: ExistenceCheck,
}

impl std::fmt::Debug for KeepSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeepSelector")
            .field("profile", &self.profile)
            .field("sort_keys", &self.sort_keys)
            .field("similarity", &self.similarity)
            .finish_non_exhaustive()
    }
}

impl KeepSelector {
    /// Create a selector for `profile` that checks keeps on the local disk.
    #[must_use]
    pub fn new(profile: Profile) -> Self {
        Self {
            profile,
            sort_keys: Vec::new(),
            similarity: SimilarityConfig::default(),
            exists: Box::new(|p: &Path| p.exists()),
        }
    }

    /// Set caller sort keys.
    #[must_use]
    pub fn with_sort_keys(mut self, keys: Vec<SortKey>) -> Self {
        self.sort_keys = keys;
        self
    }

    /// Set the similarity filter.
    #[must_use]
    pub fn with_similarity(mut self, similarity: SimilarityConfig) -> Self {
        self.similarity = similarity;
        self
    }

    /// Replace the on-disk existence check used for local keeps.
    #[must_use]
    pub fn with_existence_check<F>(mut self, check: F) -> Self
    where
        F: Fn(&Path) -> bool + Send + Sync + 'static,
    {
        self.exists = Box::new(check);
        self
    }

    /// Decide what to keep and what to remove in `group`.
    ///
    /// Returns `None` when nothing in the group is eligible for removal, and
    /// otherwise records the decision in `claims`.
    pub fn decide(&self, group: CandidateGroup, claims: &mut ClaimSet) -> Option<DuplicateDecision> {
        let mut members: Vec<MediaRecord> = group
            .records
            .into_iter()
            .filter(|r| !claims.is_claimed_duplicate(&r.path))
            .collect();
        if members.len() < 2 {
            return None;
        }

        rank_group(&mut members, &self.sort_keys);
        let members = self.similarity.filter(members);
        let (keep, rest) = members.split_first()?;

        if keep.location == Location::Local && !(self.exists)(&keep.fs_path()) {
            log::warn!("Keep candidate no longer exists, skipping group: {}", keep.path);
            return None;
        }

        let duplicates: Vec<DuplicateEntry> = rest
            .iter()
            .filter(|r| !same_file(keep, r))
            .filter(|r| {
                let unbacked = keep.location.is_remote() && r.location == Location::Local;
                if unbacked {
                    log::debug!("Remote keep {} cannot replace local {}", keep.path, r.path);
                }
                !unbacked
            })
            .filter(|r| {
                let claimed = claims.is_claimed_keep(&r.path);
                if claimed {
                    log::debug!("Already kept elsewhere, not a duplicate: {}", r.path);
                }
                !claimed
            })
            .filter(|r| !self.profile.uses_duration_tolerance() || self.profile.matches(keep, r))
            .map(DuplicateEntry::from_record)
            .collect();

        if duplicates.is_empty() {
            return None;
        }

        let decision = DuplicateDecision {
            keep_path: keep.path.clone(),
            duplicates,
        };
        log::debug!(
            "Keep {} over {} duplicate(s)",
            decision.keep_path,
            decision.duplicate_count()
        );
        claims.claim(&decision);
        Some(decision)
    }
}
