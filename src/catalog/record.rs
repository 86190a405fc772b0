//! Catalog record definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where a record's content lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    /// A path on a locally mounted filesystem.
    #[default]
    Local,
    /// A remote URL; never removed physically by this crate.
    Remote,
}

impl Location {
    /// Classify a catalog path.
    ///
    /// Anything carrying a URL scheme (`scheme://...`) other than `file://`
    /// is remote. Windows drive letters (`C:\`) are local.
    #[must_use]
    pub fn classify(path: &str) -> Self {
        match path.split_once("://") {
            Some((scheme, _))
                if scheme.len() > 1
                    && !scheme.eq_ignore_ascii_case("file")
                    && scheme
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) =>
            {
                Self::Remote
            }
            _ => Self::Local,
        }
    }

    /// Whether this is a remote location.
    #[must_use]
    pub fn is_remote(self) -> bool {
        self == Self::Remote
    }
}

/// The part after `file://` (and an optional `localhost` host), undecoded.
#[must_use]
pub fn strip_file_url(path: &str) -> Option<&str> {
    let (scheme, rest) = path.split_once("://")?;
    if !scheme.eq_ignore_ascii_case("file") {
        return None;
    }
    Some(match rest.strip_prefix("localhost") {
        Some(after) if after.starts_with('/') => after,
        _ => rest,
    })
}

/// Filesystem path for a catalog path.
///
/// `file://` URLs are stripped and percent-decoded; everything else is used
/// as is.
#[must_use]
pub fn local_path(path: &str) -> PathBuf {
    match strip_file_url(path) {
        Some(rest) => match urlencoding::decode(rest) {
            Ok(decoded) => PathBuf::from(decoded.into_owned()),
            Err(_) => PathBuf::from(rest),
        },
        None => PathBuf::from(path),
    }
}

/// Media stream counts (type flags) for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreamCounts {
    /// Number of audio streams
    pub audio: u32,
    /// Number of video streams
    pub video: u32,
    /// Number of subtitle streams
    pub subtitle: u32,
}

/// One row of the media catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    /// Unique identifier (filesystem path or URL)
    pub path: String,
    /// Local or remote, classified when the record was read
    pub location: Location,
    /// Size in bytes as stored in the catalog; negative means malformed
    pub size: i64,
    /// Duration in seconds, absent for non-media files
    pub duration: Option<f64>,
    /// Media title
    pub title: Option<String>,
    /// Performing artist
    pub artist: Option<String>,
    /// Album name
    pub album: Option<String>,
    /// Identifier assigned by the extractor that downloaded the media
    pub extractor_id: Option<String>,
    /// Uploader or channel name
    pub uploader: Option<String>,
    /// Audio/video/subtitle stream counts
    pub streams: StreamCounts,
    /// Last modification time (unix seconds)
    pub time_modified: i64,
    /// Creation time (unix seconds)
    pub time_created: i64,
    /// Deletion time (unix seconds), 0 while the record is alive
    pub time_deleted: i64,
    /// Cached sample hash (hex)
    pub sample_hash: Option<String>,
}

impl MediaRecord {
    /// Create a record with only a path and size; all other fields empty.
    #[must_use]
    pub fn new(path: impl Into<String>, size: i64) -> Self {
        let path = path.into();
        Self {
            location: Location::classify(&path),
            path,
            size,
            duration: None,
            title: None,
            artist: None,
            album: None,
            extractor_id: None,
            uploader: None,
            streams: StreamCounts::default(),
            time_modified: 0,
            time_created: 0,
            time_deleted: 0,
            sample_hash: None,
        }
    }

    /// Set the duration.
    #[must_use]
    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    /// Set title, artist and album at once.
    #[must_use]
    pub fn with_music(mut self, title: &str, artist: &str, album: &str) -> Self {
        self.title = Some(title.to_string());
        self.artist = Some(artist.to_string());
        self.album = Some(album.to_string());
        self
    }

    /// Set the title.
    #[must_use]
    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    /// Set the extractor id.
    #[must_use]
    pub fn with_extractor_id(mut self, id: &str) -> Self {
        self.extractor_id = Some(id.to_string());
        self
    }

    /// Set the uploader.
    #[must_use]
    pub fn with_uploader(mut self, uploader: &str) -> Self {
        self.uploader = Some(uploader.to_string());
        self
    }

    /// Set the stream counts.
    #[must_use]
    pub fn with_streams(mut self, audio: u32, video: u32, subtitle: u32) -> Self {
        self.streams = StreamCounts {
            audio,
            video,
            subtitle,
        };
        self
    }

    /// Set modification and creation times.
    #[must_use]
    pub fn with_times(mut self, modified: i64, created: i64) -> Self {
        self.time_modified = modified;
        self.time_created = created;
        self
    }

    /// Set the cached sample hash.
    #[must_use]
    pub fn with_sample_hash(mut self, hash: &str) -> Self {
        self.sample_hash = Some(hash.to_string());
        self
    }

    /// Path to open on the local filesystem.
    #[must_use]
    pub fn fs_path(&self) -> PathBuf {
        local_path(&self.path)
    }

    /// Whether the record has been marked deleted.
    #[must_use]
    pub fn deleted(&self) -> bool {
        self.time_deleted > 0
    }

    /// Size in bytes, or `None` for a malformed (negative) size.
    #[must_use]
    pub fn size_bytes(&self) -> Option<u64> {
        u64::try_from(self.size).ok()
    }

    /// Duration if present and well-formed (finite, non-negative).
    #[must_use]
    pub fn valid_duration(&self) -> Option<f64> {
        self.duration.filter(|d| d.is_finite() && *d >= 0.0)
    }

    /// Whether the path names a directory rather than a file.
    #[must_use]
    pub fn is_directory_path(&self) -> bool {
        self.path.ends_with('/') || self.path.ends_with(std::path::MAIN_SEPARATOR)
    }
}
