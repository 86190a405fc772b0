//! BLAKE3 content hashing for duplicate verification.
//!
//! # Overview
//!
//! Two digests are computed per file:
//!
//! - **Sample hash**: a cheap digest over a few fixed-size chunks spread
//!   across the file (start, quarter points, end). It never reads a large
//!   file in full and is reproducible for unchanged content, which makes it
//!   safe to cache in the catalog.
//! - **Full hash**: a digest over the entire byte stream. This is the only
//!   digest allowed to declare two paths byte-identical.
//!
//! Neither operation caches anything; caching sample hashes is the
//! verifier's job.
//!
//! # Example
//!
//! ```no_run
//! use mediadedupe::hasher::{hash_to_hex, Hasher};
//! use std::path::Path;
//!
//! let hasher = Hasher::new();
//! let sample = hasher.sample_hash(Path::new("movie.mkv")).unwrap();
//! let full = hasher.full_hash(Path::new("movie.mkv")).unwrap();
//! println!("{} {}", hash_to_hex(&sample), hash_to_hex(&full));
//! ```

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use memmap2::Mmap;

/// A 256-bit BLAKE3 digest.
pub type Hash = [u8; 32];

/// Size of each sampled chunk (64 KiB).
pub const SAMPLE_CHUNK_SIZE: u64 = 64 * 1024;

/// Number of chunks read for a sample hash.
pub const SAMPLE_SEGMENTS: u64 = 5;

/// Files at or below this size are sampled in full.
pub const SAMPLE_WHOLE_FILE_LIMIT: u64 = SAMPLE_CHUNK_SIZE * SAMPLE_SEGMENTS;

/// Streaming buffer size for full hashes.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Default size above which full hashes use memory mapping.
pub const DEFAULT_MMAP_THRESHOLD: u64 = 64 * 1024 * 1024;

/// Errors that can occur during file hashing.
#[derive(thiserror::Error, Debug, Clone)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Hashing stopped because shutdown was requested.
    #[error("Hashing interrupted: {0}")]
    Interrupted(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: Arc<io::Error>,
    },
}

impl HashError {
    fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: Arc::new(err),
            },
        }
    }

    /// Path associated with this error.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(p) | Self::PermissionDenied(p) | Self::Interrupted(p) => p,
            Self::Io { path, .. } => path,
        }
    }
}

/// Content hasher producing sample and full BLAKE3 digests.
#[derive(Debug, Clone)]
pub struct Hasher {
    use_mmap: bool,
    mmap_threshold: u64,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Create a hasher with memory mapping enabled above 64 MiB.
    #[must_use]
    pub fn new() -> Self {
        Self {
            use_mmap: true,
            mmap_threshold: DEFAULT_MMAP_THRESHOLD,
            shutdown_flag: None,
        }
    }

    /// Enable or disable memory-mapped full hashing.
    #[must_use]
    pub fn with_mmap(mut self, enabled: bool) -> Self {
        self.use_mmap = enabled;
        self
    }

    /// Set the file size above which full hashes are memory-mapped.
    #[must_use]
    pub fn with_mmap_threshold(mut self, bytes: u64) -> Self {
        self.mmap_threshold = bytes;
        self
    }

    /// Abort streaming reads between buffers once this flag is set.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Compute the sample hash of a file.
    ///
    /// Reads [`SAMPLE_SEGMENTS`] chunks of [`SAMPLE_CHUNK_SIZE`] bytes at
    /// evenly spaced offsets, the last one aligned to the end of the file.
    /// Files no larger than [`SAMPLE_WHOLE_FILE_LIMIT`] are hashed whole,
    /// so their sample hash equals their full hash.
    ///
    /// # Errors
    ///
    /// Returns `HashError` if the file cannot be opened or read.
    pub fn sample_hash(&self, path: &Path) -> Result<Hash, HashError> {
        let mut file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        let size = file
            .metadata()
            .map_err(|e| HashError::from_io(path, e))?
            .len();

        if size <= SAMPLE_WHOLE_FILE_LIMIT {
            return self.hash_stream(path, &mut file);
        }

        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0u8; SAMPLE_CHUNK_SIZE as usize];
        for offset in sample_offsets(size) {
            file.seek(SeekFrom::Start(offset))
                .map_err(|e| HashError::from_io(path, e))?;
            file.read_exact(&mut buffer)
                .map_err(|e| HashError::from_io(path, e))?;
            hasher.update(&buffer);
        }

        log::trace!("Sample hash computed: {}", path.display());
        Ok(*hasher.finalize().as_bytes())
    }

    /// Compute the full content hash of a file.
    ///
    /// # Errors
    ///
    /// Returns `HashError` if the file cannot be opened or read, or if
    /// shutdown was requested mid-stream.
    pub fn full_hash(&self, path: &Path) -> Result<Hash, HashError> {
        let mut file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        let size = file
            .metadata()
            .map_err(|e| HashError::from_io(path, e))?
            .len();

        if self.use_mmap && size > self.mmap_threshold {
            // SAFETY: the map is read-only and dropped before returning. A file
            // truncated concurrently may raise SIGBUS; duplicate candidates are
            // not expected to be written while a run is verifying them.
            match unsafe { Mmap::map(&file) } {
                Ok(map) => {
                    let mut hasher = blake3::Hasher::new();
                    hasher.update_rayon(&map);
                    return Ok(*hasher.finalize().as_bytes());
                }
                Err(e) => {
                    log::debug!(
                        "mmap failed for {}, falling back to streaming: {}",
                        path.display(),
                        e
                    );
                }
            }
        }

        self.hash_stream(path, &mut file)
    }

    fn hash_stream(&self, path: &Path, reader: &mut impl Read) -> Result<Hash, HashError> {
        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0u8; READ_BUFFER_SIZE];
        loop {
            if self.is_shutdown_requested() {
                return Err(HashError::Interrupted(path.to_path_buf()));
            }
            let n = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(HashError::from_io(path, e)),
            };
            hasher.update(&buffer[..n]);
        }
        Ok(*hasher.finalize().as_bytes())
    }
}

/// Chunk offsets used for the sample hash of a file of `size` bytes.
///
/// Only meaningful for files larger than [`SAMPLE_WHOLE_FILE_LIMIT`].
fn sample_offsets(size: u64) -> Vec<u64> {
    let last = size - SAMPLE_CHUNK_SIZE;
    (0..SAMPLE_SEGMENTS)
        .map(|i| last * i / (SAMPLE_SEGMENTS - 1))
        .collect()
}

/// Convert a hash to a lowercase hexadecimal string.
#[must_use]
pub fn hash_to_hex(hash: &Hash) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}
