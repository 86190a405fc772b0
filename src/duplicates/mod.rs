//! Duplicate detection and resolution.
//!
//! This module provides:
//! - Profile-keyed candidate grouping ([`profile`])
//! - Content verification for the filesystem profile ([`verifier`])
//! - Path-similarity filtering ([`similarity`])
//! - Keep ranking and claim tracking ([`keep`])
//! - The end-to-end run ([`engine`])

pub mod engine;
pub mod groups;
pub mod keep;
pub mod profile;
pub mod similarity;
pub mod verifier;

pub use engine::{DedupeEngine, EngineError, Report, RunOptions};
pub use groups::{CandidateGroup, DuplicateDecision, DuplicateEntry};
pub use keep::{parse_sort_keys, rank_group, ClaimSet, KeepSelector, SortColumn, SortKey};
pub use profile::{CandidateGroups, MatchStats, Profile, ProfileMatcher, DURATION_TOLERANCE_SECS};
pub use similarity::{similarity_ratio, SimilarityConfig, DEFAULT_MIN_SIMILARITY_RATIO};
pub use verifier::{FilesystemVerifier, VerifierConfig, VerifyError, VerifyStats};
