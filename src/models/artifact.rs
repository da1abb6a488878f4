//! Represents a finalized artifact produced by merging a session's chunks.

use serde::Serialize;
use std::path::PathBuf;

/// Result of merging an upload session into permanent storage.
///
/// The artifact is stored under `filename` (display name, disambiguated on
/// collision); the SHA-256 digest is reported to the caller but is not the
/// storage key.
#[derive(Serialize, Clone, Debug)]
pub struct FinalizedArtifact {
    /// Content digest in lowercase hex, doubling as the artifact id.
    pub artifact_id: String,

    /// Final name the artifact was stored under.
    pub filename: String,

    /// Total merged size in bytes.
    pub size: u64,

    /// SHA-256 over the full merged byte stream, computed during the merge.
    pub sha256: String,

    /// Absolute location on disk. Not serialized; internal bookkeeping only.
    #[serde(skip)]
    pub path: PathBuf,
}
