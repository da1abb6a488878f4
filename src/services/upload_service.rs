//! Upload session registry and the chunked-upload pipeline.
//!
//! The registry is an injectable, lock-protected table of open sessions:
//! the outer `RwLock` guards the key space and is only ever held briefly,
//! while each session carries its own `Mutex` so chunk writes for one
//! session never stall another session's operations. A chunk is marked
//! received only after its bytes are durably renamed into place, and the
//! completeness check in `finish` runs under the same per-session lock that
//! admits chunks, so finalization can never act on a stale received set.

use crate::models::{artifact::FinalizedArtifact, session::SessionStatus};
use crate::services::finalizer;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::{
    collections::{BTreeSet, HashMap},
    io,
    path::PathBuf,
    sync::Arc,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
    sync::{Mutex, RwLock},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload session `{0}` not found or expired")]
    SessionNotFound(Uuid),
    #[error("chunk size {size} exceeds limit ({limit} bytes)")]
    ChunkTooLarge { size: usize, limit: usize },
    #[error("upload incomplete, missing chunks {missing:?}")]
    IncompleteUpload { missing: Vec<u64> },
    #[error("invalid filename")]
    InvalidFilename,
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type UploadResult<T> = Result<T, UploadError>;

const MAX_FILENAME_LEN: usize = 255;

/// Mutable state of one open session, guarded by its own mutex.
struct SessionState {
    chunk_dir: PathBuf,
    received: BTreeSet<u64>,
    created_at: DateTime<Utc>,
    total_chunks: Option<u64>,
    /// Set once the session has been finalized or reaped; late callers
    /// holding a stale handle are answered with `SessionNotFound`.
    closed: bool,
}

/// Handles the init/put/finish lifecycle of chunked uploads.
///
/// Cheap to clone; all clones share one registry.
#[derive(Clone)]
pub struct UploadService {
    inner: Arc<Registry>,
}

struct Registry {
    sessions: RwLock<HashMap<Uuid, Arc<Mutex<SessionState>>>>,
    upload_root: PathBuf,
    storage_root: PathBuf,
    max_chunk_bytes: usize,
}

impl UploadService {
    /// Create a registry rooted at `upload_root` for scratch chunks and
    /// `storage_root` for finalized artifacts.
    pub fn new(
        upload_root: impl Into<PathBuf>,
        storage_root: impl Into<PathBuf>,
        max_chunk_bytes: usize,
    ) -> Self {
        Self {
            inner: Arc::new(Registry {
                sessions: RwLock::new(HashMap::new()),
                upload_root: upload_root.into(),
                storage_root: storage_root.into(),
                max_chunk_bytes,
            }),
        }
    }

    /// Allocate a fresh session and its chunk scratch directory.
    pub async fn init_upload(&self) -> UploadResult<SessionStatus> {
        let session_id = Uuid::new_v4();
        let chunk_dir = self.inner.upload_root.join(session_id.to_string());
        fs::create_dir_all(&chunk_dir).await?;

        let created_at = Utc::now();
        let state = SessionState {
            chunk_dir,
            received: BTreeSet::new(),
            created_at,
            total_chunks: None,
            closed: false,
        };
        self.inner
            .sessions
            .write()
            .await
            .insert(session_id, Arc::new(Mutex::new(state)));

        info!("upload initialized: session_id={}", session_id);
        Ok(SessionStatus {
            session_id,
            received_indices: Vec::new(),
            created_at,
            total_chunks: None,
        })
    }

    /// Persist one chunk. Re-submitting an already-received index is a
    /// no-op that reports success, so clients can blindly retry.
    pub async fn put_chunk(&self, session_id: Uuid, index: u64, data: Bytes) -> UploadResult<usize> {
        let slot = self.session(session_id).await?;
        let mut state = slot.lock().await;
        if state.closed {
            return Err(UploadError::SessionNotFound(session_id));
        }

        if data.len() > self.inner.max_chunk_bytes {
            return Err(UploadError::ChunkTooLarge {
                size: data.len(),
                limit: self.inner.max_chunk_bytes,
            });
        }

        if state.received.contains(&index) {
            debug!(
                "chunk already uploaded, skipping: session_id={}, chunk={}",
                session_id, index
            );
            return Ok(data.len());
        }

        // Write to a temporary name and rename so a failed write can never
        // surface as a received chunk.
        let tmp_path = state.chunk_dir.join(format!(".part-{}", Uuid::new_v4()));
        let chunk_path = state.chunk_dir.join(finalizer::chunk_file_name(index));
        if let Err(err) = write_chunk_file(&tmp_path, &data).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }
        if let Err(err) = fs::rename(&tmp_path, &chunk_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }
        state.received.insert(index);

        debug!(
            "chunk uploaded: session_id={}, chunk={}, size={}",
            session_id,
            index,
            data.len()
        );
        Ok(data.len())
    }

    /// Report which chunks a session has accepted so far.
    pub async fn status(&self, session_id: Uuid) -> UploadResult<SessionStatus> {
        let slot = self.session(session_id).await?;
        let state = slot.lock().await;
        if state.closed {
            return Err(UploadError::SessionNotFound(session_id));
        }
        Ok(SessionStatus {
            session_id,
            received_indices: state.received.iter().copied().collect(),
            created_at: state.created_at,
            total_chunks: state.total_chunks,
        })
    }

    /// Merge a complete session into permanent storage and retire it.
    ///
    /// The session is destroyed only after the artifact is durably written;
    /// on any failure it stays intact so the client can retry.
    pub async fn finish(
        &self,
        session_id: Uuid,
        filename: &str,
        total_chunks: u64,
    ) -> UploadResult<FinalizedArtifact> {
        ensure_filename_safe(filename)?;

        let slot = self.session(session_id).await?;
        let mut state = slot.lock().await;
        if state.closed {
            return Err(UploadError::SessionNotFound(session_id));
        }
        state.total_chunks = Some(total_chunks);

        let missing: Vec<u64> = (0..total_chunks)
            .filter(|index| !state.received.contains(index))
            .collect();
        if !missing.is_empty() || state.received.len() as u64 != total_chunks {
            return Err(UploadError::IncompleteUpload { missing });
        }

        let artifact = finalizer::merge_session(
            &state.chunk_dir,
            total_chunks,
            &self.inner.storage_root,
            filename,
        )
        .await?;

        state.closed = true;
        self.inner.sessions.write().await.remove(&session_id);
        if let Err(err) = fs::remove_dir_all(&state.chunk_dir).await {
            warn!(
                "failed to clean scratch dir {}: {}",
                state.chunk_dir.display(),
                err
            );
        }

        info!(
            "upload finished: session_id={}, artifact_id={}, filename={}, size={}",
            session_id, artifact.artifact_id, artifact.filename, artifact.size
        );
        Ok(artifact)
    }

    /// Remove sessions older than `ttl_secs`, deleting their scratch
    /// directories. Returns how many sessions were reaped.
    pub async fn reap_expired(&self, ttl_secs: u64) -> usize {
        let candidates: Vec<(Uuid, Arc<Mutex<SessionState>>)> = {
            let sessions = self.inner.sessions.read().await;
            sessions
                .iter()
                .map(|(id, slot)| (*id, slot.clone()))
                .collect()
        };

        let now = Utc::now();
        let mut reaped = 0;
        for (session_id, slot) in candidates {
            let mut state = slot.lock().await;
            if state.closed {
                continue;
            }
            let age = now.signed_duration_since(state.created_at);
            if age.num_seconds() < ttl_secs as i64 {
                continue;
            }
            state.closed = true;
            if let Err(err) = fs::remove_dir_all(&state.chunk_dir).await {
                if err.kind() != io::ErrorKind::NotFound {
                    warn!(
                        "failed to remove scratch dir {} while reaping: {}",
                        state.chunk_dir.display(),
                        err
                    );
                }
            }
            drop(state);
            self.inner.sessions.write().await.remove(&session_id);
            info!("reaped expired upload session {}", session_id);
            reaped += 1;
        }
        reaped
    }

    /// Look up a session handle without holding the registry lock.
    async fn session(&self, session_id: Uuid) -> UploadResult<Arc<Mutex<SessionState>>> {
        self.inner
            .sessions
            .read()
            .await
            .get(&session_id)
            .cloned()
            .ok_or(UploadError::SessionNotFound(session_id))
    }
}

async fn write_chunk_file(path: &std::path::Path, data: &Bytes) -> io::Result<()> {
    let mut file = File::create(path).await?;
    file.write_all(data).await?;
    file.flush().await?;
    Ok(())
}

/// Display names become storage file names directly, so reject anything
/// that would escape the storage root or break header encoding later.
fn ensure_filename_safe(filename: &str) -> UploadResult<()> {
    if filename.is_empty() || filename.len() > MAX_FILENAME_LEN {
        return Err(UploadError::InvalidFilename);
    }
    if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
        return Err(UploadError::InvalidFilename);
    }
    if filename.bytes().any(|b| b.is_ascii_control()) {
        return Err(UploadError::InvalidFilename);
    }
    Ok(())
}
