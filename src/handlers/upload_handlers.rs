//! HTTP handlers for the chunked upload pipeline.
//!
//! Chunk bodies arrive raw; session id, index and finalize parameters are
//! query-borne so clients can stream chunks without multipart framing.

use crate::{
    errors::AppError,
    models::{artifact::FinalizedArtifact, session::SessionStatus},
    services::upload_service::UploadService,
};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct PutChunkQuery {
    pub session_id: Uuid,
    /// Zero-based chunk index.
    pub index: u64,
}

#[derive(Debug, Deserialize)]
pub struct FinishQuery {
    pub session_id: Uuid,
    /// Display name requested for the finished artifact.
    pub filename: String,
    pub total_chunks: u64,
}

#[derive(Debug, Serialize)]
pub struct ChunkAck {
    pub session_id: Uuid,
    pub index: u64,
    pub size: usize,
}

/// `POST /upload/init` — allocate a fresh upload session.
pub async fn init_upload(
    State(uploads): State<UploadService>,
) -> Result<Json<SessionStatus>, AppError> {
    let session = uploads.init_upload().await?;
    Ok(Json(session))
}

/// `POST /upload/chunk?session_id=&index=` — persist one chunk body.
///
/// Replaying an index the session already holds returns success without
/// rewriting anything.
pub async fn put_chunk(
    State(uploads): State<UploadService>,
    Query(query): Query<PutChunkQuery>,
    body: Bytes,
) -> Result<Json<ChunkAck>, AppError> {
    let size = uploads.put_chunk(query.session_id, query.index, body).await?;
    Ok(Json(ChunkAck {
        session_id: query.session_id,
        index: query.index,
        size,
    }))
}

/// `POST /upload/finish?session_id=&filename=&total_chunks=` — merge all
/// chunks into one artifact and retire the session.
pub async fn finish_upload(
    State(uploads): State<UploadService>,
    Query(query): Query<FinishQuery>,
) -> Result<Json<FinalizedArtifact>, AppError> {
    let artifact = uploads
        .finish(query.session_id, &query.filename, query.total_chunks)
        .await?;
    Ok(Json(artifact))
}

/// `GET /upload/status/{id}` — which chunks have arrived, for resumable
/// clients probing what remains to send.
pub async fn upload_status(
    State(uploads): State<UploadService>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionStatus>, AppError> {
    let status = uploads.status(session_id).await?;
    Ok(Json(status))
}
