//! Defines routes for the upload pipeline and the download server.
//!
//! ## Structure
//! - **Upload endpoints**
//!   - `POST /upload/init`         — allocate an upload session
//!   - `POST /upload/chunk`        — persist one chunk (raw body)
//!   - `POST /upload/finish`       — merge chunks into an artifact
//!   - `GET  /upload/status/{id}`  — resumable-client progress probe
//!
//! - **Download endpoints**
//!   - `GET  /download/{*artifact}` — full or Range-limited body
//!   - `HEAD /download/{*artifact}` — framing headers only
//!
//! The wildcard `*artifact` tolerates display names containing dots and
//! other non-segment characters.

use crate::{
    handlers::{
        download_handlers::{download_artifact, head_artifact},
        health_handlers::{healthz, readyz},
        upload_handlers::{finish_upload, init_upload, put_chunk, upload_status},
    },
    services::{artifact_store::ArtifactStore, upload_service::UploadService},
};
use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef},
    routing::{get, post},
};

/// Shared state carried to all handlers.
#[derive(Clone, FromRef)]
pub struct AppState {
    pub uploads: UploadService,
    pub artifacts: ArtifactStore,
}

/// Build and return the application router.
///
/// The chunk endpoint raises axum's default body limit to the negotiated
/// chunk size (plus slack); oversize bodies beyond that are rejected by the
/// service with a structured error.
pub fn routes(max_chunk_bytes: usize) -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // upload pipeline
        .route("/upload/init", post(init_upload))
        .route(
            "/upload/chunk",
            post(put_chunk).layer(DefaultBodyLimit::max(max_chunk_bytes + 1024)),
        )
        .route("/upload/finish", post(finish_upload))
        .route("/upload/status/{id}", get(upload_status))
        // download server
        .route(
            "/download/{*artifact}",
            get(download_artifact).head(head_artifact),
        )
}
