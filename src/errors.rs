use crate::services::{artifact_store::DownloadError, upload_service::UploadError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for general errors that keeps the message local.
///
/// `details` carries optional structured context a client can act on,
/// e.g. the missing chunk indices of an incomplete upload.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
            details: None,
        }
    }

    /// Attach structured detail to the error body.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": self.message,
            "status": self.status.as_u16()
        });
        if let Some(details) = self.details {
            body["details"] = details;
        }

        (self.status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        let status = match &err {
            UploadError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            UploadError::ChunkTooLarge { .. } => StatusCode::BAD_REQUEST,
            UploadError::IncompleteUpload { .. } => StatusCode::BAD_REQUEST,
            UploadError::InvalidFilename => StatusCode::BAD_REQUEST,
            UploadError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let details = match &err {
            UploadError::IncompleteUpload { missing } => Some(json!({ "missing": missing })),
            _ => None,
        };
        Self {
            status,
            message: err.to_string(),
            details,
        }
    }
}

impl From<DownloadError> for AppError {
    fn from(err: DownloadError) -> Self {
        let status = match &err {
            DownloadError::NotFound(_) => StatusCode::NOT_FOUND,
            DownloadError::InvalidName => StatusCode::BAD_REQUEST,
            DownloadError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}
