//! Represents an in-progress chunked upload session.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Point-in-time view of an upload session, as reported to resumable clients.
///
/// The indices are sorted so a client can diff them against the chunks it has
/// produced and resend only what is missing.
#[derive(Serialize, Clone, Debug)]
pub struct SessionStatus {
    /// Opaque session identifier handed out at init.
    pub session_id: Uuid,

    /// Sorted indices of every chunk accepted so far.
    pub received_indices: Vec<u64>,

    /// Timestamp when the session was initialized.
    pub created_at: DateTime<Utc>,

    /// Declared chunk count; known only once finish has been attempted.
    pub total_chunks: Option<u64>,
}
