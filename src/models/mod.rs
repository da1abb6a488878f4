//! Core data models for the chunked file-storage service.
//!
//! These entities describe upload sessions in flight and the artifacts a
//! finalized upload produces. They serialize naturally as JSON via `serde`.

pub mod artifact;
pub mod session;
