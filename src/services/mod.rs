//! Core services: the upload session registry with its finalizer, and the
//! read-side artifact store with pure range planning.

pub mod artifact_store;
pub mod finalizer;
pub mod range_planner;
pub mod upload_service;
