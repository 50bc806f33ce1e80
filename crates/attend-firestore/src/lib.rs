//! Firestore REST API client for attendance presence.
//!
//! This crate provides:
//! - Service account authentication via gcp_auth with a cached token
//! - Atomic commits of field-masked upserts
//! - Retry of transient failures with backoff
//! - The presence repository used by the attendance engine

pub mod client;
pub mod error;
pub mod metrics;
pub mod presence_repo;
pub mod retry;
pub mod token_cache;
pub mod types;

#[cfg(test)]
mod client_tests;

pub use client::{FirestoreClient, FirestoreConfig};
pub use error::{FirestoreError, FirestoreResult};
pub use presence_repo::PresenceRepository;
pub use retry::RetryConfig;
pub use types::{Document, FromFirestoreValue, ToFirestoreValue, Value, Write};
