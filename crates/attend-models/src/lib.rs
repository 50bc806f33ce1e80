//! Shared data models for the attendance engine.
//!
//! This crate provides Serde-serializable types for:
//! - Identities (roll numbers and display names)
//! - Session lifecycle state and status snapshots
//! - Face boxes drawn on the live preview
//! - Presence records written to the attendance store

pub mod face_box;
pub mod identity;
pub mod presence;
pub mod session;

// Re-export common types
pub use face_box::FaceBox;
pub use identity::{IdentityId, IdentityRecord};
pub use presence::{PresenceRecord, PresenceSource, PresenceStatus};
pub use session::{
    SessionDate, SessionDateError, SessionState, SessionStatus, StartOutcome, StopOutcome,
};
