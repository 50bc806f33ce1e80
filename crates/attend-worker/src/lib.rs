//! Camera attendance confirmation engine.
//!
//! This crate provides:
//! - Identity registry and label-to-identity name mapping
//! - Gallery loading and adaptive-threshold identification
//! - Multi-frame voting and presence commits
//! - The session controller driving the capture worker

pub mod config;
pub mod error;
pub mod gallery;
pub mod logging;
pub mod metrics;
pub mod name_mapping;
pub mod presence;
pub mod registry;
pub mod resolver;
pub mod session;
pub mod similarity;
pub mod voting;


pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use gallery::{Gallery, GalleryLoader};
pub use logging::SessionLogger;
pub use name_mapping::{MappingReport, NameMapping};
pub use presence::{FirestorePresenceWriter, NoopPresenceWriter, PresenceWriter};
pub use registry::IdentityRegistry;
pub use resolver::{Identification, IdentityResolver, ResolverPolicy};
pub use session::{Collaborators, Recognition, SessionController};
pub use voting::VoteTable;
