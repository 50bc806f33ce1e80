//! Client for the face recognition service.
//!
//! This crate provides:
//! - `FaceDetector` / `FaceEmbedder` traits consumed by the engine
//! - `MlClient`, their HTTP implementation with detector fallback

pub mod client;
pub mod error;
pub mod traits;
pub mod types;

pub use client::{MlClient, MlClientConfig};
pub use error::{MlClientError, MlClientResult};
pub use traits::{BoundingBox, DetectedFace, FaceDetector, FaceEmbedder};
