//! Engine error types.

use attend_models::{IdentityId, SessionDateError};
use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Face detection not available: {0}")]
    Unavailable(String),

    #[error("Already running")]
    AlreadyRunning,

    #[error("Not running")]
    NotRunning,

    #[error(transparent)]
    InvalidDate(#[from] SessionDateError),

    #[error("Camera acquisition failed: {0}")]
    AcquisitionFailure(String),

    #[error("Face detection failed: {0}")]
    DetectionFailure(String),

    #[error("Presence write failed: {0}")]
    WriteFailure(String),

    #[error("Label '{label}' is ambiguous (matches: {candidates:?})")]
    MappingAmbiguity {
        label: String,
        candidates: Vec<IdentityId>,
    },

    #[error("Gallery error: {0}")]
    Gallery(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session worker panicked: {0}")]
    WorkerPanic(String),

    #[error("Media error: {0}")]
    Media(#[from] attend_media::MediaError),

    #[error("Recognition service error: {0}")]
    MlClient(#[from] attend_ml_client::MlClientError),

    #[error("Firestore error: {0}")]
    Firestore(#[from] attend_firestore::FirestoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn acquisition_failure(msg: impl Into<String>) -> Self {
        Self::AcquisitionFailure(msg.into())
    }

    pub fn detection_failure(msg: impl Into<String>) -> Self {
        Self::DetectionFailure(msg.into())
    }

    pub fn write_failure(msg: impl Into<String>) -> Self {
        Self::WriteFailure(msg.into())
    }

    pub fn gallery(msg: impl Into<String>) -> Self {
        Self::Gallery(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Refusals of a control request, as opposed to failures of the pipeline.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::AlreadyRunning | Self::NotRunning | Self::InvalidDate(_)
        )
    }
}
