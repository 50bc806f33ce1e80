//! Error types for media operations.

use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while capturing, annotating or encoding frames.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("Camera unavailable: {0}")]
    CameraUnavailable(String),

    #[error("Camera not opened")]
    NotOpened,

    #[error("Frame read failed: {0}")]
    ReadFailed(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Font load failed: {0}")]
    Font(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn camera_unavailable(message: impl Into<String>) -> Self {
        Self::CameraUnavailable(message.into())
    }

    pub fn read_failed(message: impl Into<String>) -> Self {
        Self::ReadFailed(message.into())
    }

    pub fn invalid_frame(message: impl Into<String>) -> Self {
        Self::InvalidFrame(message.into())
    }
}
