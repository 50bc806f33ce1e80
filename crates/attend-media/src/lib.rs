//! Camera capture and live preview for the attendance engine.
//!
//! This crate provides:
//! - The [`Frame`] type and JPEG encoding
//! - Camera frame sources (FFmpeg `rawvideo` pipe, OpenCV behind the `opencv` feature)
//! - Face box annotation of preview frames
//! - The shared preview buffer

pub mod annotate;
pub mod error;
pub mod frame;
pub mod glyphs;
#[cfg(feature = "opencv")]
pub mod opencv_camera;
pub mod preview;
pub mod source;

pub use annotate::Annotator;
pub use error::{MediaError, MediaResult};
pub use frame::{encode_jpeg, Frame, DEFAULT_JPEG_QUALITY};
#[cfg(feature = "opencv")]
pub use opencv_camera::{OpenCvCamera, OpenCvCameraFactory};
pub use preview::PreviewBuffer;
pub use source::{CameraConfig, FfmpegCamera, FrameSource, FrameSourceFactory};
