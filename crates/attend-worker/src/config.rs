//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

use attend_media::CameraConfig;

use crate::resolver::ResolverPolicy;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Hard limit on a single session
    pub max_duration: Duration,
    /// Accepted identifications needed to confirm an identity
    pub vote_required: u32,
    /// Run detection on every Nth frame
    pub detect_every: u64,
    /// Downscale factor applied before detection, in (0, 1]
    pub detection_scale: f32,
    /// Consecutive failed reads before the camera is given up on
    pub max_consecutive_read_failures: u32,
    /// Pause after a failed read
    pub read_retry_backoff: Duration,
    /// Persisted gallery blob
    pub gallery_path: PathBuf,
    /// Hand-maintained label overrides
    pub name_mapping_path: PathBuf,
    /// Roster of known identities (`[{rollNo, name}]`)
    pub roster_path: Option<PathBuf>,
    /// TrueType font for preview labels
    pub preview_font_path: Option<PathBuf>,
    /// Label stamped on the day's summary document
    pub class_label: Option<String>,
    pub camera: CameraConfig,
    pub resolver: ResolverPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_duration: Duration::from_secs(600), // 10 minutes
            vote_required: 3,
            detect_every: 6,
            detection_scale: 0.5,
            max_consecutive_read_failures: 200, // ~10s of 50ms retries
            read_retry_backoff: Duration::from_millis(50),
            gallery_path: PathBuf::from("model/gallery.json"),
            name_mapping_path: PathBuf::from("model/name_mapping.json"),
            roster_path: None,
            preview_font_path: None,
            class_label: None,
            camera: CameraConfig::default(),
            resolver: ResolverPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_duration: Duration::from_secs(
                std::env::var("CAM_MAX_DURATION")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
            vote_required: std::env::var("CAM_VOTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3u32)
                .max(1),
            detect_every: std::env::var("CAM_DETECT_EVERY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(6u64)
                .max(1),
            detection_scale: sanitize_scale(
                std::env::var("CAM_SCALE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0.5),
            ),
            max_consecutive_read_failures: std::env::var("CAM_MAX_READ_FAILURES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(200u32)
                .max(1),
            read_retry_backoff: Duration::from_millis(50),
            gallery_path: std::env::var("GALLERY_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("model/gallery.json")),
            name_mapping_path: std::env::var("NAME_MAPPING_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("model/name_mapping.json")),
            roster_path: non_empty_var("ROSTER_PATH").map(PathBuf::from),
            preview_font_path: non_empty_var("PREVIEW_FONT_PATH").map(PathBuf::from),
            class_label: non_empty_var("CLASS_LABEL"),
            camera: CameraConfig::from_env(),
            resolver: ResolverPolicy::from_env(),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Scales outside (0, 1] disable downscaling.
fn sanitize_scale(scale: f32) -> f32 {
    if scale.is_finite() && scale > 0.0 && scale <= 1.0 {
        scale
    } else {
        1.0
    }
}
