//! Prometheus metrics for the attendance engine.

use std::net::{Ipv4Addr, SocketAddr};

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::{EngineError, EngineResult};

/// Install the Prometheus exporter, serving `/metrics` on `port`.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(port: u16) -> EngineResult<()> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| EngineError::config(format!("Failed to install Prometheus exporter: {}", e)))
}

/// Metric names as constants for consistency.
pub mod names {
    // Session metrics
    pub const SESSIONS_STARTED_TOTAL: &str = "attend_sessions_started_total";
    pub const SESSIONS_FINISHED_TOTAL: &str = "attend_sessions_finished_total";
    pub const SESSION_ACTIVE: &str = "attend_session_active";

    // Capture metrics
    pub const FRAMES_TOTAL: &str = "attend_frames_total";
    pub const FRAME_READ_FAILURES_TOTAL: &str = "attend_frame_read_failures_total";
    pub const PREVIEW_FPS: &str = "attend_preview_fps";

    // Recognition metrics
    pub const DETECTIONS_TOTAL: &str = "attend_detections_total";
    pub const FACES_DETECTED_TOTAL: &str = "attend_faces_detected_total";
    pub const DETECTION_FAILURES_TOTAL: &str = "attend_detection_failures_total";
    pub const DETECTION_DURATION_SECONDS: &str = "attend_detection_duration_seconds";
    pub const IDENTIFICATIONS_TOTAL: &str = "attend_identifications_total";

    // Attendance metrics
    pub const VOTES_TOTAL: &str = "attend_votes_total";
    pub const CONFIRMATIONS_TOTAL: &str = "attend_confirmations_total";
    pub const COMMIT_FAILURES_TOTAL: &str = "attend_commit_failures_total";
}

/// Record a session start.
pub fn record_session_started() {
    counter!(names::SESSIONS_STARTED_TOTAL).increment(1);
    gauge!(names::SESSION_ACTIVE).set(1.0);
}

/// Record a session end with its outcome (`completed` or `failed`).
pub fn record_session_finished(outcome: &str) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::SESSIONS_FINISHED_TOTAL, &labels).increment(1);
    gauge!(names::SESSION_ACTIVE).set(0.0);
}

/// Record a captured frame and the current smoothed rate.
pub fn record_frame(fps: f64) {
    counter!(names::FRAMES_TOTAL).increment(1);
    gauge!(names::PREVIEW_FPS).set(fps);
}

pub fn record_read_failure() {
    counter!(names::FRAME_READ_FAILURES_TOTAL).increment(1);
}

/// Record a detection pass.
pub fn record_detection(faces: usize, duration_secs: f64) {
    counter!(names::DETECTIONS_TOTAL).increment(1);
    counter!(names::FACES_DETECTED_TOTAL).increment(faces as u64);
    histogram!(names::DETECTION_DURATION_SECONDS).record(duration_secs);
}

pub fn record_detection_failure() {
    counter!(names::DETECTION_FAILURES_TOTAL).increment(1);
}

/// Record an identification outcome (`accepted`, `rejected` or `unmapped`).
pub fn record_identification(outcome: &str) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::IDENTIFICATIONS_TOTAL, &labels).increment(1);
}

pub fn record_vote() {
    counter!(names::VOTES_TOTAL).increment(1);
}

pub fn record_confirmation() {
    counter!(names::CONFIRMATIONS_TOTAL).increment(1);
}

pub fn record_commit_failure() {
    counter!(names::COMMIT_FAILURES_TOTAL).increment(1);
}
