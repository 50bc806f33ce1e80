//! HTTP client for the face recognition service.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use attend_media::{encode_jpeg, Frame};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::RgbImage;
use metrics::{counter, histogram};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{MlClientError, MlClientResult};
use crate::traits::{BoundingBox, DetectedFace, FaceDetector, FaceEmbedder};
use crate::types::{
    ErrorBody, ExtractFacesRequest, ExtractFacesResponse, ExtractedFace, RepresentRequest,
    RepresentResponse,
};

/// JPEG quality for images sent to the service.
const UPLOAD_JPEG_QUALITY: u8 = 90;

/// Recognition client configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct MlClientConfig {
    /// Service base URL, e.g. `http://127.0.0.1:5005`
    pub base_url: String,
    pub timeout: Duration,
    /// Embedding model (`CAM_MODEL`)
    pub model_name: String,
    /// Primary detector backend (`CAM_DETECTOR`)
    pub detector_backend: String,
    /// Detector tried when the primary fails (`CAM_FALLBACK`)
    pub fallback_backend: Option<String>,
}

impl MlClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(10),
            model_name: "ArcFace".to_string(),
            detector_backend: "opencv".to_string(),
            fallback_backend: Some("retinaface".to_string()),
        }
    }

    /// Create config from environment variables. `ML_SERVICE_URL` is required.
    pub fn from_env() -> MlClientResult<Self> {
        let base_url = std::env::var("ML_SERVICE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| MlClientError::config("ML_SERVICE_URL not set"))?;

        let mut config = Self::new(base_url.trim().trim_end_matches('/'));
        if let Some(secs) = std::env::var("ML_SERVICE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|s| *s > 0)
        {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(model) = non_empty_env("CAM_MODEL") {
            config.model_name = model;
        }
        if let Some(detector) = non_empty_env("CAM_DETECTOR") {
            config.detector_backend = detector;
        }
        if let Ok(fallback) = std::env::var("CAM_FALLBACK") {
            // Explicitly empty disables the fallback
            config.fallback_backend = Some(fallback.trim().to_string()).filter(|s| !s.is_empty());
        }
        Ok(config)
    }

    /// Detector backends in the order they are tried.
    pub fn detector_chain(&self) -> Vec<&str> {
        let mut chain = vec![self.detector_backend.as_str()];
        if let Some(fallback) = self.fallback_backend.as_deref() {
            if fallback != self.detector_backend {
                chain.push(fallback);
            }
        }
        chain
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Recognition service client.
#[derive(Clone)]
pub struct MlClient {
    http: Client,
    config: MlClientConfig,
}

impl MlClient {
    pub fn new(config: MlClientConfig) -> MlClientResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("attend-ml-client/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> MlClientResult<Self> {
        Self::new(MlClientConfig::from_env()?)
    }

    pub fn config(&self) -> &MlClientConfig {
        &self.config
    }

    /// Check the service answers at its base URL.
    pub async fn health(&self) -> MlClientResult<()> {
        let response = self.http.get(&self.config.base_url).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(MlClientError::Service {
                status: status.as_u16(),
                message: "health check failed".to_string(),
            })
        }
    }

    fn data_uri(image: &RgbImage) -> MlClientResult<String> {
        let jpeg = encode_jpeg(image, UPLOAD_JPEG_QUALITY)?;
        Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(jpeg)))
    }

    async fn post_json<Req, Resp>(&self, endpoint: &str, body: &Req) -> MlClientResult<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), endpoint);
        let start = Instant::now();
        let result = self.http.post(&url).json(body).send().await;
        histogram!("attend_ml_request_seconds", "endpoint" => endpoint.to_string())
            .record(start.elapsed().as_secs_f64());

        let response = result.inspect_err(|_| {
            counter!("attend_ml_requests_total", "endpoint" => endpoint.to_string(), "status" => "error")
                .increment(1);
        })?;
        let status = response.status();
        counter!(
            "attend_ml_requests_total",
            "endpoint" => endpoint.to_string(),
            "status" => status.as_u16().to_string()
        )
        .increment(1);

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .and_then(|b| b.error)
                .unwrap_or(text);
            return Err(MlClientError::Service {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| MlClientError::invalid_response(format!("{} response: {}", endpoint, e)))
    }

    /// Run one detector backend on an encoded image.
    async fn extract_faces(&self, img: &str, backend: &str) -> MlClientResult<Vec<ExtractedFace>> {
        let request = ExtractFacesRequest {
            img,
            detector_backend: backend,
            enforce_detection: false,
            align: true,
        };
        let response: ExtractFacesResponse = self.post_json("extract_faces", &request).await?;
        Ok(response.faces)
    }
}

/// Keep faces with a real detection and crop them out of `frame`.
///
/// With detection not enforced the service answers a face-less image with a
/// single zero-confidence region; that sentinel is dropped.
fn to_detected(frame: &Frame, faces: Vec<ExtractedFace>) -> Vec<DetectedFace> {
    faces
        .into_iter()
        .filter(|f| f.confidence > 0.0)
        .filter_map(|f| {
            let area = f.facial_area?;
            let bbox = BoundingBox {
                x: area.x.round() as i32,
                y: area.y.round() as i32,
                w: area.w.round() as i32,
                h: area.h.round() as i32,
            };
            let crop = frame.crop(bbox.x, bbox.y, bbox.w, bbox.h)?;
            Some(DetectedFace {
                bbox,
                crop,
                confidence: f.confidence,
            })
        })
        .collect()
}

#[async_trait]
impl FaceDetector for MlClient {
    async fn detect_faces(&self, frame: &Frame) -> MlClientResult<Vec<DetectedFace>> {
        let img = Self::data_uri(frame.image())?;

        let mut failures = Vec::new();
        for backend in self.config.detector_chain() {
            match self.extract_faces(&img, backend).await {
                Ok(faces) => {
                    let detected = to_detected(frame, faces);
                    debug!(backend, faces = detected.len(), "Face detection complete");
                    return Ok(detected);
                }
                Err(e) => {
                    warn!(backend, "Face detection failed: {}", e);
                    failures.push(format!("{}: {}", backend, e));
                }
            }
        }
        Err(MlClientError::DetectorsExhausted(failures.join("; ")))
    }
}

#[async_trait]
impl FaceEmbedder for MlClient {
    async fn represent(&self, crop: &RgbImage) -> MlClientResult<Option<Vec<f32>>> {
        let img = Self::data_uri(crop)?;
        let request = RepresentRequest {
            img: &img,
            model_name: &self.config.model_name,
            detector_backend: "skip",
            enforce_detection: false,
            align: false,
        };
        let response: RepresentResponse = self.post_json("represent", &request).await?;
        Ok(response
            .results
            .into_iter()
            .next()
            .map(|r| r.embedding)
            .filter(|e| !e.is_empty()))
    }
}
