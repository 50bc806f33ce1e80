//! Recognition service wire types.
//!
//! The service exposes DeepFace-style endpoints: `POST /extract_faces` and
//! `POST /represent`, both taking a base64 data-URI image.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct ExtractFacesRequest<'a> {
    pub img: &'a str,
    pub detector_backend: &'a str,
    pub enforce_detection: bool,
    pub align: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExtractFacesResponse {
    #[serde(default)]
    pub faces: Vec<ExtractedFace>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExtractedFace {
    pub facial_area: Option<FacialArea>,
    #[serde(default)]
    pub confidence: f64,
}

fn default_extent() -> f64 {
    50.0
}

/// Face region in the coordinates of the submitted image.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct FacialArea {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default = "default_extent")]
    pub w: f64,
    #[serde(default = "default_extent")]
    pub h: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct RepresentRequest<'a> {
    pub img: &'a str,
    pub model_name: &'a str,
    pub detector_backend: &'a str,
    pub enforce_detection: bool,
    pub align: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RepresentResponse {
    #[serde(default)]
    pub results: Vec<Representation>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Representation {
    pub embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: Option<String>,
}
