//! Collaborator traits consumed by the attendance engine.

use async_trait::async_trait;
use attend_media::Frame;
use image::RgbImage;

use crate::error::MlClientResult;

/// Axis-aligned face box in pixels of the frame it was detected on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl BoundingBox {
    /// Map a box found on a frame downscaled by `scale` back to full size.
    pub fn rescale(&self, scale: f32) -> Self {
        if scale <= 0.0 || scale.is_nan() || (scale - 1.0).abs() < f32::EPSILON {
            return *self;
        }
        let inv = 1.0 / scale;
        Self {
            x: (self.x as f32 * inv) as i32,
            y: (self.y as f32 * inv) as i32,
            w: (self.w as f32 * inv) as i32,
            h: (self.h as f32 * inv) as i32,
        }
    }
}

/// A detected face: its box and the cropped pixels to embed.
#[derive(Debug, Clone)]
pub struct DetectedFace {
    pub bbox: BoundingBox,
    pub crop: RgbImage,
    pub confidence: f64,
}

/// Finds faces in a frame.
#[async_trait]
pub trait FaceDetector: Send + Sync {
    async fn detect_faces(&self, frame: &Frame) -> MlClientResult<Vec<DetectedFace>>;
}

/// Computes an embedding for a face crop. `Ok(None)` when no embedding
/// could be produced.
#[async_trait]
pub trait FaceEmbedder: Send + Sync {
    async fn represent(&self, crop: &RgbImage) -> MlClientResult<Option<Vec<f32>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rescale_half_scale_doubles() {
        let b = BoundingBox { x: 10, y: 20, w: 30, h: 40 };
        assert_eq!(b.rescale(0.5), BoundingBox { x: 20, y: 40, w: 60, h: 80 });
    }

    #[test]
    fn test_rescale_identity() {
        let b = BoundingBox { x: 1, y: 2, w: 3, h: 4 };
        assert_eq!(b.rescale(1.0), b);
        assert_eq!(b.rescale(0.0), b);
    }
}
