//! Captured video frames.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ColorType, RgbImage};

use crate::error::{MediaError, MediaResult};

/// Default JPEG quality for preview frames and uploaded crops.
pub const DEFAULT_JPEG_QUALITY: u8 = 70;

/// A single RGB frame from a camera.
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    /// Wrap a packed `rgb24` buffer.
    pub fn from_rgb24(width: u32, height: u32, data: Vec<u8>) -> MediaResult<Self> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(MediaError::invalid_frame(format!(
                "expected {} bytes for {}x{} rgb24, got {}",
                expected,
                width,
                height,
                data.len()
            )));
        }
        RgbImage::from_raw(width, height, data)
            .map(Self::new)
            .ok_or_else(|| MediaError::invalid_frame("buffer does not match dimensions"))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbImage {
        &mut self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// Resize by `scale`; scales outside `(0, 1)` return an unscaled copy.
    pub fn downscale(&self, scale: f32) -> Frame {
        if !(scale > 0.0 && scale < 1.0) {
            return self.clone();
        }
        let w = ((self.width() as f32 * scale).round() as u32).max(1);
        let h = ((self.height() as f32 * scale).round() as u32).max(1);
        Frame::new(imageops::resize(&self.image, w, h, FilterType::Triangle))
    }

    /// Copy out a region clamped to the frame; `None` if nothing remains.
    pub fn crop(&self, x: i32, y: i32, w: i32, h: i32) -> Option<RgbImage> {
        let x1 = x.max(0) as u32;
        let y1 = y.max(0) as u32;
        let x2 = (x.saturating_add(w)).clamp(0, self.width() as i32) as u32;
        let y2 = (y.saturating_add(h)).clamp(0, self.height() as i32) as u32;
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(imageops::crop_imm(&self.image, x1, y1, x2 - x1, y2 - y1).to_image())
    }

    /// Encode as JPEG.
    pub fn to_jpeg(&self, quality: u8) -> MediaResult<Vec<u8>> {
        encode_jpeg(&self.image, quality)
    }
}

/// Encode an RGB image as JPEG at `quality` (1-100).
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> MediaResult<Vec<u8>> {
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    encoder.encode(image.as_raw(), image.width(), image.height(), ColorType::Rgb8)?;
    Ok(buf)
}
