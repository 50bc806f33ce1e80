//! Preview frame annotation.

use std::path::Path;

use attend_models::FaceBox;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use rusttype::{Font, Scale};
use tracing::debug;

use crate::error::{MediaError, MediaResult};
use crate::frame::{encode_jpeg, Frame, DEFAULT_JPEG_QUALITY};
use crate::glyphs;

pub const CONFIRMED_COLOR: Rgb<u8> = Rgb([80, 200, 0]);
pub const UNCONFIRMED_COLOR: Rgb<u8> = Rgb([255, 180, 0]);
const LABEL_TEXT_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
const PRESENT_TEXT_COLOR: Rgb<u8> = Rgb([80, 220, 0]);
const FPS_TEXT_COLOR: Rgb<u8> = Rgb([200, 200, 200]);

const LABEL_SCALE: f32 = 18.0;
const PRESENT_SCALE: f32 = 16.0;
const FPS_SCALE: f32 = 15.0;
const BOX_THICKNESS: i32 = 2;

/// How preview text is rendered.
enum Typeface {
    /// 3x5 bitmap glyphs, always available
    Builtin,
    TrueType(Font<'static>),
}

impl Typeface {
    fn text_size(&self, size: f32, text: &str) -> (i32, i32) {
        match self {
            Typeface::Builtin => glyphs::text_size(bitmap_scale(size), text),
            Typeface::TrueType(font) => text_size(Scale::uniform(size), font, text),
        }
    }

    fn draw(&self, image: &mut RgbImage, color: Rgb<u8>, x: i32, y: i32, size: f32, text: &str) {
        match self {
            Typeface::Builtin => glyphs::draw_text(image, color, x, y, bitmap_scale(size), text),
            Typeface::TrueType(font) => {
                draw_text_mut(image, color, x, y, Scale::uniform(size), font, text)
            }
        }
    }
}

fn bitmap_scale(size: f32) -> i32 {
    ((size / 8.0).round() as i32).max(1)
}

/// Draws face boxes, labels and an fps watermark onto preview frames.
pub struct Annotator {
    typeface: Typeface,
    quality: u8,
}

impl Default for Annotator {
    fn default() -> Self {
        Self {
            typeface: Typeface::Builtin,
            quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl Annotator {
    /// Annotator using the built-in bitmap glyphs.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    /// Render text with a TrueType font instead of the built-in glyphs.
    pub fn with_font_bytes(mut self, bytes: Vec<u8>) -> MediaResult<Self> {
        let font = Font::try_from_vec(bytes)
            .ok_or_else(|| MediaError::Font("not a TrueType/OpenType font".to_string()))?;
        self.typeface = Typeface::TrueType(font);
        Ok(self)
    }

    /// Render text with a font loaded from `path`.
    pub fn with_font_file(self, path: impl AsRef<Path>) -> MediaResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| MediaError::Font(format!("{}: {}", path.display(), e)))?;
        debug!(font = %path.display(), "Loaded preview font");
        self.with_font_bytes(bytes)
    }

    pub fn has_font(&self) -> bool {
        matches!(self.typeface, Typeface::TrueType(_))
    }

    /// Annotate a copy of `frame` and encode it as JPEG.
    pub fn annotate(&self, frame: &Frame, boxes: &[FaceBox], fps: f64) -> MediaResult<Vec<u8>> {
        let mut image = frame.image().clone();
        self.draw(&mut image, boxes, fps);
        encode_jpeg(&image, self.quality)
    }

    /// Draw onto `image` in place.
    pub fn draw(&self, image: &mut RgbImage, boxes: &[FaceBox], fps: f64) {
        let (width, height) = image.dimensions();

        let text = format!("{:.1} fps", fps);
        let (_, th) = self.typeface.text_size(FPS_SCALE, &text);
        self.typeface
            .draw(image, FPS_TEXT_COLOR, 8, (height as i32 - 10 - th).max(0), FPS_SCALE, &text);

        for face in boxes {
            let Some((x1, y1, x2, y2)) = face.clamped(width, height) else {
                continue;
            };
            let color = if face.confirmed {
                CONFIRMED_COLOR
            } else {
                UNCONFIRMED_COLOR
            };

            for t in 0..BOX_THICKNESS {
                let w = x2 - x1 - 2 * t;
                let h = y2 - y1 - 2 * t;
                if w <= 0 || h <= 0 {
                    break;
                }
                draw_hollow_rect_mut(image, Rect::at(x1 + t, y1 + t).of_size(w as u32 + 1, h as u32 + 1), color);
            }

            self.draw_label(image, x1, y1, &face.label, color);
            if face.confirmed {
                let (_, th) = self.typeface.text_size(PRESENT_SCALE, "PRESENT");
                self.typeface.draw(
                    image,
                    PRESENT_TEXT_COLOR,
                    x1 + 3,
                    (y2 - 6 - th).max(y1),
                    PRESENT_SCALE,
                    "PRESENT",
                );
            }
        }
    }

    /// Filled chip above the box with the label on it.
    fn draw_label(&self, image: &mut RgbImage, x1: i32, y1: i32, label: &str, color: Rgb<u8>) {
        if label.is_empty() {
            return;
        }
        let (tw, th) = self.typeface.text_size(LABEL_SCALE, label);
        // Chip sits above the box, or inside it when the box touches the top edge
        let baseline = (y1 - 6).max(th + 4);
        let chip_top = baseline - th - 4;
        let chip = Rect::at(x1, chip_top).of_size((tw + 6).max(1) as u32, (th + 6).max(1) as u32);
        draw_filled_rect_mut(image, chip, color);
        self.typeface
            .draw(image, LABEL_TEXT_COLOR, x1 + 3, chip_top + 2, LABEL_SCALE, label);
    }
}

#[cfg(test)]
mod tests {
    use std::ops::Range;

    use super::*;

    fn blank(w: u32, h: u32) -> Frame {
        Frame::new(RgbImage::from_pixel(w, h, Rgb([0, 0, 0])))
    }

    fn face(x: i32, y: i32, w: i32, h: i32, confirmed: bool) -> FaceBox {
        FaceBox {
            x,
            y,
            w,
            h,
            label: "ALICE (91.0%)".to_string(),
            confirmed,
        }
    }

    #[test]
    fn test_box_colors() {
        let annotator = Annotator::new();
        let mut image = blank(100, 100).into_image();
        annotator.draw(
            &mut image,
            &[face(10, 10, 30, 30, true), face(50, 50, 30, 30, false)],
            0.0,
        );
        assert_eq!(*image.get_pixel(10, 20), CONFIRMED_COLOR);
        assert_eq!(*image.get_pixel(50, 60), UNCONFIRMED_COLOR);
        // Between the chip and the PRESENT marker
        assert_eq!(*image.get_pixel(25, 20), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_boxes_are_clamped_to_frame() {
        let annotator = Annotator::new();
        let mut image = blank(50, 40).into_image();
        annotator.draw(&mut image, &[face(-10, -10, 100, 100, false)], 12.3);
        assert_eq!(*image.get_pixel(0, 35), UNCONFIRMED_COLOR);
        assert_eq!(*image.get_pixel(49, 35), UNCONFIRMED_COLOR);
    }

    #[test]
    fn test_offscreen_box_is_skipped() {
        let annotator = Annotator::new();
        let mut image = blank(50, 40).into_image();
        annotator.draw(&mut image, &[face(200, 200, 10, 10, true)], 0.0);
        // Only the fps watermark, in the bottom half
        for y in 0..16 {
            for x in 0..50 {
                assert_eq!(*image.get_pixel(x, y), Rgb([0, 0, 0]));
            }
        }
    }

    fn count_in(
        image: &RgbImage,
        xs: Range<u32>,
        ys: Range<u32>,
        pred: impl Fn(&Rgb<u8>) -> bool,
    ) -> usize {
        ys.flat_map(|y| xs.clone().map(move |x| (x, y)))
            .filter(|&(x, y)| pred(image.get_pixel(x, y)))
            .count()
    }

    #[test]
    fn test_default_annotator_draws_text_without_font() {
        let annotator = Annotator::new();
        assert!(!annotator.has_font());
        let mut image = blank(200, 200).into_image();
        annotator.draw(&mut image, &[face(50, 60, 80, 80, true)], 24.6);

        let black = Rgb([0, 0, 0]);
        let chip = count_in(&image, 50..130, 40..56, |p| *p != black);
        let chip_text = count_in(&image, 50..130, 40..56, |p| *p == LABEL_TEXT_COLOR);
        let present = count_in(&image, 52..128, 110..138, |p| *p == PRESENT_TEXT_COLOR);
        let fps = count_in(&image, 0..60, 170..200, |p| *p == FPS_TEXT_COLOR);

        assert!(chip > 0, "label chip missing");
        // Label glyphs are black on the filled chip
        assert!(chip_text > 0 && chip_text < chip);
        assert!(present > 0, "PRESENT marker missing");
        assert!(fps > 0, "fps watermark missing");
    }

    #[test]
    fn test_unconfirmed_box_has_no_present_marker() {
        let mut image = blank(200, 200).into_image();
        Annotator::new().draw(&mut image, &[face(50, 60, 80, 80, false)], 0.0);
        assert_eq!(count_in(&image, 52..128, 110..138, |p| *p == PRESENT_TEXT_COLOR), 0);
    }

    #[test]
    fn test_annotate_encodes_jpeg() {
        let jpeg = Annotator::new()
            .with_quality(70)
            .annotate(&blank(64, 48), &[face(5, 5, 20, 20, true)], 29.97)
            .unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_invalid_font_rejected() {
        assert!(Annotator::new().with_font_bytes(vec![1, 2, 3]).is_err());
        let dir = tempfile::tempdir().unwrap();
        assert!(Annotator::new()
            .with_font_file(dir.path().join("missing.ttf"))
            .is_err());
    }
}
