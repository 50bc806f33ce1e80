use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Label shown on a box whose identity has not been resolved yet.
pub const PENDING_LABEL: &str = "...";

/// A detected face drawn on the live preview, in full-frame pixel coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FaceBox {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
    pub label: String,
    pub confirmed: bool,
}

impl FaceBox {
    /// Box awaiting identification.
    pub fn pending(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self {
            x,
            y,
            w,
            h,
            label: PENDING_LABEL.to_string(),
            confirmed: false,
        }
    }

    /// Clamp to a `width` x `height` frame, returning `(x1, y1, x2, y2)`.
    ///
    /// Returns `None` when nothing of the box is visible.
    pub fn clamped(&self, width: u32, height: u32) -> Option<(i32, i32, i32, i32)> {
        if width == 0 || height == 0 {
            return None;
        }
        let max_x = width as i32 - 1;
        let max_y = height as i32 - 1;
        let x1 = self.x.max(0);
        let y1 = self.y.max(0);
        let x2 = (self.x + self.w).min(max_x);
        let y2 = (self.y + self.h).min(max_y);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some((x1, y1, x2, y2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_box() {
        let b = FaceBox::pending(10, 20, 30, 40);
        assert_eq!(b.label, PENDING_LABEL);
        assert!(!b.confirmed);
    }

    #[test]
    fn test_clamped_inside() {
        let b = FaceBox::pending(10, 10, 20, 20);
        assert_eq!(b.clamped(100, 100), Some((10, 10, 30, 30)));
    }

    #[test]
    fn test_clamped_overflow() {
        let b = FaceBox::pending(-5, 90, 20, 20);
        assert_eq!(b.clamped(100, 100), Some((0, 90, 15, 99)));
    }

    #[test]
    fn test_clamped_outside() {
        let b = FaceBox::pending(200, 200, 20, 20);
        assert_eq!(b.clamped(100, 100), None);
    }
}
