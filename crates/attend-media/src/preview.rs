//! Latest preview frame and face boxes, shared with status readers.

use std::sync::{Mutex, MutexGuard};

use attend_models::FaceBox;

#[derive(Default)]
struct PreviewState {
    jpeg: Option<Vec<u8>>,
    boxes: Vec<FaceBox>,
}

/// Lock-guarded preview state, independent of any session state lock.
///
/// The box list is replaced wholesale on each detection cycle and persists
/// between cycles so every preview frame carries the latest labels.
#[derive(Default)]
pub struct PreviewBuffer {
    inner: Mutex<PreviewState>,
}

impl PreviewBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, PreviewState> {
        // A panic while holding the lock leaves plain data behind; keep serving it
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn publish_jpeg(&self, jpeg: Vec<u8>) {
        self.lock().jpeg = Some(jpeg);
    }

    /// Most recent encoded frame.
    pub fn latest_jpeg(&self) -> Option<Vec<u8>> {
        self.lock().jpeg.clone()
    }

    pub fn set_boxes(&self, boxes: Vec<FaceBox>) {
        self.lock().boxes = boxes;
    }

    pub fn boxes(&self) -> Vec<FaceBox> {
        self.lock().boxes.clone()
    }

    /// Drop boxes; the last JPEG stays available.
    pub fn clear_boxes(&self) {
        self.lock().boxes.clear();
    }
}
