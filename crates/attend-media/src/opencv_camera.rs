//! OpenCV `VideoCapture` camera backend.

use async_trait::async_trait;
use opencv::core::Mat;
use opencv::prelude::{MatTraitConst, MatTraitConstManual, VideoCaptureTrait, VideoCaptureTraitConst};
use opencv::videoio::{VideoCapture, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_HEIGHT, CAP_PROP_FRAME_WIDTH};
use tracing::{info, warn};

use crate::error::{MediaError, MediaResult};
use crate::frame::Frame;
use crate::source::{CameraConfig, FrameSource, FrameSourceFactory};

/// Camera read through OpenCV.
pub struct OpenCvCamera {
    config: CameraConfig,
    cap: Option<VideoCapture>,
}

impl OpenCvCamera {
    pub fn new(config: CameraConfig) -> Self {
        Self { config, cap: None }
    }

    fn open_capture(&self) -> MediaResult<VideoCapture> {
        let cap = match self.config.device.parse::<i32>() {
            Ok(index) => VideoCapture::new(index, CAP_ANY),
            Err(_) => VideoCapture::from_file(&self.config.device, CAP_ANY),
        }
        .map_err(|e| MediaError::camera_unavailable(format!("{}: {}", self.config.device, e)))?;

        if !cap.is_opened().unwrap_or(false) {
            return Err(MediaError::camera_unavailable(format!(
                "cannot open camera {}",
                self.config.device
            )));
        }
        Ok(cap)
    }
}

/// Factory producing [`OpenCvCamera`] sources.
#[derive(Debug, Clone)]
pub struct OpenCvCameraFactory(pub CameraConfig);

impl FrameSourceFactory for OpenCvCameraFactory {
    fn create(&self) -> Box<dyn FrameSource> {
        Box::new(OpenCvCamera::new(self.0.clone()))
    }
}

#[async_trait]
impl FrameSource for OpenCvCamera {
    async fn open(&mut self) -> MediaResult<()> {
        let mut cap = self.open_capture()?;

        // Drivers may ignore these; the frame size is taken from each Mat
        for (prop, value) in [
            (CAP_PROP_FRAME_WIDTH, self.config.width as f64),
            (CAP_PROP_FRAME_HEIGHT, self.config.height as f64),
            (CAP_PROP_FPS, self.config.fps as f64),
        ] {
            if let Err(e) = cap.set(prop, value) {
                warn!("Camera rejected property {}: {}", prop, e);
            }
        }

        info!(device = %self.config.device, "Camera opened (OpenCV)");
        self.cap = Some(cap);
        Ok(())
    }

    async fn next_frame(&mut self) -> MediaResult<Option<Frame>> {
        let cap = self.cap.as_mut().ok_or(MediaError::NotOpened)?;

        let mut bgr = Mat::default();
        let ok = cap
            .read(&mut bgr)
            .map_err(|e| MediaError::read_failed(e.to_string()))?;
        if !ok || bgr.empty() {
            return Ok(None);
        }

        let mut rgb = Mat::default();
        opencv::imgproc::cvt_color_def(&bgr, &mut rgb, opencv::imgproc::COLOR_BGR2RGB)
            .map_err(|e| MediaError::read_failed(format!("Color conversion failed: {}", e)))?;

        let width = rgb.cols() as u32;
        let height = rgb.rows() as u32;
        let data = rgb
            .data_bytes()
            .map_err(|e| MediaError::read_failed(format!("Failed to get frame data: {}", e)))?;

        Frame::from_rgb24(width, height, data.to_vec()).map(Some)
    }

    async fn release(&mut self) {
        if let Some(mut cap) = self.cap.take() {
            if let Err(e) = cap.release() {
                warn!("Failed to release camera: {}", e);
            }
        }
    }
}
