//! Camera frame sources.
//!
//! A [`FrameSource`] is opened once per session, polled for frames and
//! released on every exit path. [`FfmpegCamera`] reads packed `rgb24` frames
//! from an FFmpeg child process; see `opencv_camera` for the OpenCV backend.

use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{MediaError, MediaResult};
use crate::frame::Frame;

/// How long `open` waits for the first frame before giving up.
const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(10);

/// A camera that yields frames.
#[async_trait]
pub trait FrameSource: Send {
    /// Acquire the device.
    async fn open(&mut self) -> MediaResult<()>;

    /// Pull the next frame. `Ok(None)` is a transient miss.
    async fn next_frame(&mut self) -> MediaResult<Option<Frame>>;

    /// Release the device. Safe to call more than once.
    async fn release(&mut self);
}

/// Creates a fresh [`FrameSource`] for each session.
pub trait FrameSourceFactory: Send + Sync {
    fn create(&self) -> Box<dyn FrameSource>;
}

impl<F> FrameSourceFactory for F
where
    F: Fn() -> Box<dyn FrameSource> + Send + Sync,
{
    fn create(&self) -> Box<dyn FrameSource> {
        self()
    }
}

/// Camera capture settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraConfig {
    /// Device path or index (`0` means `/dev/video0` for v4l2)
    pub device: String,
    /// FFmpeg input format
    pub input_format: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "0".to_string(),
            input_format: "v4l2".to_string(),
            width: 1280,
            height: 720,
            fps: 30,
        }
    }
}

impl CameraConfig {
    /// Read `CAM_DEVICE`, `CAM_INPUT_FORMAT`, `CAM_WIDTH`, `CAM_HEIGHT`, `CAM_FPS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let parse = |key: &str, fallback: u32| {
            std::env::var(key)
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .filter(|v: &u32| *v > 0)
                .unwrap_or(fallback)
        };
        Self {
            device: std::env::var("CAM_DEVICE")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.device),
            input_format: std::env::var("CAM_INPUT_FORMAT")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.input_format),
            width: parse("CAM_WIDTH", defaults.width),
            height: parse("CAM_HEIGHT", defaults.height),
            fps: parse("CAM_FPS", defaults.fps),
        }
    }

    /// Device path handed to FFmpeg.
    pub fn device_path(&self) -> String {
        if self.input_format == "v4l2" && self.device.chars().all(|c| c.is_ascii_digit()) {
            format!("/dev/video{}", self.device)
        } else {
            self.device.clone()
        }
    }

    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

impl FrameSourceFactory for CameraConfig {
    fn create(&self) -> Box<dyn FrameSource> {
        Box::new(FfmpegCamera::new(self.clone()))
    }
}

/// Camera read through an FFmpeg `rawvideo` pipe.
pub struct FfmpegCamera {
    config: CameraConfig,
    child: Option<Child>,
    stdout: Option<BufReader<ChildStdout>>,
    stderr_task: Option<JoinHandle<()>>,
    last_stderr: Arc<Mutex<Option<String>>>,
    pending: Option<Frame>,
}

impl FfmpegCamera {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            child: None,
            stdout: None,
            stderr_task: None,
            last_stderr: Arc::new(Mutex::new(None)),
            pending: None,
        }
    }

    /// Arguments for capturing `rgb24` frames scaled to the configured size.
    pub fn ffmpeg_args(&self) -> Vec<String> {
        let c = &self.config;
        vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-f".to_string(),
            c.input_format.clone(),
            "-framerate".to_string(),
            c.fps.to_string(),
            "-video_size".to_string(),
            format!("{}x{}", c.width, c.height),
            "-i".to_string(),
            c.device_path(),
            "-vf".to_string(),
            format!("scale={}:{}", c.width, c.height),
            "-pix_fmt".to_string(),
            "rgb24".to_string(),
            "-f".to_string(),
            "rawvideo".to_string(),
            "-".to_string(),
        ]
    }

    fn last_stderr(&self) -> Option<String> {
        self.last_stderr.lock().ok().and_then(|guard| guard.clone())
    }

    async fn read_frame(&mut self) -> MediaResult<Frame> {
        let frame_bytes = self.config.frame_bytes();
        let stdout = self.stdout.as_mut().ok_or(MediaError::NotOpened)?;

        let mut buf = vec![0u8; frame_bytes];
        match stdout.read_exact(&mut buf).await {
            Ok(_) => Frame::from_rgb24(self.config.width, self.config.height, buf),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Err(MediaError::ffmpeg_failed(
                    "camera stream ended",
                    self.last_stderr(),
                    None,
                ))
            }
            Err(e) => Err(MediaError::read_failed(e.to_string())),
        }
    }
}

#[async_trait]
impl FrameSource for FfmpegCamera {
    async fn open(&mut self) -> MediaResult<()> {
        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        let args = self.ffmpeg_args();
        debug!("Opening camera: ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MediaError::ffmpeg_failed(format!("Failed to spawn FFmpeg: {}", e), None, None))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::ffmpeg_failed("Failed to capture FFmpeg stdout", None, None))?;

        if let Some(stderr) = child.stderr.take() {
            let last = Arc::clone(&self.last_stderr);
            self.stderr_task = Some(tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "attend_media::ffmpeg", "{}", line);
                    if let Ok(mut guard) = last.lock() {
                        *guard = Some(line);
                    }
                }
            }));
        }

        self.child = Some(child);
        self.stdout = Some(BufReader::with_capacity(self.config.frame_bytes(), stdout));

        // The device is only proven usable once a frame arrives
        let first = match tokio::time::timeout(FIRST_FRAME_TIMEOUT, self.read_frame()).await {
            Ok(Ok(frame)) => frame,
            Ok(Err(e)) => {
                self.release().await;
                return Err(MediaError::camera_unavailable(format!(
                    "{}: {}",
                    self.config.device_path(),
                    e
                )));
            }
            Err(_) => {
                self.release().await;
                return Err(MediaError::camera_unavailable(format!(
                    "{}: no frame within {}s",
                    self.config.device_path(),
                    FIRST_FRAME_TIMEOUT.as_secs()
                )));
            }
        };
        self.pending = Some(first);

        info!(
            device = %self.config.device_path(),
            width = self.config.width,
            height = self.config.height,
            fps = self.config.fps,
            "Camera opened"
        );
        Ok(())
    }

    async fn next_frame(&mut self) -> MediaResult<Option<Frame>> {
        if let Some(frame) = self.pending.take() {
            return Ok(Some(frame));
        }
        self.read_frame().await.map(Some)
    }

    async fn release(&mut self) {
        self.stdout = None;
        self.pending = None;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                warn!("Failed to stop FFmpeg camera process: {}", e);
            }
            debug!("Camera released");
        }
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_camera_config() {
        let config = CameraConfig::default();
        assert_eq!((config.width, config.height, config.fps), (1280, 720, 30));
        assert_eq!(config.device_path(), "/dev/video0");
        assert_eq!(config.frame_bytes(), 1280 * 720 * 3);
    }

    #[test]
    fn test_device_path_passthrough() {
        let config = CameraConfig {
            device: "/dev/video2".to_string(),
            ..Default::default()
        };
        assert_eq!(config.device_path(), "/dev/video2");

        let config = CameraConfig {
            device: "0".to_string(),
            input_format: "avfoundation".to_string(),
            ..Default::default()
        };
        assert_eq!(config.device_path(), "0");
    }

    #[test]
    fn test_ffmpeg_args_emit_rawvideo() {
        let camera = FfmpegCamera::new(CameraConfig {
            width: 640,
            height: 480,
            fps: 15,
            ..Default::default()
        });
        let args = camera.ffmpeg_args();
        let joined = args.join(" ");
        assert!(joined.contains("-video_size 640x480"));
        assert!(joined.contains("-framerate 15"));
        assert!(joined.contains("-pix_fmt rgb24 -f rawvideo -"));
        assert_eq!(args.last().map(String::as_str), Some("-"));
    }

    #[tokio::test]
    async fn test_next_frame_before_open_fails() {
        let mut camera = FfmpegCamera::new(CameraConfig::default());
        assert!(matches!(camera.next_frame().await, Err(MediaError::NotOpened)));
        camera.release().await;
    }

    #[test]
    fn test_closure_factory() {
        let factory = || -> Box<dyn FrameSource> { Box::new(FfmpegCamera::new(CameraConfig::default())) };
        let _source = FrameSourceFactory::create(&factory);
    }
}
