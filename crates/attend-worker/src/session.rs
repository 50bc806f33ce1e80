//! Session controller and capture worker.
//!
//! One tokio task per session pulls frames, keeps the preview fresh and,
//! every `detect_every` frames, identifies faces and votes toward
//! confirmation. Control calls are synchronous and callable from any
//! thread; they only touch the state lock and the cancellation channel.

use std::any::Any;
use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use attend_media::{Annotator, Frame, FrameSource, FrameSourceFactory, PreviewBuffer};
use attend_ml_client::{DetectedFace, FaceDetector, FaceEmbedder};
use attend_models::{
    FaceBox, IdentityId, SessionDate, SessionState, SessionStatus, StartOutcome, StopOutcome,
};
use chrono::Utc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn, Instrument};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::gallery::GalleryLoader;
use crate::logging::SessionLogger;
use crate::metrics;
use crate::name_mapping::NameMapping;
use crate::presence::PresenceWriter;
use crate::registry::IdentityRegistry;
use crate::resolver::{IdentityResolver, UNKNOWN_LABEL};
use crate::voting::VoteTable;

/// Detection and embedding backends. Without them no session can start.
#[derive(Clone)]
pub struct Recognition {
    pub detector: Arc<dyn FaceDetector>,
    pub embedder: Arc<dyn FaceEmbedder>,
}

/// Everything the engine talks to.
pub struct Collaborators {
    pub frames: Arc<dyn FrameSourceFactory>,
    pub recognition: Option<Recognition>,
    pub writer: Arc<dyn PresenceWriter>,
    pub annotator: Annotator,
}

struct EngineState {
    status: SessionStatus,
    votes: VoteTable,
}

struct Inner {
    config: EngineConfig,
    registry: Arc<IdentityRegistry>,
    loader: GalleryLoader,
    frames: Arc<dyn FrameSourceFactory>,
    recognition: Option<Recognition>,
    writer: Arc<dyn PresenceWriter>,
    annotator: Annotator,
    runtime: Handle,
    state: Mutex<EngineState>,
    preview: PreviewBuffer,
    cancel: watch::Sender<bool>,
    finished: watch::Sender<u64>,
    /// `(date, id)` pairs committed since the process started
    committed: Mutex<HashSet<(SessionDate, IdentityId)>>,
}

/// Starts, stops and reports on attendance sessions.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    /// Create a controller bound to the current tokio runtime.
    pub fn new(
        config: EngineConfig,
        registry: Arc<IdentityRegistry>,
        collaborators: Collaborators,
    ) -> EngineResult<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| EngineError::config(format!("No tokio runtime: {}", e)))?;
        Ok(Self::with_runtime(config, registry, collaborators, runtime))
    }

    /// Create a controller that spawns session workers on `runtime`.
    pub fn with_runtime(
        config: EngineConfig,
        registry: Arc<IdentityRegistry>,
        collaborators: Collaborators,
        runtime: Handle,
    ) -> Self {
        let loader = GalleryLoader::from_config(&config, registry.clone());
        let votes = VoteTable::new(config.vote_required);
        let (cancel, _) = watch::channel(false);
        let (finished, _) = watch::channel(0u64);

        Self {
            inner: Arc::new(Inner {
                config,
                registry,
                loader,
                frames: collaborators.frames,
                recognition: collaborators.recognition,
                writer: collaborators.writer,
                annotator: collaborators.annotator,
                runtime,
                state: Mutex::new(EngineState {
                    status: SessionStatus::default(),
                    votes,
                }),
                preview: PreviewBuffer::new(),
                cancel,
                finished,
                committed: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Whether detection backends are configured.
    pub fn detection_available(&self) -> bool {
        self.inner.recognition.is_some()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Start a session for `date` (`YYYY-MM-DD`, default today).
    pub fn start(&self, date: Option<&str>) -> StartOutcome {
        match self.try_start(date) {
            Ok(date) => StartOutcome::started(date),
            Err(e) => {
                info!(reason = %e, "Start refused");
                StartOutcome::refused(e.to_string())
            }
        }
    }

    pub fn try_start(&self, date: Option<&str>) -> EngineResult<SessionDate> {
        let date = match date {
            Some(raw) => SessionDate::parse(raw)?,
            None => SessionDate::today(),
        };

        let mut state = self.inner.lock_state();
        if state.status.state != SessionState::Idle {
            return Err(EngineError::AlreadyRunning);
        }
        if self.inner.recognition.is_none() {
            return Err(EngineError::unavailable(
                "no face detection service configured on this machine",
            ));
        }

        self.inner.cancel.send_replace(false);
        state.status = SessionStatus {
            state: SessionState::Running,
            session_date: Some(date),
            started_at: Some(Utc::now()),
            embeddings_available: self.inner.loader.gallery_exists(),
            store_available: self.inner.writer.is_available(),
            ..SessionStatus::default()
        };
        state.votes.reset(self.inner.config.vote_required);
        self.inner.preview.clear_boxes();

        let inner = self.inner.clone();
        let cancel = self.inner.cancel.subscribe();
        self.inner.runtime.spawn(supervise(inner, date, cancel));

        info!(session_date = %date, "Face detection started");
        Ok(date)
    }

    /// Ask the running session to stop. Returns before the worker exits.
    pub fn stop(&self) -> StopOutcome {
        match self.try_stop() {
            Ok(()) => StopOutcome::stopped(),
            Err(e) => StopOutcome::refused(e.to_string()),
        }
    }

    pub fn try_stop(&self) -> EngineResult<()> {
        {
            let mut state = self.inner.lock_state();
            if state.status.state != SessionState::Running {
                return Err(EngineError::NotRunning);
            }
            state.status.state = SessionState::Stopping;
        }
        self.inner.cancel.send_replace(true);
        info!("Stop requested for face detection session");
        Ok(())
    }

    /// Snapshot of the session state.
    pub fn status(&self) -> SessionStatus {
        let mut status = self.inner.lock_state().status.clone();
        status.fps = (status.fps * 10.0).round() / 10.0;
        status.embeddings_available = self.inner.loader.gallery_exists();
        status.store_available = self.inner.writer.is_available();
        status
    }

    /// Latest annotated preview frame (JPEG).
    pub fn frame(&self) -> Option<Vec<u8>> {
        self.inner.preview.latest_jpeg()
    }

    /// Face boxes currently drawn on the preview.
    pub fn face_boxes(&self) -> Vec<FaceBox> {
        self.inner.preview.boxes()
    }

    /// Wait until no session is active.
    pub async fn wait_until_idle(&self) {
        let mut finished = self.inner.finished.subscribe();
        loop {
            if self.inner.lock_state().status.state == SessionState::Idle {
                return;
            }
            if finished.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update_status(&self, f: impl FnOnce(&mut SessionStatus)) {
        f(&mut self.lock_state().status);
    }

    fn finish(&self, result: EngineResult<()>, logger: &SessionLogger) {
        let status = {
            let mut state = self.lock_state();
            state.status.state = SessionState::Idle;
            state.status.stopped_at = Some(Utc::now());
            if let Err(e) = &result {
                state.status.error = Some(e.to_string());
            }
            state.status.clone()
        };

        metrics::record_session_finished(if result.is_ok() { "completed" } else { "failed" });
        logger.finished(&status, &result);
        self.finished.send_modify(|n| *n += 1);
    }

    fn publish_preview(&self, frame: &Frame, fps: f64) {
        let boxes = self.preview.boxes();
        match self.annotator.annotate(frame, &boxes, fps) {
            Ok(jpeg) => self.preview.publish_jpeg(jpeg),
            Err(e) => debug!(error = %e, "Preview encode failed"),
        }
    }

    async fn commit_presence(&self, date: &SessionDate, id: &IdentityId, name: &str) {
        let first = self
            .committed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert((*date, id.clone()));
        if !first {
            debug!(roll_no = %id, "Presence already committed for this date");
            return;
        }

        if let Err(e) = self.writer.commit(date, id, name).await {
            error!(roll_no = %id, session_date = %date, error = %e, "Presence commit failed");
            metrics::record_commit_failure();
            self.update_status(|s| s.error = Some(e.to_string()));
        }
    }
}

/// Runs one session and always leaves the controller idle.
async fn supervise(inner: Arc<Inner>, date: SessionDate, cancel: watch::Receiver<bool>) {
    let logger = SessionLogger::new(date);
    metrics::record_session_started();
    logger.started(&inner.config);

    let worker = inner
        .runtime
        .spawn(run_session(inner.clone(), date, cancel).instrument(logger.span()));

    let result = match worker.await {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(EngineError::WorkerPanic(panic_message(e.into_panic()))),
        Err(e) => Err(EngineError::WorkerPanic(e.to_string())),
    };
    inner.finish(result, &logger);
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let _ = cancel.wait_for(|stop| *stop).await;
}

async fn run_session(
    inner: Arc<Inner>,
    date: SessionDate,
    mut cancel: watch::Receiver<bool>,
) -> EngineResult<()> {
    let recognition = inner
        .recognition
        .clone()
        .ok_or_else(|| EngineError::unavailable("no face detection service configured"))?;

    let (gallery, mapping) = inner.loader.load_async().await?;
    let resolver = IdentityResolver::new(gallery, inner.config.resolver);
    if !resolver.can_identify() {
        warn!("Empty gallery: faces will be boxed but not identified");
    }

    let mut source = inner.frames.create();
    let opened = tokio::select! {
        biased;
        _ = cancelled(&mut cancel) => None,
        r = source.open() => Some(r),
    };
    match opened {
        None => {
            source.release().await;
            return Ok(());
        }
        Some(Err(e)) => {
            source.release().await;
            return Err(EngineError::acquisition_failure(e.to_string()));
        }
        Some(Ok(())) => info!("Camera opened"),
    }

    let worker = CaptureWorker {
        inner: inner.as_ref(),
        date,
        deadline: Instant::now() + inner.config.max_duration,
        cancel: cancel.clone(),
        resolver: &resolver,
        mapping: &mapping,
        recognition: &recognition,
    };
    let result = worker.run(source.as_mut(), &mut cancel).await;
    source.release().await;
    result
}

/// Per-session view used by the capture loop.
struct CaptureWorker<'a> {
    inner: &'a Inner,
    date: SessionDate,
    deadline: Instant,
    cancel: watch::Receiver<bool>,
    resolver: &'a IdentityResolver,
    mapping: &'a NameMapping,
    recognition: &'a Recognition,
}

impl CaptureWorker<'_> {
    /// Await a collaborator call unless the session is stopped or out of
    /// time first.
    async fn interruptible<T>(&self, fut: impl Future<Output = T>) -> Option<T> {
        let mut cancel = self.cancel.clone();
        tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => None,
            _ = tokio::time::sleep_until(self.deadline) => None,
            r = fut => Some(r),
        }
    }

    async fn run(
        &self,
        source: &mut dyn FrameSource,
        cancel: &mut watch::Receiver<bool>,
    ) -> EngineResult<()> {
        let config = &self.inner.config;
        let deadline = self.deadline;
        let mut frame_idx: u64 = 0;
        let mut fps = 0.0f64;
        let mut last = Instant::now();
        let mut failures: u32 = 0;

        loop {
            let stop = *cancel.borrow();
            if stop {
                info!("Cancellation received");
                break;
            }

            let next = tokio::select! {
                biased;
                _ = cancelled(cancel) => break,
                _ = tokio::time::sleep_until(deadline) => {
                    info!(max_secs = config.max_duration.as_secs(), "Maximum session duration reached");
                    break;
                }
                r = source.next_frame() => r,
            };

            let frame = match next {
                Ok(Some(frame)) => {
                    failures = 0;
                    frame
                }
                miss => {
                    failures += 1;
                    metrics::record_read_failure();
                    match miss {
                        Err(e) => warn!(error = %e, failures, "Frame read failed"),
                        _ => debug!(failures, "No frame available"),
                    }
                    if failures >= config.max_consecutive_read_failures {
                        return Err(EngineError::acquisition_failure(format!(
                            "{} consecutive frame reads failed",
                            failures
                        )));
                    }
                    tokio::select! {
                        biased;
                        _ = cancelled(cancel) => break,
                        _ = tokio::time::sleep(config.read_retry_backoff) => {}
                    }
                    continue;
                }
            };

            frame_idx += 1;
            let now = Instant::now();
            let dt = now.duration_since(last).as_secs_f64().max(1e-6);
            fps = fps * 0.9 + (1.0 / dt) * 0.1;
            last = now;

            self.inner.update_status(|s| {
                s.frame_count = frame_idx;
                s.fps = fps;
            });
            metrics::record_frame(fps);
            self.inner.publish_preview(&frame, fps);

            if frame_idx % config.detect_every.max(1) == 0 {
                self.detection_cycle(&frame).await;
            }
            tokio::task::yield_now().await;
        }

        Ok(())
    }

    async fn detection_cycle(&self, frame: &Frame) {
        let scale = self.inner.config.detection_scale;
        let small = frame.downscale(scale);

        let started = Instant::now();
        let Some(detected) = self
            .interruptible(self.recognition.detector.detect_faces(&small))
            .await
        else {
            debug!("Detection interrupted");
            return;
        };
        let faces = match detected {
            Ok(faces) => faces,
            Err(e) => {
                let err = EngineError::detection_failure(e.to_string());
                warn!(error = %err, "Skipping detection cycle");
                metrics::record_detection_failure();
                self.inner.update_status(|s| s.error = Some(err.to_string()));
                return;
            }
        };
        metrics::record_detection(faces.len(), started.elapsed().as_secs_f64());

        let mut boxes: Vec<FaceBox> = faces
            .iter()
            .map(|face| {
                let b = face.bbox.rescale(scale);
                FaceBox::pending(b.x, b.y, b.w, b.h)
            })
            .collect();
        self.inner.preview.set_boxes(boxes.clone());

        for (face, face_box) in faces.iter().zip(boxes.iter_mut()) {
            let Some((label, confirmed)) = self.identify_face(face).await else {
                debug!("Identification interrupted");
                return;
            };
            face_box.label = label;
            face_box.confirmed = confirmed;
        }
        self.inner.preview.set_boxes(boxes);
    }

    /// Identify one face and vote for it. Returns the box label and
    /// whether its identity is confirmed, or `None` if the session was
    /// stopped while waiting on the embedder.
    async fn identify_face(&self, face: &DetectedFace) -> Option<(String, bool)> {
        let unknown = || Some((UNKNOWN_LABEL.to_string(), false));
        if !self.resolver.can_identify() {
            return unknown();
        }

        let embedding = match self
            .interruptible(self.recognition.embedder.represent(&face.crop))
            .await?
        {
            Ok(Some(embedding)) => embedding,
            Ok(None) => {
                debug!("No embedding for face");
                return unknown();
            }
            Err(e) => {
                warn!(error = %e, "Embedding failed");
                self.inner
                    .update_status(|s| s.error = Some(format!("Embedding failed: {}", e)));
                return unknown();
            }
        };

        let identification = self.resolver.identify(&embedding);
        if !identification.is_known() {
            metrics::record_identification("rejected");
            return unknown();
        }

        let id = match self.mapping.resolve(&identification.label) {
            Some(id) if self.inner.registry.contains(&id) => id,
            other => {
                if let Some(id) = other {
                    warn!(label = %identification.label, roll_no = %id, "Mapped id is not in the registry");
                }
                metrics::record_identification("unmapped");
                return Some((
                    format!("{} ({:.1}%)", identification.label, identification.confidence),
                    false,
                ));
            }
        };
        metrics::record_identification("accepted");

        let name = self
            .inner
            .registry
            .display_name(&id)
            .unwrap_or(&identification.label)
            .to_string();
        let label = format!("{} ({:.1}%)", name, identification.confidence);

        let (already, newly) = {
            let mut state = self.inner.lock_state();
            if state.votes.is_confirmed(&id) {
                (true, false)
            } else {
                metrics::record_vote();
                let newly = state.votes.vote(&id);
                debug!(
                    roll_no = %id,
                    votes = state.votes.votes_for(&id),
                    required = state.votes.required(),
                    "Vote"
                );
                if newly {
                    state.status.confirmed.push(id.clone());
                    state.status.last_seen.insert(id.clone(), name.clone());
                }
                (false, newly)
            }
        };

        if newly {
            metrics::record_confirmation();
            info!(roll_no = %id, name = %name, "Confirmed present");
            self.inner.commit_presence(&self.date, &id, &name).await;
        }

        Some((label, already || newly))
    }
}
