// SPDX-License-Identifier: GPL-3.0-only

//! Panorama session orchestration
//!
//! [`PanoController`] owns one session at a time:
//!
//! 1. The first frame opens an engine instance sized for the current
//!    orientation and starts the key-frame worker.
//! 2. Each later frame is shrunk to the preview thumbnail, classified by the
//!    engine, queued for registration if it is a key frame, and blended into
//!    the master canvas once a direction is known.
//! 3. A full canvas, a stop request (`None` frame) or a fatal key-frame error
//!    tears the session down: drain or clear the queue, fetch the final JPEG
//!    or cancel, release the engine and return to `Inactive`.
//!
//! Exactly one [`SessionOutcome`] is reported per opened session. Errors never
//! escape: they become a dropped frame or a failed outcome.
//!
//! All methods taking `&mut self` run on one processing thread. The status,
//! canvas and orientation live behind a single lock shared with
//! [`PanoHandle`], which the renderer and sensor callbacks use.

use super::blend::{BlendOutcome, MasterCanvas, SeamBlender};
use super::key_frames::{FatalHook, KeyFrameQueue, KeyFrameTask};
use super::orientation::{OrientationTracker, SensorAngles};
use super::preview::{CanvasView, GuideFrame, PreviewSnapshot};
use super::state::{PanoStateMachine, PanoStatus};
use crate::backends::stitcher::{InstanceParams, StitchEngine, SweepAxis};
use crate::config::{PanoGeometry, PanoramaConfig};
use crate::constants::{
    COLOR_FORMAT_NV21, ENGINE_FRAME_ORIENTATION, HORIZONTAL_RESULT_ROTATION, RESULT_WIDTH_FACTOR,
    VERTICAL_RESULT_ROTATION, messages,
};
use crate::errors::{PanoError, PanoResult};
use crate::media::conversions::{Orientation, allocate_frame, rgba_to_nv21, rotate_and_scale};
use crate::storage::{MediaStore, SavedMedia};
use image::RgbaImage;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Terminal result of one session
#[derive(Debug, Clone)]
pub enum SessionOutcome {
    /// Panorama stored; thumbnail is absent if the result could not be decoded
    Saved {
        media: SavedMedia,
        thumbnail: Option<RgbaImage>,
    },
    /// Stopped by the user, or stopped before anything was stitched
    Cancelled { message: &'static str },
    /// Stopped by an error
    Failed { message: &'static str },
}

impl SessionOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, SessionOutcome::Saved { .. })
    }

    /// User-facing text for cancel/failure outcomes
    pub fn message(&self) -> Option<&'static str> {
        match self {
            SessionOutcome::Saved { .. } => None,
            SessionOutcome::Cancelled { message } | SessionOutcome::Failed { message } => {
                Some(message)
            }
        }
    }
}

impl fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionOutcome::Saved { media, .. } => write!(f, "saved {}", media.path.display()),
            SessionOutcome::Cancelled { message } => write!(f, "cancelled: {}", message),
            SessionOutcome::Failed { message } => write!(f, "failed: {}", message),
        }
    }
}

/// A session outcome tagged with its session id
#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub session: Uuid,
    pub outcome: SessionOutcome,
}

/// Receives the single outcome of each session
///
/// Called on the processing thread; implementations hand off to their own
/// thread (UI loop, async runtime) instead of doing heavy work inline.
pub trait SessionListener: Send + Sync {
    fn on_outcome(&self, session: Uuid, outcome: SessionOutcome);
}

impl SessionListener for tokio::sync::mpsc::UnboundedSender<SessionEvent> {
    fn on_outcome(&self, session: Uuid, outcome: SessionOutcome) {
        if self.send(SessionEvent { session, outcome }).is_err() {
            debug!(%session, "Session listener channel closed");
        }
    }
}

/// Asks whoever drives the controller to post a stop (`true` = cancelling)
pub type StopHook = Arc<dyn Fn(bool) + Send + Sync>;

/// Collaborators of the controller
#[derive(Clone)]
pub struct SessionServices {
    pub engine: Arc<dyn StitchEngine>,
    pub store: Arc<dyn MediaStore>,
    pub listener: Arc<dyn SessionListener>,
}

/// What happened to one `on_frame_available` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDisposition {
    /// Session is opening or completing, or there was nothing to stop
    Ignored,
    /// Engine instance opened; the frame itself is not processed
    Opened,
    /// Engine instance could not be opened
    OpenFailed,
    /// Transient error, frame skipped
    Dropped,
    /// Frame classified (and blended once a direction is known)
    Processed {
        status: PanoStatus,
        blend: Option<BlendOutcome>,
    },
    /// Session torn down
    Finished,
}

/// State shared with the renderer and sensor callbacks
#[derive(Debug)]
struct SharedView {
    machine: PanoStateMachine,
    canvas: Option<MasterCanvas>,
    orientation: OrientationTracker,
    sensor: SensorAngles,
    guide: Option<GuideFrame>,
    geometry: PanoGeometry,
}

fn lock_view(shared: &Mutex<SharedView>) -> MutexGuard<'_, SharedView> {
    shared.lock().unwrap_or_else(|e| e.into_inner())
}

/// Thread-safe access to status, orientation and the canvas
#[derive(Clone)]
pub struct PanoHandle {
    shared: Arc<Mutex<SharedView>>,
}

impl PanoHandle {
    pub fn status(&self) -> PanoStatus {
        lock_view(&self.shared).machine.status()
    }

    /// Record a display rotation; deferred while a session runs
    pub fn set_orientation(&self, orientation: Orientation) {
        let mut view = lock_view(&self.shared);
        let active = view.machine.status() != PanoStatus::Inactive;
        view.orientation.set(orientation, active);
    }

    pub fn orientation(&self) -> OrientationTracker {
        lock_view(&self.shared).orientation
    }

    /// Feed a rotation-vector sample; malformed samples are ignored
    pub fn update_sensor(&self, rotation_vector: &[f32]) {
        let mut view = lock_view(&self.shared);
        let portrait = view.orientation.is_portrait();
        if let Some(angles) = SensorAngles::from_rotation_vector(rotation_vector, portrait) {
            view.sensor = angles;
        }
    }

    pub fn sensor(&self) -> SensorAngles {
        lock_view(&self.shared).sensor
    }

    pub fn snapshot(&self) -> PreviewSnapshot {
        let view = lock_view(&self.shared);
        PreviewSnapshot {
            status: view.machine.status(),
            advisory: view.machine.advisory(),
            progress: view.machine.progress_message(),
            orientation: view.orientation.current(),
            pending_orientation: view.orientation.pending(),
            thumb_size: view.geometry.thumb_size(view.orientation.current()),
            sensor: view.sensor,
            guide: view.guide,
            canvas: view.canvas.as_ref().map(CanvasView::of),
        }
    }

    /// Run `f` on the canvas pixels under the lock
    pub fn with_canvas<R>(&self, f: impl FnOnce(&MasterCanvas) -> R) -> Option<R> {
        lock_view(&self.shared).canvas.as_ref().map(f)
    }
}

/// Per-session resources owned by the processing thread
struct ActiveSession {
    id: Uuid,
    queue: KeyFrameQueue,
    fatal: Arc<AtomicBool>,
    rotation: Orientation,
    thumb: RgbaImage,
    final_size: (u32, u32),
    nv21: Vec<u8>,
    frames: usize,
    dropped: usize,
}

impl ActiveSession {
    fn has_failed(&self) -> bool {
        self.fatal.load(Ordering::Acquire) || self.queue.has_failed()
    }

    /// Stop registering and wait for the worker to let go of the engine
    fn discard_key_frames(&self) {
        self.queue.set_should_finish();
        self.queue.queue_clear();
        self.queue.wait_until_idle();
    }
}

/// Drives panorama sessions from a stream of camera frames
pub struct PanoController {
    services: SessionServices,
    config: PanoramaConfig,
    geometry: PanoGeometry,
    blender: SeamBlender,
    shared: Arc<Mutex<SharedView>>,
    session: Option<ActiveSession>,
    stop_hook: Option<StopHook>,
}

impl PanoController {
    pub fn new(
        config: PanoramaConfig,
        geometry: PanoGeometry,
        orientation: OrientationTracker,
        services: SessionServices,
    ) -> PanoResult<Self> {
        config.validate()?;
        if !geometry.is_valid() {
            return Err(PanoError::Config(format!(
                "Preview too small for {} frames: thumbnail {}x{}",
                geometry.max_frames, geometry.thumb_width, geometry.thumb_height
            )));
        }

        let shared = Arc::new(Mutex::new(SharedView {
            machine: PanoStateMachine::new(geometry.decision_margin),
            canvas: None,
            orientation,
            sensor: SensorAngles::default(),
            guide: None,
            geometry,
        }));

        Ok(Self {
            services,
            blender: SeamBlender::new(config.blend_weights),
            config,
            geometry,
            shared,
            session: None,
            stop_hook: None,
        })
    }

    pub fn handle(&self) -> PanoHandle {
        PanoHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn status(&self) -> PanoStatus {
        lock_view(&self.shared).machine.status()
    }

    pub fn geometry(&self) -> &PanoGeometry {
        &self.geometry
    }

    pub fn config(&self) -> &PanoramaConfig {
        &self.config
    }

    /// Id of the running session
    pub fn session_id(&self) -> Option<Uuid> {
        self.session.as_ref().map(|s| s.id)
    }

    /// Installed before a session opens; used when the key-frame worker fails
    pub fn set_stop_hook(&mut self, hook: StopHook) {
        self.stop_hook = Some(hook);
    }

    /// Single entry point per camera frame; `None` ends the capture
    pub fn on_frame_available(
        &mut self,
        frame: Option<&RgbaImage>,
        is_cancelling: bool,
    ) -> FrameDisposition {
        let Some(frame) = frame else {
            return self.finish(is_cancelling);
        };

        match self.status() {
            PanoStatus::Opening | PanoStatus::Completing => return FrameDisposition::Ignored,
            PanoStatus::Inactive => return self.open(),
            _ => {}
        }

        if self.session.as_ref().is_some_and(ActiveSession::has_failed) {
            return self.finish(false);
        }

        match self.process_frame(frame) {
            Ok(disposition) => disposition,
            Err(e) => {
                if let Some(session) = self.session.as_mut() {
                    session.dropped += 1;
                    warn!(session = %session.id, error = %e, "Dropping frame");
                }
                FrameDisposition::Dropped
            }
        }
    }

    fn open(&mut self) -> FrameDisposition {
        let (thumb_size, final_size, rotation) = {
            let mut view = lock_view(&self.shared);
            if !view.machine.start_opening() {
                return FrameDisposition::Ignored;
            }
            let current = view.orientation.current();
            (
                self.geometry.thumb_size(current),
                self.geometry.final_size(current),
                view.orientation.frame_rotation(),
            )
        };

        let id = Uuid::new_v4();
        let (width, height) = thumb_size;
        let params = InstanceParams {
            width,
            height,
            stride: width,
            orientation: ENGINE_FRAME_ORIENTATION,
            color_format: COLOR_FORMAT_NV21,
        };

        if let Err(e) = self.services.engine.instance_init(&params) {
            error!(session = %id, error = %e, "Failed to create panorama instance");
            return self.fail_open(id, false);
        }

        let thumb = match allocate_frame(width, height) {
            Ok(thumb) => thumb,
            Err(e) => {
                error!(session = %id, error = %e, "Failed to allocate preview buffer");
                return self.fail_open(id, true);
            }
        };

        let fatal = Arc::new(AtomicBool::new(false));
        let queue = match KeyFrameQueue::start(
            Arc::clone(&self.services.engine),
            self.config.max_frames,
            self.config.key_frame_quality,
            self.fatal_hook(id, Arc::clone(&fatal)),
        ) {
            Ok(queue) => queue,
            Err(e) => {
                error!(session = %id, error = %e, "Failed to start key frame worker");
                return self.fail_open(id, true);
            }
        };

        self.session = Some(ActiveSession {
            id,
            queue,
            fatal,
            rotation,
            thumb,
            final_size,
            nv21: Vec::new(),
            frames: 0,
            dropped: 0,
        });
        lock_view(&self.shared).machine.opened();

        info!(session = %id, width, height, %rotation, "Panorama session opened");
        FrameDisposition::Opened
    }

    fn fail_open(&mut self, id: Uuid, release: bool) -> FrameDisposition {
        if release && let Err(e) = self.services.engine.instance_release() {
            warn!(session = %id, error = %e, "Instance release failed");
        }
        {
            let mut view = lock_view(&self.shared);
            view.machine.open_failed();
            view.orientation.apply_pending();
        }
        self.services.listener.on_outcome(
            id,
            SessionOutcome::Failed {
                message: messages::INIT_FAILED,
            },
        );
        FrameDisposition::OpenFailed
    }

    fn fatal_hook(&self, id: Uuid, fatal: Arc<AtomicBool>) -> FatalHook {
        let shared = Arc::clone(&self.shared);
        let stop = self.stop_hook.clone();
        Box::new(move |err: &PanoError| {
            error!(session = %id, error = %err, "Key frame rejected, stopping panorama");
            fatal.store(true, Ordering::Release);
            lock_view(&shared)
                .machine
                .set_progress_message(messages::DIRECTION_CHANGED);
            if let Some(stop) = &stop {
                stop(false);
            }
        })
    }

    fn process_frame(&mut self, frame: &RgbaImage) -> PanoResult<FrameDisposition> {
        let Some(session) = self.session.as_mut() else {
            return Ok(FrameDisposition::Ignored);
        };
        session.frames += 1;

        rotate_and_scale(
            frame,
            &mut session.thumb,
            session.rotation,
            self.geometry.preview_ratio,
        )?;
        rgba_to_nv21(&session.thumb, &mut session.nv21);
        let info = self.services.engine.process_preview_frame(&session.nv21)?;
        let position = info.position;

        let direction = lock_view(&self.shared).machine.observe(&position);

        if info.is_key_frame {
            let (width, height) = session.final_size;
            let mut key = allocate_frame(width, height)?;
            rotate_and_scale(frame, &mut key, session.rotation, self.geometry.final_ratio)?;
            session.queue.add_task(KeyFrameTask {
                frame: key,
                x: position.x,
                y: position.y,
                direction: position.raw_direction(),
            })?;
        }

        if session.has_failed() {
            return Ok(self.finish(false));
        }

        let mut guard = lock_view(&self.shared);
        let view = &mut *guard;
        if view.canvas.is_none()
            && let Some(direction) = direction
        {
            let (width, height) = session.thumb.dimensions();
            view.canvas = Some(MasterCanvas::new(
                direction,
                width,
                height,
                self.config.max_frames,
            )?);
            view.guide = Some(GuideFrame {
                anchor: view.sensor,
                width,
                height,
            });
            info!(session = %session.id, ?direction, "Sweep started");
        }

        let status = view.machine.status();
        let Some(canvas) = view.canvas.as_mut() else {
            return Ok(FrameDisposition::Processed {
                status,
                blend: None,
            });
        };

        let outcome = self.blender.blend(
            canvas,
            &session.thumb,
            position.x,
            position.y,
            info.is_key_frame,
        )?;
        let all_taken = canvas.is_all_taken();
        drop(guard);

        if all_taken {
            info!(session = %session.id, "Panorama canvas full");
            return Ok(self.finish(false));
        }

        Ok(FrameDisposition::Processed {
            status,
            blend: Some(outcome),
        })
    }

    /// Tear the session down, reporting its outcome
    fn finish(&mut self, cancelling: bool) -> FrameDisposition {
        let (has_canvas, last_axis) = {
            let mut view = lock_view(&self.shared);
            if !view.machine.begin_completing(cancelling) {
                return FrameDisposition::Ignored;
            }
            (view.canvas.is_some(), view.machine.last_axis())
        };

        let Some(session) = self.session.take() else {
            warn!("Completing without an open session");
            self.reset_view();
            return FrameDisposition::Finished;
        };

        let id = session.id;
        info!(
            session = %id,
            cancelling,
            frames = session.frames,
            dropped = session.dropped,
            key_frames = session.queue.registered(),
            "Finishing panorama session"
        );

        let outcome = self.conclude(&session, cancelling, has_canvas, last_axis);

        session.queue.shutdown();
        if let Err(e) = self.services.engine.instance_release() {
            warn!(session = %id, error = %e, "Instance release failed");
        }
        self.reset_view();

        info!(session = %id, outcome = %outcome, "Panorama session ended");
        self.services.listener.on_outcome(id, outcome);
        FrameDisposition::Finished
    }

    fn conclude(
        &self,
        session: &ActiveSession,
        cancelling: bool,
        has_canvas: bool,
        last_axis: Option<SweepAxis>,
    ) -> SessionOutcome {
        if session.has_failed() || cancelling || !has_canvas {
            session.discard_key_frames();
            self.cancel_engine(session.id);
            return if session.has_failed() {
                SessionOutcome::Failed {
                    message: messages::DIRECTION_CHANGED,
                }
            } else if cancelling {
                SessionOutcome::Cancelled {
                    message: messages::CANCELLED,
                }
            } else {
                SessionOutcome::Cancelled {
                    message: messages::TOO_SHORT,
                }
            };
        }

        session.queue.wait_until_idle();
        if session.has_failed() {
            self.cancel_engine(session.id);
            return SessionOutcome::Failed {
                message: messages::DIRECTION_CHANGED,
            };
        }

        match self.complete(session.id, last_axis) {
            Ok((media, thumbnail)) => SessionOutcome::Saved { media, thumbnail },
            Err(message) => SessionOutcome::Failed { message },
        }
    }

    /// Fetch the final JPEG, save it and build the thumbnail
    fn complete(
        &self,
        id: Uuid,
        last_axis: Option<SweepAxis>,
    ) -> Result<(SavedMedia, Option<RgbaImage>), &'static str> {
        let engine = &self.services.engine;
        let size = match engine.result_size() {
            Ok(size) if size > 0 => size,
            Ok(_) => {
                warn!(session = %id, "Engine produced no panorama");
                self.cancel_engine(id);
                return Err(messages::RESULT_FAILED);
            }
            Err(e) => {
                warn!(session = %id, error = %e, "Result size query failed");
                self.cancel_engine(id);
                return Err(messages::RESULT_FAILED);
            }
        };

        let mut jpeg = vec![0u8; size];
        if let Err(e) = engine.complete_panorama(&mut jpeg) {
            warn!(session = %id, error = %e, "Complete panorama failed");
            self.cancel_engine(id);
            return Err(messages::RESULT_FAILED);
        }

        let rotation = match last_axis {
            Some(SweepAxis::Vertical) => VERTICAL_RESULT_ROTATION,
            _ => HORIZONTAL_RESULT_ROTATION,
        };
        let media = self
            .services
            .store
            .save_panorama(
                &jpeg,
                self.geometry.final_width * RESULT_WIDTH_FACTOR,
                self.geometry.final_height,
                rotation,
            )
            .map_err(|e| {
                warn!(session = %id, error = %e, "Saving panorama failed");
                messages::SAVE_FAILED
            })?;

        let thumbnail = make_thumbnail(&jpeg, rotation, self.config.thumbnail_size)
            .map_err(|e| warn!(session = %id, error = %e, "Thumbnail decode failed"))
            .ok();

        Ok((media, thumbnail))
    }

    fn cancel_engine(&self, id: Uuid) {
        if let Err(e) = self.services.engine.cancel_panorama() {
            warn!(session = %id, error = %e, "Cancel panorama failed");
        }
    }

    fn reset_view(&self) {
        let mut view = lock_view(&self.shared);
        view.canvas = None;
        view.guide = None;
        view.machine.finish();
        view.orientation.apply_pending();
    }
}

impl Drop for PanoController {
    fn drop(&mut self) {
        if self.session.is_some() {
            self.finish(true);
        }
    }
}

/// Decode the result, rotate it for display and shrink it
fn make_thumbnail(jpeg: &[u8], rotation: u32, size: u32) -> Result<RgbaImage, image::ImageError> {
    let decoded = image::load_from_memory(jpeg)?;
    let rotated = match rotation {
        90 => decoded.rotate90(),
        180 => decoded.rotate180(),
        270 => decoded.rotate270(),
        _ => decoded,
    };
    Ok(rotated.thumbnail(size, size).to_rgba8())
}
