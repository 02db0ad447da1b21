// SPDX-License-Identifier: GPL-3.0-only

//! Bounded key-frame queue with a dedicated registration worker
//!
//! The frame processing thread hands full-resolution key frames to this queue
//! and keeps previewing. The worker encodes each frame as JPEG and registers
//! it with the stitching engine in FIFO order.
//!
//! Capacity bounds the outstanding work (queued plus the frame being
//! registered), so a producer that runs ahead of the engine stalls instead of
//! buffering frames without limit. A rejected registration is fatal: the
//! worker raises the should-finish flag, reports through the fatal hook and
//! discards everything still queued. A panic inside the engine is treated
//! the same way and leaves the worker running.

use crate::backends::stitcher::StitchEngine;
use crate::constants::{ENGINE_FRAME_ORIENTATION, KEY_FRAME_STREAM_CAPACITY};
use crate::errors::{FrameError, KeyFrameError, PanoError};
use image::RgbaImage;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};

/// Callback invoked (from the worker thread) when registration fails
pub type FatalHook = Box<dyn Fn(&PanoError) + Send + Sync>;

/// A rotated/scaled key frame waiting for registration
#[derive(Debug, Clone)]
pub struct KeyFrameTask {
    pub frame: RgbaImage,
    pub x: i32,
    pub y: i32,
    /// Raw engine direction code
    pub direction: i32,
}

#[derive(Debug, Default)]
struct QueueState {
    tasks: VecDeque<KeyFrameTask>,
    in_flight: bool,
    should_finish: bool,
    failed: bool,
    shutdown: bool,
    registered: usize,
}

impl QueueState {
    fn outstanding(&self) -> usize {
        self.tasks.len() + usize::from(self.in_flight)
    }
}

struct Shared {
    state: Mutex<QueueState>,
    not_full: Condvar,
    not_empty: Condvar,
    idle: Condvar,
    capacity: usize,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Wake whoever may be waiting on a state change after a task left
    fn notify_progress(&self, state: &QueueState) {
        self.not_full.notify_all();
        if state.outstanding() == 0 {
            self.idle.notify_all();
        }
    }
}

/// Queue handle owned by one panorama session
pub struct KeyFrameQueue {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl KeyFrameQueue {
    /// Start a worker registering frames with `engine`
    pub fn start(
        engine: Arc<dyn StitchEngine>,
        capacity: usize,
        jpeg_quality: u8,
        on_fatal: FatalHook,
    ) -> Result<Self, KeyFrameError> {
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState::default()),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            idle: Condvar::new(),
            capacity: capacity.max(1),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name("pano-key-frames".to_string())
            .spawn(move || worker_main(worker_shared, engine, jpeg_quality, on_fatal))
            .map_err(|e| KeyFrameError::SpawnFailed(e.to_string()))?;

        debug!(capacity = shared.capacity, "Key frame worker started");
        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Enqueue a key frame, blocking while the queue is full
    pub fn add_task(&self, task: KeyFrameTask) -> Result<(), KeyFrameError> {
        let mut state = self.shared.lock();
        while !state.shutdown && state.outstanding() >= self.shared.capacity {
            debug!(outstanding = state.outstanding(), "Key frame queue full, waiting");
            state = self
                .shared
                .not_full
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
        if state.shutdown {
            return Err(KeyFrameError::WorkerStopped);
        }

        state.tasks.push_back(task);
        self.shared.not_empty.notify_one();
        Ok(())
    }

    /// No task queued and none being registered
    pub fn is_empty(&self) -> bool {
        self.shared.lock().outstanding() == 0
    }

    /// Number of tasks still queued (excluding one in flight)
    pub fn len(&self) -> usize {
        self.shared.lock().tasks.len()
    }

    /// Block until all pending key-frame work has finished
    pub fn wait_until_idle(&self) {
        let mut state = self.shared.lock();
        while !state.shutdown && state.outstanding() > 0 {
            state = self
                .shared
                .idle
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Drop every queued task; a registration already in flight completes
    pub fn queue_clear(&self) {
        let mut state = self.shared.lock();
        let dropped = state.tasks.len();
        state.tasks.clear();
        self.shared.notify_progress(&state);
        if dropped > 0 {
            debug!(dropped, "Cleared key frame queue");
        }
    }

    /// Stop registering; tasks taken from now on are discarded
    pub fn set_should_finish(&self) {
        self.shared.lock().should_finish = true;
    }

    pub fn should_finish(&self) -> bool {
        self.shared.lock().should_finish
    }

    /// A registration was rejected during this session
    pub fn has_failed(&self) -> bool {
        self.shared.lock().failed
    }

    /// Frames successfully registered so far
    pub fn registered(&self) -> usize {
        self.shared.lock().registered
    }

    /// Stop the worker and wait for it to exit; queued tasks are discarded
    pub fn shutdown(mut self) {
        self.stop_worker();
    }

    fn stop_worker(&mut self) {
        {
            let mut state = self.shared.lock();
            state.shutdown = true;
            state.tasks.clear();
        }
        self.shared.not_empty.notify_all();
        self.shared.not_full.notify_all();
        self.shared.idle.notify_all();

        if let Some(worker) = self.worker.take()
            && let Err(e) = worker.join()
        {
            error!("Key frame worker panicked: {:?}", e);
        }
    }
}

impl Drop for KeyFrameQueue {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

impl std::fmt::Debug for KeyFrameQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("KeyFrameQueue")
            .field("capacity", &self.shared.capacity)
            .field("queued", &state.tasks.len())
            .field("in_flight", &state.in_flight)
            .field("should_finish", &state.should_finish)
            .field("failed", &state.failed)
            .finish()
    }
}

fn worker_main(
    shared: Arc<Shared>,
    engine: Arc<dyn StitchEngine>,
    jpeg_quality: u8,
    on_fatal: FatalHook,
) {
    let mut stream = Vec::with_capacity(KEY_FRAME_STREAM_CAPACITY);

    loop {
        let task = {
            let mut state = shared.lock();
            while state.tasks.is_empty() && !state.shutdown {
                state = shared
                    .not_empty
                    .wait(state)
                    .unwrap_or_else(|e| e.into_inner());
            }
            if state.shutdown {
                break;
            }
            let Some(task) = state.tasks.pop_front() else {
                continue;
            };
            if state.should_finish {
                debug!(x = task.x, y = task.y, "Discarding key frame");
                shared.notify_progress(&state);
                continue;
            }
            state.in_flight = true;
            task
        };

        let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
            register(engine.as_ref(), &task, jpeg_quality, &mut stream)
        }))
        .unwrap_or_else(|payload| {
            Err(KeyFrameError::RegistrationPanicked(panic_message(payload.as_ref())).into())
        });

        let fatal = {
            let mut state = shared.lock();
            state.in_flight = false;
            let fatal = match result {
                Ok(()) => {
                    state.registered += 1;
                    None
                }
                Err(e) => {
                    state.failed = true;
                    state.should_finish = true;
                    Some(e)
                }
            };
            shared.notify_progress(&state);
            fatal
        };

        if let Some(e) = fatal {
            warn!(error = %e, x = task.x, y = task.y, "Key frame registration failed");
            on_fatal(&e);
        }
    }

    info!("Key frame worker stopped");
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Encode `task` as JPEG into `stream` and hand it to the engine
fn register(
    engine: &dyn StitchEngine,
    task: &KeyFrameTask,
    jpeg_quality: u8,
    stream: &mut Vec<u8>,
) -> Result<(), PanoError> {
    stream.clear();
    let rgb = image::DynamicImage::ImageRgba8(task.frame.clone()).to_rgb8();
    let mut cursor = std::io::Cursor::new(&mut *stream);
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, jpeg_quality)
        .encode(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(FrameError::from)?;

    engine.process_key_frame(
        stream,
        task.x,
        task.y,
        ENGINE_FRAME_ORIENTATION,
        task.direction,
    )?;
    debug!(bytes = stream.len(), x = task.x, y = task.y, "Key frame registered");
    Ok(())
}
