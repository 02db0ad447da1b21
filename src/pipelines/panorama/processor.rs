// SPDX-License-Identifier: GPL-3.0-only

//! Frame processing thread
//!
//! Camera callbacks hand frames to [`FrameProcessor::submit_frame`], which
//! never blocks: a frame arriving while the previous one is still being
//! processed is dropped. Stop requests are queued behind the frame in flight
//! and always delivered.

use super::session::{FrameDisposition, PanoController, PanoHandle};
use super::state::PanoStatus;
use crate::errors::{PanoError, PanoResult};
use image::RgbaImage;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::thread::JoinHandle;
use tracing::{debug, error, info};

enum Command {
    Frame(RgbaImage),
    Stop { cancelling: bool },
    Shutdown,
}

/// Flags shared between submitters and the processing thread
#[derive(Debug, Default)]
struct Flags {
    /// Frames are wanted (a session is requested)
    active: AtomicBool,
    /// A frame is queued or being processed
    busy: AtomicBool,
    processed: AtomicU64,
    dropped: AtomicU64,
}

/// Owns a [`PanoController`] on a dedicated thread
pub struct FrameProcessor {
    sender: Sender<Command>,
    flags: Arc<Flags>,
    handle: PanoHandle,
    thread: Option<JoinHandle<()>>,
}

impl FrameProcessor {
    pub fn start(mut controller: PanoController) -> PanoResult<Self> {
        let (sender, receiver) = std::sync::mpsc::channel();
        let flags = Arc::new(Flags::default());

        let hook_sender = sender.clone();
        let hook_flags = Arc::clone(&flags);
        controller.set_stop_hook(Arc::new(move |cancelling| {
            hook_flags.active.store(false, Ordering::Release);
            if hook_sender.send(Command::Stop { cancelling }).is_err() {
                debug!("Processor gone, stop request dropped");
            }
        }));

        let handle = controller.handle();
        let thread_flags = Arc::clone(&flags);
        let thread = std::thread::Builder::new()
            .name("pano-frames".to_string())
            .spawn(move || processor_main(controller, receiver, thread_flags))
            .map_err(|e| PanoError::Other(format!("Spawn frame processor: {}", e)))?;

        Ok(Self {
            sender,
            flags,
            handle,
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> &PanoHandle {
        &self.handle
    }

    pub fn is_active(&self) -> bool {
        self.flags.active.load(Ordering::Acquire)
    }

    /// A frame is queued or being processed
    pub fn is_busy(&self) -> bool {
        self.flags.busy.load(Ordering::Acquire)
    }

    pub fn processed_frames(&self) -> u64 {
        self.flags.processed.load(Ordering::Relaxed)
    }

    pub fn dropped_frames(&self) -> u64 {
        self.flags.dropped.load(Ordering::Relaxed)
    }

    /// Start or stop capturing
    ///
    /// Ignored while the previous session is completing or when nothing
    /// changes. Stopping posts an end-of-capture to the processing thread.
    pub fn change_pano_status(&self, active: bool, cancelling: bool) -> bool {
        if self.handle.status() == PanoStatus::Completing {
            debug!(active, "Session completing, status change ignored");
            return false;
        }
        if self.flags.active.swap(active, Ordering::AcqRel) == active {
            return false;
        }

        info!(active, cancelling, "Panorama capture status changed");
        if !active && self.sender.send(Command::Stop { cancelling }).is_err() {
            error!("Frame processor stopped, cannot end session");
        }
        true
    }

    /// Hand a camera frame over; false if it was dropped
    pub fn submit_frame(&self, frame: RgbaImage) -> bool {
        if !self.is_active() {
            return false;
        }
        if self.flags.busy.swap(true, Ordering::AcqRel) {
            self.flags.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        if self.sender.send(Command::Frame(frame)).is_err() {
            self.flags.busy.store(false, Ordering::Release);
            return false;
        }
        true
    }
}

impl Drop for FrameProcessor {
    fn drop(&mut self) {
        if self.sender.send(Command::Shutdown).is_err() {
            debug!("Processor already gone, shutdown not sent");
        }
        if let Some(thread) = self.thread.take()
            && let Err(e) = thread.join()
        {
            error!(?e, "Frame processor thread panicked");
        }
    }
}

fn processor_main(mut controller: PanoController, receiver: Receiver<Command>, flags: Arc<Flags>) {
    debug!("Frame processor started");
    while let Ok(command) = receiver.recv() {
        match command {
            Command::Frame(frame) => {
                if flags.active.load(Ordering::Acquire) {
                    let disposition = controller.on_frame_available(Some(&frame), false);
                    flags.processed.fetch_add(1, Ordering::Relaxed);
                    // Session ended on its own (canvas full, failure)
                    if matches!(
                        disposition,
                        FrameDisposition::Finished | FrameDisposition::OpenFailed
                    ) {
                        flags.active.store(false, Ordering::Release);
                    }
                }
                flags.busy.store(false, Ordering::Release);
            }
            Command::Stop { cancelling } => {
                controller.on_frame_available(None, cancelling);
            }
            Command::Shutdown => break,
        }
    }
    debug!("Frame processor exiting");
}
