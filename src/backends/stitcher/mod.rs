// SPDX-License-Identifier: GPL-3.0-only

//! Stitching engine abstraction
//!
//! Frame registration and final compositing live in an opaque engine (usually
//! a vendor library). The panorama pipeline only depends on the call contract
//! modelled by [`StitchEngine`], so tests and the CLI can substitute
//! [`SimulatedStitcher`] or any other deterministic fake.
//!
//! Raw bindings return `i32` status codes where negative means failure;
//! [`check_status`] maps those onto [`EngineError`] variants.

pub mod simulated;

pub use simulated::{CallCounts, SimulatedStitcher, SimulationPlan};

use crate::constants::direction;
use crate::errors::EngineError;

/// Axis the engine reports the camera is sweeping along
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SweepAxis {
    /// Left/right sweep (x axis)
    Horizontal,
    /// Up/down sweep (y axis)
    Vertical,
}

impl SweepAxis {
    /// Parse the engine's raw direction code; `None` means "direction lost"
    pub fn from_raw(code: i32) -> Option<Self> {
        match code {
            direction::LEFT_RIGHT => Some(SweepAxis::Horizontal),
            direction::UP_DOWN => Some(SweepAxis::Vertical),
            _ => None,
        }
    }

    /// Raw direction code understood by the engine
    pub fn as_raw(&self) -> i32 {
        match self {
            SweepAxis::Horizontal => direction::LEFT_RIGHT,
            SweepAxis::Vertical => direction::UP_DOWN,
        }
    }
}

/// Position of a preview frame relative to the first frame of the session
///
/// Offsets are in preview thumbnail pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FramePosition {
    pub x: i32,
    pub y: i32,
    /// Reported sweep axis, `None` when the engine lost track this frame
    pub axis: Option<SweepAxis>,
}

impl FramePosition {
    pub fn new(x: i32, y: i32, axis: Option<SweepAxis>) -> Self {
        Self { x, y, axis }
    }

    /// Raw direction code for key-frame registration
    pub fn raw_direction(&self) -> i32 {
        self.axis.map_or(direction::GOT_LOST, |axis| axis.as_raw())
    }
}

/// Classification of one preview frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PreviewFrameInfo {
    /// Frame should be registered at full resolution
    pub is_key_frame: bool,
    pub position: FramePosition,
    /// Engine's estimate of the sweep speed (informational)
    pub move_speed: i32,
}

/// Parameters for allocating an engine instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceParams {
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub orientation: i32,
    pub color_format: i32,
}

/// Call contract of the panorama stitching engine
///
/// Calls arrive from two threads: the frame processing thread (init, preview
/// frames, completion, release) and the key-frame worker (key frame
/// registration). Implementations synchronise internally.
pub trait StitchEngine: Send + Sync {
    /// Allocate session state for preview frames of the given size
    fn instance_init(&self, params: &InstanceParams) -> Result<(), EngineError>;

    /// Classify a low-resolution NV21 preview frame
    fn process_preview_frame(&self, nv21: &[u8]) -> Result<PreviewFrameInfo, EngineError>;

    /// Register a full-resolution JPEG key frame; an error is fatal for the session
    fn process_key_frame(
        &self,
        jpeg: &[u8],
        x: i32,
        y: i32,
        orientation: i32,
        direction: i32,
    ) -> Result<(), EngineError>;

    /// Abort the current panorama
    fn cancel_panorama(&self) -> Result<(), EngineError>;

    /// Size in bytes of the final JPEG; zero means there is no usable result
    fn result_size(&self) -> Result<usize, EngineError>;

    /// Write the final JPEG into `out`, which is exactly `result_size()` bytes
    fn complete_panorama(&self, out: &mut [u8]) -> Result<(), EngineError>;

    /// Free session state
    fn instance_release(&self) -> Result<(), EngineError>;
}

/// Map a raw status code onto a `Result`, negative codes becoming `err(code)`
pub fn check_status(code: i32, err: fn(i32) -> EngineError) -> Result<i32, EngineError> {
    if code < 0 { Err(err(code)) } else { Ok(code) }
}
