// SPDX-License-Identifier: GPL-3.0-only

//! Panorama capture pipeline
//!
//! ```text
//! ┌──────────────┐     ┌────────────────────┐     ┌─────────────────┐
//! │ Camera Frame │ ──▶ │  FrameProcessor    │ ──▶ │  PanoController │
//! │   (RGBA)     │     │  (drop while busy) │     │  - thumbnail    │
//! └──────────────┘     └────────────────────┘     │  - classify     │
//!                                                 │  - blend        │
//!                                                 └───┬─────────┬───┘
//!                                   key frames (JPEG) │         │ result
//!                                   ┌─────────────────▼──┐  ┌───▼──────────┐
//!                                   │   KeyFrameQueue    │  │  MediaStore  │
//!                                   │  (worker thread)   │  │  + listener  │
//!                                   └────────────────────┘  └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`state`]: session status and sweep-direction decisions
//! - [`blend`]: master canvas and seam blending of the live preview
//! - [`key_frames`]: bounded queue registering key frames with the engine
//! - [`session`]: per-frame orchestration and teardown
//! - [`processor`]: frame hand-off thread
//! - [`orientation`]: display orientation and device heading
//! - [`preview`]: overlay geometry for on-screen feedback

pub mod blend;
pub mod key_frames;
pub mod orientation;
pub mod preview;
pub mod processor;
pub mod session;
pub mod state;

pub use blend::{BlendOutcome, BlendWeights, MasterCanvas, SeamBlender};
pub use key_frames::{KeyFrameQueue, KeyFrameTask};
pub use orientation::{OrientationTracker, SensorAngles};
pub use preview::{PreviewLayout, PreviewSnapshot};
pub use processor::FrameProcessor;
pub use session::{
    FrameDisposition, PanoController, PanoHandle, SessionEvent, SessionListener, SessionOutcome,
    SessionServices,
};
pub use state::{PanoStateMachine, PanoStatus, SweepDirection};
