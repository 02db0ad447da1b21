// SPDX-License-Identifier: GPL-3.0-only

//! Pano Capture - incremental panorama capture and seam blending
//!
//! Camera frames are classified by a stitching engine, blended into a live
//! preview canvas as the user sweeps, and the selected key frames are
//! registered in the background for the final stitched panorama.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`pipelines`]: the panorama session (state machine, blender, key-frame
//!   queue, controller, processing thread)
//! - [`backends`]: the stitching engine interface and a software engine
//! - [`media`]: frame rotation, scaling and NV21 conversion
//! - [`config`]: user configuration and derived geometry
//! - [`storage`]: saving finished panoramas

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod media;
pub mod pipelines;
pub mod storage;

// Re-export commonly used types
pub use backends::stitcher::{SimulatedStitcher, SimulationPlan, StitchEngine};
pub use config::{PanoGeometry, PanoramaConfig};
pub use errors::{PanoError, PanoResult};
pub use media::conversions::Orientation;
pub use pipelines::panorama::{
    FrameProcessor, PanoController, PanoStatus, SessionListener, SessionOutcome,
    SessionServices,
};
pub use storage::{DiskMediaStore, MediaStore};
