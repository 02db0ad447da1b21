// SPDX-License-Identifier: GPL-3.0-only

//! Capture pipelines
//!
//! - [`panorama`]: sweep panorama capture, live blending and stitching

pub mod panorama;
