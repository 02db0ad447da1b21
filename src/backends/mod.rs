// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer
//!
//! The capture pipeline talks to the stitching engine only through
//! [`stitcher::StitchEngine`]; [`stitcher::SimulatedStitcher`] stands in
//! when no native engine is linked.

pub mod stitcher;
