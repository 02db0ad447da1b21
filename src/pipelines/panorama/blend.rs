// SPDX-License-Identifier: GPL-3.0-only

//! Master canvas growth and seam blending
//!
//! The master canvas is allocated at its final size (`frame extent ×
//! max frames` along the sweep axis) the moment a direction is decided. Each
//! accepted frame advances the filled extent by the frame's position gap;
//! key frames (and the first frame) are also pasted into the canvas with the
//! overlap band cross-faded against the previous content.
//!
//! Right/down sweeps fill the canvas from its start, left/up sweeps from its
//! end, so the growing edge always faces the direction of travel.

use super::state::SweepDirection;
use crate::backends::stitcher::SweepAxis;
use crate::errors::FrameError;
use crate::media::conversions::allocate_frame;
use image::{Rgba, RgbaImage, imageops};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// How the overlap band is weighted
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize, Hash)]
pub enum BlendWeights {
    /// Integer weights: the band's first line keeps the master pixel and the
    /// rest take the new frame
    #[default]
    Quantized,
    /// Floating point gradient from the master to the new frame
    Linear,
}

impl BlendWeights {
    /// Weight of the existing master pixel `step` lines into a band of `overlap` lines
    ///
    /// Step 0 is the line deepest into the existing content and always has
    /// weight 1. Weights never increase with `step`.
    pub fn master_weight(&self, step: u32, overlap: u32) -> f32 {
        if overlap == 0 || step >= overlap {
            return 0.0;
        }
        let remaining = overlap - step;
        match self {
            BlendWeights::Quantized => (remaining / overlap) as f32,
            BlendWeights::Linear => remaining as f32 / overlap as f32,
        }
    }
}

/// Result of offering one frame to the blender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendOutcome {
    /// Frame moved against the sweep direction and was not merged
    Rejected { gap: i32 },
    /// Frame was accepted
    Merged {
        /// Filled extent along the sweep axis after the merge
        extent: u32,
        /// Overlap with the previous content (may be negative for a hole)
        overlap: i32,
        /// Placement of the frame along the sweep axis
        offset: u32,
        /// Pixels were written to the master canvas
        composited: bool,
    },
}

/// The growing panorama preview plus the most recent frame
#[derive(Debug, Clone)]
pub struct MasterCanvas {
    direction: SweepDirection,
    backing: RgbaImage,
    live: RgbaImage,
    /// Logical filled size of the canvas
    width: u32,
    height: u32,
    /// Position of the last merged frame
    x_pos: i32,
    y_pos: i32,
    /// Placement of the live frame relative to the canvas (along, cross)
    live_along: i32,
    live_cross: i32,
    target_extent: u32,
    merged_frames: usize,
}

impl MasterCanvas {
    /// Allocate a canvas for frames of `frame_width`×`frame_height`
    pub fn new(
        direction: SweepDirection,
        frame_width: u32,
        frame_height: u32,
        max_frames: usize,
    ) -> Result<Self, FrameError> {
        let frames = max_frames.max(1) as u32;
        let (backing_w, backing_h, target) = match direction.axis() {
            SweepAxis::Horizontal => {
                let target = frame_width.saturating_mul(frames);
                (target, frame_height, target)
            }
            SweepAxis::Vertical => {
                let target = frame_height.saturating_mul(frames);
                (frame_width, target, target)
            }
        };

        let backing = allocate_frame(backing_w, backing_h)?;
        let live = allocate_frame(frame_width, frame_height)?;
        debug!(
            ?direction,
            backing_w, backing_h, target, "Allocated master canvas"
        );

        Ok(Self {
            direction,
            backing,
            live,
            width: 0,
            height: 0,
            x_pos: 0,
            y_pos: 0,
            live_along: 0,
            live_cross: 0,
            target_extent: target,
            merged_frames: 0,
        })
    }

    pub fn direction(&self) -> SweepDirection {
        self.direction
    }

    /// Full backing buffer
    pub fn backing(&self) -> &RgbaImage {
        &self.backing
    }

    /// Most recent frame
    pub fn live(&self) -> &RgbaImage {
        &self.live
    }

    /// Filled `(width, height)`
    pub fn logical_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Filled extent along the sweep axis
    pub fn extent(&self) -> u32 {
        match self.direction.axis() {
            SweepAxis::Horizontal => self.width,
            SweepAxis::Vertical => self.height,
        }
    }

    pub fn target_extent(&self) -> u32 {
        self.target_extent
    }

    /// Position of the last merged frame
    pub fn position(&self) -> (i32, i32) {
        (self.x_pos, self.y_pos)
    }

    /// `(left, top)` placement of the live frame over the canvas
    pub fn live_offset(&self) -> (i32, i32) {
        match self.direction.axis() {
            SweepAxis::Horizontal => (self.live_along, self.live_cross),
            SweepAxis::Vertical => (self.live_cross, self.live_along),
        }
    }

    pub fn merged_frames(&self) -> usize {
        self.merged_frames
    }

    /// Filled extent has reached the target
    pub fn is_all_taken(&self) -> bool {
        self.target_extent > 0 && self.extent() >= self.target_extent
    }

    fn frame_along(&self) -> u32 {
        match self.direction.axis() {
            SweepAxis::Horizontal => self.live.width(),
            SweepAxis::Vertical => self.live.height(),
        }
    }

    fn frame_cross(&self) -> u32 {
        match self.direction.axis() {
            SweepAxis::Horizontal => self.live.height(),
            SweepAxis::Vertical => self.live.width(),
        }
    }

    fn backing_along(&self) -> u32 {
        match self.direction.axis() {
            SweepAxis::Horizontal => self.backing.width(),
            SweepAxis::Vertical => self.backing.height(),
        }
    }

    fn set_extent(&mut self, along: u32, cross: u32) {
        match self.direction.axis() {
            SweepAxis::Horizontal => {
                self.width = along;
                self.height = cross;
            }
            SweepAxis::Vertical => {
                self.width = cross;
                self.height = along;
            }
        }
    }
}

/// Map sweep-relative coordinates to image `(x, y)`
fn to_xy(axis: SweepAxis, along: u32, cross: u32) -> (u32, u32) {
    match axis {
        SweepAxis::Horizontal => (along, cross),
        SweepAxis::Vertical => (cross, along),
    }
}

fn mix(master: &Rgba<u8>, frame: &Rgba<u8>, weight: f32) -> Rgba<u8> {
    let channel = |m: u8, f: u8| {
        (weight * m as f32 + (1.0 - weight) * f as f32)
            .round()
            .clamp(0.0, 255.0) as u8
    };
    Rgba([
        channel(master[0], frame[0]),
        channel(master[1], frame[1]),
        channel(master[2], frame[2]),
        255,
    ])
}

/// Composites frames into a [`MasterCanvas`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SeamBlender {
    weights: BlendWeights,
}

impl SeamBlender {
    pub fn new(weights: BlendWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> BlendWeights {
        self.weights
    }

    /// Offer a frame at preview position `(x, y)` to the canvas
    ///
    /// The live buffer always takes the frame. Frames moving backwards are
    /// rejected without touching the extent or the last position. Only key
    /// frames and the first merged frame write master pixels.
    pub fn blend(
        &self,
        canvas: &mut MasterCanvas,
        frame: &RgbaImage,
        x: i32,
        y: i32,
        is_key_frame: bool,
    ) -> Result<BlendOutcome, FrameError> {
        if frame.dimensions() != canvas.live.dimensions() {
            return Err(FrameError::SizeMismatch {
                expected: canvas.live.dimensions(),
                actual: frame.dimensions(),
            });
        }
        canvas.live.copy_from_slice(frame.as_raw());

        let direction = canvas.direction;
        let (pos_along, pos_cross, last_along) = match direction.axis() {
            SweepAxis::Horizontal => (x, y, canvas.x_pos),
            SweepAxis::Vertical => (y, x, canvas.y_pos),
        };
        canvas.live_cross = pos_cross.saturating_neg();

        let gap = pos_along.saturating_sub(last_along);
        if direction.is_backwards(gap) {
            trace!(gap, ?direction, "Frame moved backwards, not merged");
            return Ok(BlendOutcome::Rejected { gap });
        }

        let first = canvas.merged_frames == 0;
        let frame_along = canvas.frame_along() as i64;
        let backing_along = canvas.backing_along() as i64;
        let overlap = if first {
            0
        } else {
            frame_along - (gap as i64).abs()
        };
        let new_extent = canvas.extent() as i64 + frame_along - overlap;

        let offset = if direction.grows_forward() {
            new_extent - frame_along
        } else {
            backing_along - new_extent
        }
        .clamp(0, backing_along - frame_along);
        canvas.live_along = offset as i32;

        let composited = is_key_frame || first;
        if composited {
            // Band of old content the new frame lands on
            let band_start = if direction.grows_forward() {
                new_extent - frame_along
            } else {
                backing_along - new_extent + frame_along - overlap
            };
            self.composite(canvas, frame, offset, band_start, overlap);
        }

        let extent = new_extent.min(backing_along) as u32;
        let cross = canvas.frame_cross();
        canvas.set_extent(extent, cross);
        canvas.x_pos = x;
        canvas.y_pos = y;
        canvas.merged_frames += 1;

        trace!(extent, overlap, offset, composited, "Frame merged");
        Ok(BlendOutcome::Merged {
            extent,
            overlap: overlap as i32,
            offset: offset as u32,
            composited,
        })
    }

    fn composite(
        &self,
        canvas: &mut MasterCanvas,
        frame: &RgbaImage,
        offset: i64,
        band_start: i64,
        overlap: i64,
    ) {
        let axis = canvas.direction.axis();
        let forward = canvas.direction.grows_forward();
        let backing_along = canvas.backing_along() as i64;
        let frame_along = canvas.frame_along() as i64;
        let cross = canvas.frame_cross();

        let lo = band_start.clamp(0, backing_along);
        let hi = (band_start + overlap).clamp(0, backing_along);

        // Master content under the band, taken before the paste covers it
        let previous = (overlap > 0 && hi > lo).then(|| {
            let len = (hi - lo) as u32;
            match axis {
                SweepAxis::Horizontal => {
                    imageops::crop_imm(&canvas.backing, lo as u32, 0, len, cross).to_image()
                }
                SweepAxis::Vertical => {
                    imageops::crop_imm(&canvas.backing, 0, lo as u32, cross, len).to_image()
                }
            }
        });

        let (px, py) = to_xy(axis, offset as u32, 0);
        imageops::replace(&mut canvas.backing, frame, px as i64, py as i64);

        let Some(previous) = previous else {
            return;
        };

        for i in lo..hi {
            let frame_line = i - offset;
            if frame_line < 0 || frame_line >= frame_along {
                continue;
            }
            let step = if forward {
                i - band_start
            } else {
                band_start + overlap - 1 - i
            };
            let weight = self.weights.master_weight(step as u32, overlap as u32);

            for j in 0..cross {
                let (mx, my) = to_xy(axis, (i - lo) as u32, j);
                let (fx, fy) = to_xy(axis, frame_line as u32, j);
                let (cx, cy) = to_xy(axis, i as u32, j);
                let pixel = mix(previous.get_pixel(mx, my), frame.get_pixel(fx, fy), weight);
                canvas.backing.put_pixel(cx, cy, pixel);
            }
        }
    }
}
