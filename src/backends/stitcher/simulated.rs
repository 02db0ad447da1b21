// SPDX-License-Identifier: GPL-3.0-only

//! Deterministic software stitching engine
//!
//! Reports scripted frame positions instead of measuring motion, and builds
//! the final panorama by pasting the registered key frames at their reported
//! offsets. Used by the `simulate` command and by tests.

use super::{FramePosition, InstanceParams, PreviewFrameInfo, StitchEngine, SweepAxis};
use crate::errors::EngineError;
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, RgbImage};
use std::io::Cursor;
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// JPEG quality of the composited result
const RESULT_JPEG_QUALITY: u8 = 90;

/// Script followed by [`SimulatedStitcher`]
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationPlan {
    /// Horizontal offset added per preview frame (thumbnail pixels)
    pub step_x: i32,
    /// Vertical offset added per preview frame (thumbnail pixels)
    pub step_y: i32,
    /// Every n-th preview frame is flagged as a key frame (frame 0 always is)
    pub key_frame_interval: usize,
    /// Preview frame indices reported as "direction lost"
    pub lost_frames: Vec<usize>,
    /// Preview frame indices that fail classification
    pub failed_previews: Vec<usize>,
    /// Make `instance_init` fail
    pub fail_init: bool,
    /// Reject the n-th key frame registration (0-based)
    pub reject_key_frame_at: Option<usize>,
}

impl Default for SimulationPlan {
    fn default() -> Self {
        Self {
            step_x: -8,
            step_y: 0,
            key_frame_interval: 1,
            lost_frames: Vec::new(),
            failed_previews: Vec::new(),
            fail_init: false,
            reject_key_frame_at: None,
        }
    }
}

impl SimulationPlan {
    /// Plan for a steady sweep of `step` thumbnail pixels per frame along `axis`
    ///
    /// A positive step moves left (horizontal) or up (vertical).
    pub fn sweep(axis: SweepAxis, step: i32) -> Self {
        let (step_x, step_y) = match axis {
            SweepAxis::Horizontal => (step, 0),
            SweepAxis::Vertical => (0, step),
        };
        Self {
            step_x,
            step_y,
            ..Self::default()
        }
    }

    fn axis(&self) -> SweepAxis {
        if self.step_y.abs() > self.step_x.abs() {
            SweepAxis::Vertical
        } else {
            SweepAxis::Horizontal
        }
    }
}

/// Number of calls received per entry point
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub init: usize,
    pub preview: usize,
    pub key_frames: usize,
    pub cancel: usize,
    pub result_size: usize,
    pub complete: usize,
    pub release: usize,
}

/// A key frame accepted by the engine
#[derive(Debug, Clone)]
struct RegisteredFrame {
    image: RgbImage,
    x: i32,
    y: i32,
    direction: i32,
}

#[derive(Debug, Default)]
struct SimState {
    params: Option<InstanceParams>,
    frame_index: usize,
    key_frames: Vec<RegisteredFrame>,
    result: Option<Vec<u8>>,
    counts: CallCounts,
}

/// Software engine driven by a [`SimulationPlan`]
#[derive(Debug)]
pub struct SimulatedStitcher {
    plan: SimulationPlan,
    state: Mutex<SimState>,
}

impl SimulatedStitcher {
    pub fn new(plan: SimulationPlan) -> Self {
        Self {
            plan,
            state: Mutex::new(SimState::default()),
        }
    }

    pub fn plan(&self) -> &SimulationPlan {
        &self.plan
    }

    /// Snapshot of the call counters
    pub fn counts(&self) -> CallCounts {
        self.lock().counts
    }

    /// `(x, y, direction)` of every registered key frame, in registration order
    pub fn registered_key_frames(&self) -> Vec<(i32, i32, i32)> {
        self.lock()
            .key_frames
            .iter()
            .map(|frame| (frame.x, frame.y, frame.direction))
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Paste key frames at their offsets (scaled to key-frame pixels) and encode
    fn compose(state: &SimState, axis: SweepAxis) -> Result<Vec<u8>, EngineError> {
        let Some(first) = state.key_frames.first() else {
            return Ok(Vec::new());
        };
        let (frame_w, frame_h) = first.image.dimensions();

        // Offsets arrive in preview pixels; key frames are larger
        let scale = state
            .params
            .map(|p| frame_w as f32 / p.width.max(1) as f32)
            .unwrap_or(1.0);

        let placements: Vec<(i64, i64)> = state
            .key_frames
            .iter()
            .map(|frame| match axis {
                SweepAxis::Horizontal => ((-frame.x as f32 * scale).round() as i64, 0),
                SweepAxis::Vertical => (0, (-frame.y as f32 * scale).round() as i64),
            })
            .collect();

        let min_x = placements.iter().map(|p| p.0).min().unwrap_or(0);
        let max_x = placements.iter().map(|p| p.0).max().unwrap_or(0);
        let min_y = placements.iter().map(|p| p.1).min().unwrap_or(0);
        let max_y = placements.iter().map(|p| p.1).max().unwrap_or(0);

        let width = (max_x - min_x) as u32 + frame_w;
        let height = (max_y - min_y) as u32 + frame_h;
        let mut canvas = RgbImage::new(width, height);
        for (frame, (x, y)) in state.key_frames.iter().zip(&placements) {
            image::imageops::replace(&mut canvas, &frame.image, x - min_x, y - min_y);
        }

        let mut jpeg = Vec::new();
        let mut cursor = Cursor::new(&mut jpeg);
        JpegEncoder::new_with_quality(&mut cursor, RESULT_JPEG_QUALITY)
            .encode(canvas.as_raw(), width, height, ExtendedColorType::Rgb8)
            .map_err(|e| {
                warn!(error = %e, "Failed to encode simulated panorama");
                EngineError::CompleteFailed(-1)
            })?;

        debug!(width, height, bytes = jpeg.len(), "Composed simulated panorama");
        Ok(jpeg)
    }
}

impl Default for SimulatedStitcher {
    fn default() -> Self {
        Self::new(SimulationPlan::default())
    }
}

impl StitchEngine for SimulatedStitcher {
    fn instance_init(&self, params: &InstanceParams) -> Result<(), EngineError> {
        let mut state = self.lock();
        state.counts.init += 1;
        if self.plan.fail_init {
            return Err(EngineError::InitFailed(-1));
        }

        info!(
            width = params.width,
            height = params.height,
            "Simulated stitcher initialised"
        );
        state.params = Some(*params);
        state.frame_index = 0;
        state.key_frames.clear();
        state.result = None;
        Ok(())
    }

    fn process_preview_frame(&self, nv21: &[u8]) -> Result<PreviewFrameInfo, EngineError> {
        let mut state = self.lock();
        state.counts.preview += 1;
        if state.params.is_none() {
            return Err(EngineError::PreviewFailed(-1));
        }

        let index = state.frame_index;
        state.frame_index += 1;
        if nv21.is_empty() || self.plan.failed_previews.contains(&index) {
            return Err(EngineError::PreviewFailed(-2));
        }

        let n = index as i32;
        let axis = if self.plan.lost_frames.contains(&index) {
            None
        } else {
            Some(self.plan.axis())
        };
        let interval = self.plan.key_frame_interval.max(1);

        Ok(PreviewFrameInfo {
            is_key_frame: index % interval == 0,
            position: FramePosition::new(n * self.plan.step_x, n * self.plan.step_y, axis),
            move_speed: self.plan.step_x.abs().max(self.plan.step_y.abs()),
        })
    }

    fn process_key_frame(
        &self,
        jpeg: &[u8],
        x: i32,
        y: i32,
        _orientation: i32,
        direction: i32,
    ) -> Result<(), EngineError> {
        let mut state = self.lock();
        let index = state.counts.key_frames;
        state.counts.key_frames += 1;

        if self.plan.reject_key_frame_at == Some(index) {
            return Err(EngineError::KeyFrameRejected(-1));
        }

        let image = image::load_from_memory(jpeg)
            .map_err(|e| {
                warn!(error = %e, "Key frame is not a decodable image");
                EngineError::KeyFrameRejected(-2)
            })?
            .to_rgb8();

        state.key_frames.push(RegisteredFrame {
            image,
            x,
            y,
            direction,
        });
        state.result = None;
        Ok(())
    }

    fn cancel_panorama(&self) -> Result<(), EngineError> {
        let mut state = self.lock();
        state.counts.cancel += 1;
        state.key_frames.clear();
        state.result = None;
        Ok(())
    }

    fn result_size(&self) -> Result<usize, EngineError> {
        let mut state = self.lock();
        state.counts.result_size += 1;
        if state.result.is_none() {
            let jpeg = Self::compose(&state, self.plan.axis())?;
            state.result = Some(jpeg);
        }
        Ok(state.result.as_ref().map_or(0, Vec::len))
    }

    fn complete_panorama(&self, out: &mut [u8]) -> Result<(), EngineError> {
        let mut state = self.lock();
        state.counts.complete += 1;
        match state.result.as_deref() {
            Some(jpeg) if !jpeg.is_empty() && jpeg.len() == out.len() => {
                out.copy_from_slice(jpeg);
                Ok(())
            }
            _ => Err(EngineError::CompleteFailed(-1)),
        }
    }

    fn instance_release(&self) -> Result<(), EngineError> {
        let mut state = self.lock();
        state.counts.release += 1;
        state.params = None;
        state.key_frames.clear();
        state.result = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::direction;

    fn params() -> InstanceParams {
        InstanceParams {
            width: 16,
            height: 12,
            stride: 16,
            orientation: 0,
            color_format: 1,
        }
    }

    fn key_frame_jpeg(width: u32, height: u32, shade: u8) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, image::Rgb([shade, shade, shade]));
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut Cursor::new(&mut out), 100)
            .encode(img.as_raw(), width, height, ExtendedColorType::Rgb8)
            .unwrap();
        out
    }

    #[test]
    fn test_scripted_positions() {
        let plan = SimulationPlan {
            key_frame_interval: 2,
            lost_frames: vec![1],
            ..SimulationPlan::sweep(SweepAxis::Horizontal, -5)
        };
        let engine = SimulatedStitcher::new(plan);
        engine.instance_init(&params()).unwrap();

        let first = engine.process_preview_frame(&[0; 4]).unwrap();
        assert!(first.is_key_frame);
        assert_eq!(first.position, FramePosition::new(0, 0, Some(SweepAxis::Horizontal)));

        let second = engine.process_preview_frame(&[0; 4]).unwrap();
        assert!(!second.is_key_frame);
        assert_eq!(second.position.axis, None);
        assert_eq!(second.position.x, -5);

        let third = engine.process_preview_frame(&[0; 4]).unwrap();
        assert!(third.is_key_frame);
        assert_eq!(third.position.x, -10);
    }

    #[test]
    fn test_preview_before_init_fails() {
        let engine = SimulatedStitcher::default();
        assert_eq!(
            engine.process_preview_frame(&[0; 4]),
            Err(EngineError::PreviewFailed(-1))
        );
    }

    #[test]
    fn test_init_failure() {
        let engine = SimulatedStitcher::new(SimulationPlan {
            fail_init: true,
            ..SimulationPlan::default()
        });
        assert_eq!(engine.instance_init(&params()), Err(EngineError::InitFailed(-1)));
        assert_eq!(engine.counts().init, 1);
    }

    #[test]
    fn test_rejected_key_frame() {
        let engine = SimulatedStitcher::new(SimulationPlan {
            reject_key_frame_at: Some(1),
            ..SimulationPlan::default()
        });
        engine.instance_init(&params()).unwrap();
        let jpeg = key_frame_jpeg(32, 24, 100);

        assert!(engine.process_key_frame(&jpeg, 0, 0, 0, 0).is_ok());
        assert_eq!(
            engine.process_key_frame(&jpeg, -4, 0, 0, 0),
            Err(EngineError::KeyFrameRejected(-1))
        );
        assert_eq!(engine.registered_key_frames(), vec![(0, 0, 0)]);
    }

    #[test]
    fn test_compose_horizontal_result() {
        let engine = SimulatedStitcher::default();
        engine.instance_init(&params()).unwrap();

        // Key frames are twice the preview size, so a -8 preview offset is 16 px
        engine
            .process_key_frame(&key_frame_jpeg(32, 24, 50), 0, 0, 0, direction::LEFT_RIGHT)
            .unwrap();
        engine
            .process_key_frame(&key_frame_jpeg(32, 24, 200), -8, 0, 0, direction::LEFT_RIGHT)
            .unwrap();

        let size = engine.result_size().unwrap();
        assert!(size > 0);
        let mut out = vec![0u8; size];
        engine.complete_panorama(&mut out).unwrap();

        let result = image::load_from_memory(&out).unwrap();
        assert_eq!((result.width(), result.height()), (48, 24));
    }

    #[test]
    fn test_empty_result_and_wrong_buffer() {
        let engine = SimulatedStitcher::default();
        engine.instance_init(&params()).unwrap();
        assert_eq!(engine.result_size(), Ok(0));
        assert_eq!(
            engine.complete_panorama(&mut []),
            Err(EngineError::CompleteFailed(-1))
        );
    }

    #[test]
    fn test_release_resets() {
        let engine = SimulatedStitcher::default();
        engine.instance_init(&params()).unwrap();
        engine
            .process_key_frame(&key_frame_jpeg(8, 8, 10), 0, 0, 0, 0)
            .unwrap();
        engine.instance_release().unwrap();

        assert!(engine.registered_key_frames().is_empty());
        assert!(engine.process_preview_frame(&[0; 4]).is_err());
        assert_eq!(engine.counts().release, 1);
    }
}
