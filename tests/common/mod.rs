// SPDX-License-Identifier: GPL-3.0-only

//! Shared fixtures for integration tests

#![allow(dead_code)]

use image::{Rgba, RgbaImage};
use pano_capture::backends::stitcher::{
    CallCounts, FramePosition, InstanceParams, PreviewFrameInfo, SimulatedStitcher,
    SimulationPlan, StitchEngine, SweepAxis,
};
use pano_capture::config::{PanoGeometry, PanoramaConfig};
use pano_capture::errors::{EngineError, PanoError, PanoResult};
use pano_capture::media::conversions::Orientation;
use pano_capture::pipelines::panorama::{
    FrameDisposition, OrientationTracker, PanoController, SessionListener, SessionOutcome,
    SessionServices,
};
use pano_capture::storage::{MediaStore, SavedMedia};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Camera frame size used throughout; thumbnails come out at 40x30
pub const CAMERA: (u32, u32) = (320, 240);

pub fn camera_frame(shade: u8) -> RgbaImage {
    RgbaImage::from_pixel(CAMERA.0, CAMERA.1, Rgba([shade, 255 - shade, 128, 255]))
}

/// Collects every outcome reported by a controller
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<(Uuid, SessionOutcome)>>,
}

impl RecordingListener {
    pub fn outcomes(&self) -> Vec<SessionOutcome> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(_, outcome)| outcome.clone())
            .collect()
    }

    pub fn sessions(&self) -> Vec<Uuid> {
        self.events.lock().unwrap().iter().map(|(id, _)| *id).collect()
    }
}

impl SessionListener for RecordingListener {
    fn on_outcome(&self, session: Uuid, outcome: SessionOutcome) {
        self.events.lock().unwrap().push((session, outcome));
    }
}

/// Keeps saved panoramas in memory
#[derive(Default)]
pub struct MemoryStore {
    pub fail: bool,
    saved: Mutex<Vec<Vec<u8>>>,
}

impl MemoryStore {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn saved(&self) -> Vec<Vec<u8>> {
        self.saved.lock().unwrap().clone()
    }
}

impl MediaStore for MemoryStore {
    fn save_panorama(
        &self,
        jpeg: &[u8],
        width: u32,
        height: u32,
        rotation: u32,
    ) -> PanoResult<SavedMedia> {
        if self.fail {
            return Err(PanoError::Storage("disk full".into()));
        }
        let mut saved = self.saved.lock().unwrap();
        saved.push(jpeg.to_vec());
        Ok(SavedMedia {
            path: PathBuf::from(format!("memory/PANO_{}.jpg", saved.len())),
            width,
            height,
            rotation,
            bytes: jpeg.len(),
        })
    }
}

/// Engine replaying a fixed list of preview positions
///
/// Every frame is a key frame; the result is a fixed byte string.
pub struct ScriptedEngine {
    script: Vec<FramePosition>,
    result: Vec<u8>,
    state: Mutex<(usize, CallCounts)>,
}

impl ScriptedEngine {
    pub fn new(script: Vec<FramePosition>) -> Self {
        Self {
            script,
            result: vec![0xFF, 0xD8, 0xFF, 0xD9],
            state: Mutex::new((0, CallCounts::default())),
        }
    }

    /// Horizontal positions, all with a known direction
    pub fn along_x(xs: &[i32]) -> Self {
        Self::new(
            xs.iter()
                .map(|&x| FramePosition::new(x, 0, Some(SweepAxis::Horizontal)))
                .collect(),
        )
    }

    pub fn counts(&self) -> CallCounts {
        self.state.lock().unwrap().1
    }
}

impl StitchEngine for ScriptedEngine {
    fn instance_init(&self, _params: &InstanceParams) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        state.0 = 0;
        state.1.init += 1;
        Ok(())
    }

    fn process_preview_frame(&self, _nv21: &[u8]) -> Result<PreviewFrameInfo, EngineError> {
        let mut state = self.state.lock().unwrap();
        state.1.preview += 1;
        let position = self
            .script
            .get(state.0)
            .copied()
            .ok_or(EngineError::PreviewFailed(-3))?;
        state.0 += 1;
        Ok(PreviewFrameInfo {
            is_key_frame: true,
            position,
            move_speed: 0,
        })
    }

    fn process_key_frame(
        &self,
        _jpeg: &[u8],
        _x: i32,
        _y: i32,
        _orientation: i32,
        _direction: i32,
    ) -> Result<(), EngineError> {
        self.state.lock().unwrap().1.key_frames += 1;
        Ok(())
    }

    fn cancel_panorama(&self) -> Result<(), EngineError> {
        self.state.lock().unwrap().1.cancel += 1;
        Ok(())
    }

    fn result_size(&self) -> Result<usize, EngineError> {
        self.state.lock().unwrap().1.result_size += 1;
        Ok(self.result.len())
    }

    fn complete_panorama(&self, out: &mut [u8]) -> Result<(), EngineError> {
        self.state.lock().unwrap().1.complete += 1;
        out.copy_from_slice(&self.result);
        Ok(())
    }

    fn instance_release(&self) -> Result<(), EngineError> {
        self.state.lock().unwrap().1.release += 1;
        Ok(())
    }
}

/// A controller wired to recording collaborators
pub struct Harness<E> {
    pub controller: PanoController,
    pub engine: Arc<E>,
    pub listener: Arc<RecordingListener>,
    pub store: Arc<MemoryStore>,
}

impl<E: StitchEngine + 'static> Harness<E> {
    pub fn with_store(engine: E, store: MemoryStore) -> Self {
        let config = PanoramaConfig::default();
        let geometry = PanoGeometry::from_config(&config, CAMERA, CAMERA);
        let engine = Arc::new(engine);
        let listener = Arc::new(RecordingListener::default());
        let store = Arc::new(store);
        let services = SessionServices {
            engine: engine.clone(),
            store: store.clone(),
            listener: listener.clone(),
        };
        let controller = PanoController::new(
            config,
            geometry,
            OrientationTracker::new(Orientation::Deg0, Orientation::Deg0),
            services,
        )
        .unwrap();

        Self {
            controller,
            engine,
            listener,
            store,
        }
    }

    pub fn new(engine: E) -> Self {
        Self::with_store(engine, MemoryStore::default())
    }

    pub fn feed(&mut self, shade: u8) -> FrameDisposition {
        self.controller
            .on_frame_available(Some(&camera_frame(shade)), false)
    }

    pub fn stop(&mut self, cancelling: bool) -> FrameDisposition {
        self.controller.on_frame_available(None, cancelling)
    }
}

pub fn simulated(plan: SimulationPlan) -> Harness<SimulatedStitcher> {
    Harness::new(SimulatedStitcher::new(plan))
}
