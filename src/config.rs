// SPDX-License-Identifier: GPL-3.0-only

//! Panorama configuration and derived session geometry

use crate::constants::{
    DECISION_MARGIN_RATIO, DEFAULT_SAVE_FOLDER, DEFAULT_THUMBNAIL_SIZE, KEY_FRAME_JPEG_QUALITY,
    MAX_PANO_FRAME,
};
use crate::errors::{PanoError, PanoResult};
use crate::media::conversions::Orientation;
use crate::pipelines::panorama::BlendWeights;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name of the application's config directory
pub const CONFIG_DIR_NAME: &str = "pano-capture";

/// Name of the config file inside [`CONFIG_DIR_NAME`]
pub const CONFIG_FILE_NAME: &str = "config.json";

/// User configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanoramaConfig {
    /// Frames in a full sweep; sizes the canvas and the key-frame queue
    pub max_frames: usize,
    /// Fraction of the thumbnail height an offset must exceed to pick a direction
    pub decision_margin_ratio: f32,
    /// JPEG quality for key frames handed to the engine
    pub key_frame_quality: u8,
    /// Seam weighting
    pub blend_weights: BlendWeights,
    /// Where finished panoramas go (defaults to `<Pictures>/Panorama`)
    pub output_dir: Option<PathBuf>,
    /// Longest edge of the thumbnail produced after a save
    pub thumbnail_size: u32,
}

impl Default for PanoramaConfig {
    fn default() -> Self {
        Self {
            max_frames: MAX_PANO_FRAME,
            decision_margin_ratio: DECISION_MARGIN_RATIO,
            key_frame_quality: KEY_FRAME_JPEG_QUALITY,
            blend_weights: BlendWeights::default(),
            output_dir: None,
            thumbnail_size: DEFAULT_THUMBNAIL_SIZE,
        }
    }
}

impl PanoramaConfig {
    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from `path`, or from [`default_path`](Self::default_path) when `None`
    ///
    /// A missing file yields the defaults; a malformed or invalid one is an error.
    pub fn load(path: Option<&Path>) -> PanoResult<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => {
                    debug!("No config directory, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(&path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        info!(path = %path.display(), "Loaded panorama config");
        Ok(config)
    }

    /// Write the config as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> PanoResult<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn to_json(&self) -> PanoResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> PanoResult<()> {
        if !(2..=16).contains(&self.max_frames) {
            return Err(PanoError::Config(format!(
                "max_frames must be between 2 and 16, got {}",
                self.max_frames
            )));
        }
        if !(self.decision_margin_ratio > 0.0 && self.decision_margin_ratio < 1.0) {
            return Err(PanoError::Config(format!(
                "decision_margin_ratio must be between 0 and 1, got {}",
                self.decision_margin_ratio
            )));
        }
        if !(1..=100).contains(&self.key_frame_quality) {
            return Err(PanoError::Config(format!(
                "key_frame_quality must be between 1 and 100, got {}",
                self.key_frame_quality
            )));
        }
        if self.thumbnail_size == 0 {
            return Err(PanoError::Config("thumbnail_size must be positive".into()));
        }
        Ok(())
    }

    /// Output directory, falling back to the user's pictures folder
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(default_output_dir)
    }
}

/// `<Pictures>/Panorama`, or `~/Panorama` without a pictures folder
pub fn default_output_dir() -> PathBuf {
    dirs::picture_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(DEFAULT_SAVE_FOLDER)
}

/// Working sizes derived from the preview and camera resolutions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanoGeometry {
    /// Frame size handed to the engine for classification
    pub thumb_width: u32,
    pub thumb_height: u32,
    /// Key frame size handed to the engine for registration
    pub final_width: u32,
    pub final_height: u32,
    /// Offset needed to commit to a direction, in thumbnail pixels
    pub decision_margin: i32,
    /// Camera frame -> thumbnail scale
    pub preview_ratio: f32,
    /// Camera frame -> key frame scale
    pub final_ratio: f32,
    pub max_frames: usize,
}

impl PanoGeometry {
    pub fn new(
        preview_width: u32,
        preview_height: u32,
        camera_width: u32,
        camera_height: u32,
        max_frames: usize,
        decision_margin_ratio: f32,
    ) -> Self {
        let divisor = max_frames as u32 + 2;
        let thumb_width = preview_width / divisor / 2 * 2;
        let thumb_height = preview_height / divisor / 2 * 2;
        let final_width = preview_width / 2 * 2;
        let final_height = preview_height / 2 * 2;

        let camera_min = camera_width.min(camera_height).max(1) as f32;

        Self {
            thumb_width,
            thumb_height,
            final_width,
            final_height,
            decision_margin: (decision_margin_ratio * thumb_height as f32) as i32,
            preview_ratio: thumb_width.min(thumb_height) as f32 / camera_min,
            final_ratio: final_width.min(final_height) as f32 / camera_min,
            max_frames,
        }
    }

    /// Geometry for a validated config
    pub fn from_config(
        config: &PanoramaConfig,
        preview: (u32, u32),
        camera: (u32, u32),
    ) -> Self {
        Self::new(
            preview.0,
            preview.1,
            camera.0,
            camera.1,
            config.max_frames,
            config.decision_margin_ratio,
        )
    }

    /// Thumbnail size laid out for a display orientation
    pub fn thumb_size(&self, orientation: Orientation) -> (u32, u32) {
        orientation.oriented_size(self.thumb_width, self.thumb_height)
    }

    /// Key frame size laid out for a display orientation
    pub fn final_size(&self, orientation: Orientation) -> (u32, u32) {
        orientation.oriented_size(self.final_width, self.final_height)
    }

    /// Both working sizes are usable
    pub fn is_valid(&self) -> bool {
        self.thumb_width > 0 && self.thumb_height > 0 && self.final_width > 0
    }
}
