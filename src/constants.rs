// SPDX-License-Identifier: GPL-3.0-only

//! Engine-wide constants

/// Maximum number of frames in one panorama sweep
///
/// Bounds the key-frame queue and sizes the master canvas
/// (`frame extent × MAX_PANO_FRAME` along the sweep axis).
pub const MAX_PANO_FRAME: usize = 6;

/// Fraction of the preview thumbnail height an offset must exceed before a
/// sweep direction is committed
pub const DECISION_MARGIN_RATIO: f32 = 0.2;

/// JPEG quality used when handing key frames to the stitching engine
pub const KEY_FRAME_JPEG_QUALITY: u8 = 100;

/// Initial capacity of the reusable key-frame JPEG buffer
pub const KEY_FRAME_STREAM_CAPACITY: usize = 1024 * 1024;

/// Width multiplier advertised to the media store for a finished panorama
pub const RESULT_WIDTH_FACTOR: u32 = 8;

/// Rotation recorded for a saved horizontal panorama
pub const HORIZONTAL_RESULT_ROTATION: u32 = 270;

/// Rotation recorded for a saved vertical panorama
pub const VERTICAL_RESULT_ROTATION: u32 = 0;

/// Default edge length of the thumbnail handed back after a save
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 256;

/// Default folder name for saving panoramas
pub const DEFAULT_SAVE_FOLDER: &str = "Panorama";

/// Raw direction codes reported by the stitching engine
pub mod direction {
    /// Direction could not be determined for this frame
    pub const GOT_LOST: i32 = -1;
    /// Sweep runs along the x axis
    pub const LEFT_RIGHT: i32 = 0;
    /// Sweep runs along the y axis
    pub const UP_DOWN: i32 = 1;
}

/// Colour format code passed to instance init (planar NV21)
pub const COLOR_FORMAT_NV21: i32 = 1;

/// Orientation passed to instance init and key-frame registration
///
/// Frames are already rotated upright before they reach the engine.
pub const ENGINE_FRAME_ORIENTATION: i32 = 0;

/// User-facing advisory and outcome messages
pub mod messages {
    pub const INTRO: &str = "Press the shutter and slowly pan the camera";
    pub const DIRECTION_NOT_DETERMINED: &str = "Direction is not determined";
    pub const DIRECTION_CHANGED: &str = "Direction is changed. Panorama capture failed";
    pub const PROCESSING: &str = "Processing...";
    pub const CANCELLING: &str = "Cancelling...";
    pub const CANCELLED: &str = "Panorama cancelled";
    pub const TOO_SHORT: &str = "Panorama too short, nothing was saved";
    pub const INIT_FAILED: &str = "Failed to start panorama capture";
    pub const RESULT_FAILED: &str = "Failed to create panorama";
    pub const SAVE_FAILED: &str = "Failed to save panorama";
}
