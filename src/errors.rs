// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the panorama engine
//!
//! None of these cross the session boundary: the controller turns them into a
//! dropped frame or a terminal [`SessionOutcome`](crate::pipelines::panorama::SessionOutcome).

use std::fmt;

/// Result type alias using PanoError
pub type PanoResult<T> = Result<T, PanoError>;

/// Main error type
#[derive(Debug, Clone)]
pub enum PanoError {
    /// Stitching engine reported a failure
    Engine(EngineError),
    /// A single frame could not be processed
    Frame(FrameError),
    /// Key-frame worker errors
    KeyFrame(KeyFrameError),
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
    /// Generic error with message
    Other(String),
}

/// Stitching engine errors, carrying the raw status code where there is one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Instance allocation failed
    InitFailed(i32),
    /// Preview frame classification failed
    PreviewFailed(i32),
    /// Key frame registration was rejected (fatal for the session)
    KeyFrameRejected(i32),
    /// Result size was zero or negative
    InvalidResultSize(i32),
    /// Final composite could not be produced
    CompleteFailed(i32),
    /// Cancel call failed
    CancelFailed(i32),
    /// Release call failed
    ReleaseFailed(i32),
}

/// Per-frame errors; the frame is dropped and the session continues
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Buffer of the requested size could not be allocated
    Allocation { width: u32, height: u32 },
    /// Frame does not match the size the session was opened with
    SizeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    /// Frame has a zero dimension
    Empty,
    /// Scale ratio is not a positive finite number
    InvalidScale(String),
    /// JPEG encoding failed
    Encoding(String),
}

/// Key-frame queue errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyFrameError {
    /// Worker has shut down and no longer accepts tasks
    WorkerStopped,
    /// Worker thread could not be started
    SpawnFailed(String),
    /// The engine panicked while registering a key frame
    RegistrationPanicked(String),
}

impl fmt::Display for PanoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PanoError::Engine(e) => write!(f, "Stitching engine error: {}", e),
            PanoError::Frame(e) => write!(f, "Frame error: {}", e),
            PanoError::KeyFrame(e) => write!(f, "Key frame error: {}", e),
            PanoError::Config(msg) => write!(f, "Configuration error: {}", msg),
            PanoError::Storage(msg) => write!(f, "Storage error: {}", msg),
            PanoError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InitFailed(code) => write!(f, "Instance init failed ({})", code),
            EngineError::PreviewFailed(code) => {
                write!(f, "Preview frame processing failed ({})", code)
            }
            EngineError::KeyFrameRejected(code) => write!(f, "Key frame rejected ({})", code),
            EngineError::InvalidResultSize(size) => write!(f, "Invalid result size: {}", size),
            EngineError::CompleteFailed(code) => write!(f, "Complete panorama failed ({})", code),
            EngineError::CancelFailed(code) => write!(f, "Cancel panorama failed ({})", code),
            EngineError::ReleaseFailed(code) => write!(f, "Instance release failed ({})", code),
        }
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Allocation { width, height } => {
                write!(f, "Failed to allocate {}x{} buffer", width, height)
            }
            FrameError::SizeMismatch { expected, actual } => write!(
                f,
                "Frame size mismatch: expected {}x{}, got {}x{}",
                expected.0, expected.1, actual.0, actual.1
            ),
            FrameError::Empty => write!(f, "Frame is empty"),
            FrameError::InvalidScale(ratio) => write!(f, "Invalid scale ratio: {}", ratio),
            FrameError::Encoding(msg) => write!(f, "Encoding failed: {}", msg),
        }
    }
}

impl fmt::Display for KeyFrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyFrameError::WorkerStopped => write!(f, "Key frame worker has stopped"),
            KeyFrameError::SpawnFailed(msg) => write!(f, "Failed to start worker: {}", msg),
            KeyFrameError::RegistrationPanicked(msg) => {
                write!(f, "Key frame registration panicked: {}", msg)
            }
        }
    }
}

impl std::error::Error for PanoError {}
impl std::error::Error for EngineError {}
impl std::error::Error for FrameError {}
impl std::error::Error for KeyFrameError {}

impl From<EngineError> for PanoError {
    fn from(err: EngineError) -> Self {
        PanoError::Engine(err)
    }
}

impl From<FrameError> for PanoError {
    fn from(err: FrameError) -> Self {
        PanoError::Frame(err)
    }
}

impl From<KeyFrameError> for PanoError {
    fn from(err: KeyFrameError) -> Self {
        PanoError::KeyFrame(err)
    }
}

impl From<String> for PanoError {
    fn from(msg: String) -> Self {
        PanoError::Other(msg)
    }
}

impl From<&str> for PanoError {
    fn from(msg: &str) -> Self {
        PanoError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for PanoError {
    fn from(err: std::io::Error) -> Self {
        PanoError::Storage(err.to_string())
    }
}

impl From<image::ImageError> for FrameError {
    fn from(err: image::ImageError) -> Self {
        FrameError::Encoding(err.to_string())
    }
}

impl From<serde_json::Error> for PanoError {
    fn from(err: serde_json::Error) -> Self {
        PanoError::Config(err.to_string())
    }
}
