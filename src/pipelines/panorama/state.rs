// SPDX-License-Identifier: GPL-3.0-only

//! Capture status and sweep direction inference
//!
//! ```text
//! Inactive -> Opening -> ActiveUnknown -> Active{Left,Right,Up,Down} -> Completing -> Inactive
//! ```
//!
//! A concrete direction is only ever entered from `ActiveUnknown` and is kept
//! until the session returns to `Inactive`.

use crate::backends::stitcher::{FramePosition, SweepAxis};
use crate::constants::messages;
use std::fmt;
use tracing::{debug, info};

/// Capture status of a panorama session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum PanoStatus {
    #[default]
    Inactive,
    Opening,
    ActiveUnknown,
    ActiveLeft,
    ActiveRight,
    ActiveUp,
    ActiveDown,
    Completing,
}

impl PanoStatus {
    /// Collecting frames (direction known or not)
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            PanoStatus::ActiveUnknown
                | PanoStatus::ActiveLeft
                | PanoStatus::ActiveRight
                | PanoStatus::ActiveUp
                | PanoStatus::ActiveDown
        )
    }

    /// The committed sweep direction, if any
    pub fn direction(&self) -> Option<SweepDirection> {
        match self {
            PanoStatus::ActiveLeft => Some(SweepDirection::Left),
            PanoStatus::ActiveRight => Some(SweepDirection::Right),
            PanoStatus::ActiveUp => Some(SweepDirection::Up),
            PanoStatus::ActiveDown => Some(SweepDirection::Down),
            _ => None,
        }
    }
}

impl fmt::Display for PanoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PanoStatus::Inactive => "inactive",
            PanoStatus::Opening => "opening",
            PanoStatus::ActiveUnknown => "active (direction unknown)",
            PanoStatus::ActiveLeft => "active (left)",
            PanoStatus::ActiveRight => "active (right)",
            PanoStatus::ActiveUp => "active (up)",
            PanoStatus::ActiveDown => "active (down)",
            PanoStatus::Completing => "completing",
        };
        write!(f, "{}", name)
    }
}

/// Direction the panorama grows in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SweepDirection {
    Left,
    Right,
    Up,
    Down,
}

impl SweepDirection {
    pub fn axis(&self) -> SweepAxis {
        match self {
            SweepDirection::Left | SweepDirection::Right => SweepAxis::Horizontal,
            SweepDirection::Up | SweepDirection::Down => SweepAxis::Vertical,
        }
    }

    /// Content is added after the existing extent (towards larger coordinates)
    pub fn grows_forward(&self) -> bool {
        matches!(self, SweepDirection::Right | SweepDirection::Down)
    }

    /// Whether a position gap along the sweep axis moves against this direction
    ///
    /// Positions decrease while sweeping right or down and increase while
    /// sweeping left or up.
    pub fn is_backwards(&self, gap: i32) -> bool {
        if self.grows_forward() { gap > 0 } else { gap < 0 }
    }

    fn status(self) -> PanoStatus {
        match self {
            SweepDirection::Left => PanoStatus::ActiveLeft,
            SweepDirection::Right => PanoStatus::ActiveRight,
            SweepDirection::Up => PanoStatus::ActiveUp,
            SweepDirection::Down => PanoStatus::ActiveDown,
        }
    }
}

/// Pick a direction from a preview offset once it clears the decision margin
///
/// The x axis is checked first; an offset exactly on the margin is undecided.
pub fn decide_direction(x: i32, y: i32, margin: i32) -> Option<SweepDirection> {
    if x < -margin {
        Some(SweepDirection::Right)
    } else if x > margin {
        Some(SweepDirection::Left)
    } else if y < -margin {
        Some(SweepDirection::Down)
    } else if y > margin {
        Some(SweepDirection::Up)
    } else {
        None
    }
}

/// Session status plus the advisory text shown alongside it
#[derive(Debug, Clone)]
pub struct PanoStateMachine {
    status: PanoStatus,
    decision_margin: i32,
    /// Last axis the engine reported, picks the saved image's rotation
    last_axis: Option<SweepAxis>,
    progress_message: Option<&'static str>,
    complete_message: &'static str,
}

impl PanoStateMachine {
    pub fn new(decision_margin: i32) -> Self {
        Self {
            status: PanoStatus::Inactive,
            decision_margin,
            last_axis: None,
            progress_message: None,
            complete_message: messages::PROCESSING,
        }
    }

    pub fn status(&self) -> PanoStatus {
        self.status
    }

    pub fn direction(&self) -> Option<SweepDirection> {
        self.status.direction()
    }

    pub fn decision_margin(&self) -> i32 {
        self.decision_margin
    }

    pub fn last_axis(&self) -> Option<SweepAxis> {
        self.last_axis
    }

    /// `Inactive -> Opening`; false if a session is already underway
    pub fn start_opening(&mut self) -> bool {
        if self.status != PanoStatus::Inactive {
            return false;
        }
        self.status = PanoStatus::Opening;
        self.last_axis = None;
        self.progress_message = None;
        self.complete_message = messages::PROCESSING;
        true
    }

    /// `Opening -> ActiveUnknown` once the engine instance exists
    pub fn opened(&mut self) -> bool {
        if self.status != PanoStatus::Opening {
            return false;
        }
        self.status = PanoStatus::ActiveUnknown;
        info!("Panorama session active, waiting for direction");
        true
    }

    /// `Opening -> Inactive` when the engine could not be initialised
    pub fn open_failed(&mut self) {
        if self.status == PanoStatus::Opening {
            self.status = PanoStatus::Inactive;
        }
    }

    /// Feed one preview classification, returning the committed direction
    ///
    /// A lost reading only sets the advisory; it neither decides nor clears
    /// a direction.
    pub fn observe(&mut self, position: &FramePosition) -> Option<SweepDirection> {
        if !self.status.is_active() {
            return None;
        }

        let Some(axis) = position.axis else {
            self.progress_message = Some(messages::DIRECTION_NOT_DETERMINED);
            return self.status.direction();
        };
        self.progress_message = None;
        self.last_axis = Some(axis);

        if self.status == PanoStatus::ActiveUnknown
            && let Some(dir) = decide_direction(position.x, position.y, self.decision_margin)
        {
            info!(direction = ?dir, x = position.x, y = position.y, "Sweep direction decided");
            self.status = dir.status();
        }

        self.status.direction()
    }

    /// Any active state `-> Completing`; false if there is nothing to complete
    pub fn begin_completing(&mut self, cancelling: bool) -> bool {
        if !self.status.is_active() {
            debug!(status = %self.status, cancelling, "Ignoring completion request");
            return false;
        }
        self.status = PanoStatus::Completing;
        self.complete_message = if cancelling {
            messages::CANCELLING
        } else {
            messages::PROCESSING
        };
        true
    }

    /// `Completing -> Inactive` after teardown
    pub fn finish(&mut self) {
        if self.status == PanoStatus::Completing {
            self.status = PanoStatus::Inactive;
        }
    }

    /// Replace the progress advisory (e.g. with a failure reason)
    pub fn set_progress_message(&mut self, message: &'static str) {
        self.progress_message = Some(message);
    }

    pub fn progress_message(&self) -> Option<&'static str> {
        self.progress_message
    }

    /// Text to show for the current status
    pub fn advisory(&self) -> Option<&'static str> {
        match self.status {
            PanoStatus::Inactive => Some(messages::INTRO),
            PanoStatus::Completing => Some(self.complete_message),
            _ => self.progress_message,
        }
    }
}
