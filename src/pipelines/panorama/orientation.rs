// SPDX-License-Identifier: GPL-3.0-only

//! Display orientation tracking and rotation-vector angles
//!
//! Display orientation changes are deferred while a session runs: frames of
//! one session must keep the size the engine was initialised with.

use crate::media::conversions::Orientation;
use tracing::debug;

/// Current and deferred display orientation plus the sensor mounting angle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OrientationTracker {
    current: Orientation,
    pending: Orientation,
    sensor: Orientation,
}

impl OrientationTracker {
    pub fn new(display: Orientation, sensor: Orientation) -> Self {
        Self {
            current: display,
            pending: display,
            sensor,
        }
    }

    /// Orientation frames are laid out for
    pub fn current(&self) -> Orientation {
        self.current
    }

    /// Orientation to switch to once the session ends
    pub fn pending(&self) -> Orientation {
        self.pending
    }

    pub fn sensor(&self) -> Orientation {
        self.sensor
    }

    /// Record a display rotation; applied immediately only when no session runs
    pub fn set(&mut self, orientation: Orientation, session_active: bool) {
        self.pending = orientation;
        if session_active {
            debug!(%orientation, "Deferring orientation change until session ends");
        } else {
            self.current = orientation;
        }
    }

    /// Adopt the pending orientation (session returned to inactive)
    pub fn apply_pending(&mut self) {
        self.current = self.pending;
    }

    /// Rotation that brings a camera frame upright for the current display
    pub fn frame_rotation(&self) -> Orientation {
        self.sensor.combine(self.current)
    }

    /// Display held upright (0° or 180°)
    pub fn is_portrait(&self) -> bool {
        !self.current.swaps_dimensions()
    }
}

/// Device heading used to float the guide frame in the preview
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorAngles {
    /// Yaw in degrees, `[0, 360)`
    pub deg_x: f32,
    /// Pitch in degrees, `[0, 360)`
    pub deg_y: f32,
}

impl SensorAngles {
    /// Convert a rotation-vector sample (`x, y, z[, w]` of a unit quaternion)
    ///
    /// The device frame is remapped so the camera looks along the heading
    /// axis: `(X, Z)` in portrait, `(Z, X)` in landscape.
    pub fn from_rotation_vector(values: &[f32], portrait: bool) -> Option<Self> {
        if values.len() < 3 {
            return None;
        }

        let r = rotation_matrix(values);
        let m = if portrait {
            remap_portrait(&r)
        } else {
            remap_landscape(&r)
        };

        let azimuth = m[1].atan2(m[4]).to_degrees();
        let pitch = (-m[7]).clamp(-1.0, 1.0).asin().to_degrees();

        let mut deg_x = (azimuth + 360.0) % 360.0;
        let mut deg_y = (pitch + 360.0) % 360.0;
        if !portrait {
            deg_x = (deg_x + 180.0) % 360.0;
            deg_y = (-deg_y + 360.0) % 360.0;
        }
        Some(Self { deg_x, deg_y })
    }
}

/// Row-major 3x3 rotation matrix from a rotation vector
fn rotation_matrix(v: &[f32]) -> [f32; 9] {
    let (q1, q2, q3) = (v[0], v[1], v[2]);
    let q0 = match v.get(3) {
        Some(w) => *w,
        None => (1.0 - q1 * q1 - q2 * q2 - q3 * q3).max(0.0).sqrt(),
    };

    let sq_q1 = 2.0 * q1 * q1;
    let sq_q2 = 2.0 * q2 * q2;
    let sq_q3 = 2.0 * q3 * q3;
    let q1_q2 = 2.0 * q1 * q2;
    let q3_q0 = 2.0 * q3 * q0;
    let q1_q3 = 2.0 * q1 * q3;
    let q2_q0 = 2.0 * q2 * q0;
    let q2_q3 = 2.0 * q2 * q3;
    let q1_q0 = 2.0 * q1 * q0;

    [
        1.0 - sq_q2 - sq_q3,
        q1_q2 - q3_q0,
        q1_q3 + q2_q0,
        q1_q2 + q3_q0,
        1.0 - sq_q1 - sq_q3,
        q2_q3 - q1_q0,
        q1_q3 - q2_q0,
        q2_q3 + q1_q0,
        1.0 - sq_q1 - sq_q2,
    ]
}

/// Device X stays X, device Z becomes Y (and Y becomes -Z)
fn remap_portrait(r: &[f32; 9]) -> [f32; 9] {
    let mut out = [0.0; 9];
    for row in 0..3 {
        let i = row * 3;
        out[i] = r[i];
        out[i + 1] = -r[i + 2];
        out[i + 2] = r[i + 1];
    }
    out
}

/// Device Z becomes X and device X becomes Y
fn remap_landscape(r: &[f32; 9]) -> [f32; 9] {
    let mut out = [0.0; 9];
    for row in 0..3 {
        let i = row * 3;
        out[i] = r[i + 1];
        out[i + 1] = r[i + 2];
        out[i + 2] = r[i];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        let d = (a - b).abs();
        d < 1e-3 || (360.0 - d).abs() < 1e-3
    }

    #[test]
    fn test_pending_orientation() {
        let mut tracker = OrientationTracker::new(Orientation::Deg0, Orientation::Deg90);
        tracker.set(Orientation::Deg90, true);
        assert_eq!(tracker.current(), Orientation::Deg0);
        assert_eq!(tracker.pending(), Orientation::Deg90);

        tracker.apply_pending();
        assert_eq!(tracker.current(), Orientation::Deg90);
        assert!(!tracker.is_portrait());
        assert_eq!(tracker.frame_rotation(), Orientation::Deg180);

        tracker.set(Orientation::Deg180, false);
        assert_eq!(tracker.current(), Orientation::Deg180);
    }

    #[test]
    fn test_upright_portrait_is_zero() {
        // Device tilted 90 degrees about X: screen facing the user
        let s = std::f32::consts::FRAC_1_SQRT_2;
        let angles = SensorAngles::from_rotation_vector(&[s, 0.0, 0.0, s], true).unwrap();
        assert!(close(angles.deg_x, 0.0), "{:?}", angles);
        assert!(close(angles.deg_y, 0.0), "{:?}", angles);
    }

    #[test]
    fn test_yaw_follows_heading() {
        // Upright device turned 30 degrees about the world vertical
        let (sb, cb) = (15f32.to_radians().sin(), 15f32.to_radians().cos());
        let s45 = std::f32::consts::FRAC_1_SQRT_2;
        let q = [cb * s45, sb * s45, s45 * sb, cb * s45];
        let angles = SensorAngles::from_rotation_vector(&q, true).unwrap();
        assert!(close(angles.deg_x, 330.0), "{:?}", angles);
        assert!(close(angles.deg_y, 0.0), "{:?}", angles);
    }

    #[test]
    fn test_landscape_adjustment() {
        let angles = SensorAngles::from_rotation_vector(&[0.0, 0.0, 0.0], false).unwrap();
        assert!(close(angles.deg_x, 180.0), "{:?}", angles);
        assert!(close(angles.deg_y, 90.0), "{:?}", angles);
    }

    #[test]
    fn test_short_sample_rejected() {
        assert_eq!(SensorAngles::from_rotation_vector(&[0.1, 0.2], true), None);
    }
}
