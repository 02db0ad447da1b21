// SPDX-License-Identifier: GPL-3.0-only

//! Read-only view of a session for on-screen feedback
//!
//! [`PreviewSnapshot`] is copied out of the controller under its lock;
//! [`PreviewLayout`] turns it into geometry for whatever draws the overlay.
//! Nothing here feeds back into capture.

use super::blend::MasterCanvas;
use super::orientation::SensorAngles;
use super::state::{PanoStatus, SweepDirection};
use crate::backends::stitcher::SweepAxis;
use crate::media::conversions::Orientation;

/// Distance of the virtual guide frame from the viewer, in view pixels
pub const GUIDE_DEPTH: f32 = 800.0;

/// Where the guide frame was anchored when the sweep began
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuideFrame {
    pub anchor: SensorAngles,
    /// Half extents of the guide rectangle
    pub width: u32,
    pub height: u32,
}

/// Canvas bookkeeping without pixel data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasView {
    pub direction: SweepDirection,
    pub backing_size: (u32, u32),
    pub logical_size: (u32, u32),
    pub extent: u32,
    pub target_extent: u32,
    pub live_offset: (i32, i32),
    pub merged_frames: usize,
}

impl CanvasView {
    pub fn of(canvas: &MasterCanvas) -> Self {
        Self {
            direction: canvas.direction(),
            backing_size: canvas.backing().dimensions(),
            logical_size: canvas.logical_size(),
            extent: canvas.extent(),
            target_extent: canvas.target_extent(),
            live_offset: canvas.live_offset(),
            merged_frames: canvas.merged_frames(),
        }
    }

    /// Fraction of the sweep completed, `0.0..=1.0`
    pub fn progress(&self) -> f32 {
        if self.target_extent == 0 {
            return 0.0;
        }
        (self.extent as f32 / self.target_extent as f32).min(1.0)
    }
}

/// Everything the overlay needs for one draw
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewSnapshot {
    pub status: PanoStatus,
    /// Main status text (intro / completing sentence / progress)
    pub advisory: Option<&'static str>,
    /// Transient progress text shown under the preview while active
    pub progress: Option<&'static str>,
    pub orientation: Orientation,
    pub pending_orientation: Orientation,
    /// Thumbnail size in the current orientation
    pub thumb_size: (u32, u32),
    pub sensor: SensorAngles,
    pub guide: Option<GuideFrame>,
    pub canvas: Option<CanvasView>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn center(&self) -> (f32, f32) {
        (
            (self.left + self.right) / 2.0,
            (self.top + self.bottom) / 2.0,
        )
    }
}

/// A line of text anchored at its horizontal centre
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Caption {
    pub text: &'static str,
    pub x: f32,
    pub y: f32,
}

/// Overlay geometry for a view of a given size
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PreviewLayout {
    /// Degrees to rotate the overlay about the view centre
    pub rotation: i32,
    /// Aiming rectangle at the centre of the view
    pub aim: Option<Rect>,
    /// Guide quad corners: left-top, right-top, right-bottom, left-bottom
    pub guide: Option<[(f32, f32); 4]>,
    pub master: Option<Rect>,
    pub live: Option<Rect>,
    pub captions: Vec<Caption>,
}

impl PreviewLayout {
    pub fn compute(snapshot: &PreviewSnapshot, view_width: f32, view_height: f32) -> Self {
        let cx = view_width / 2.0;
        let cy = view_height / 2.0;
        let (thumb_w, thumb_h) = (snapshot.thumb_size.0 as f32, snapshot.thumb_size.1 as f32);
        let aim = Rect::new(cx - thumb_w, cy - thumb_h, cx + thumb_w, cy + thumb_h);
        let caption_y = view_height * 4.0 / 5.0;

        let mut layout = Self::default();

        if snapshot.status == PanoStatus::Inactive {
            layout.rotation = -(snapshot.pending_orientation.degrees() as i32);
            if let Some(text) = snapshot.advisory {
                layout.captions.push(Caption {
                    text,
                    x: cx,
                    y: caption_y,
                });
            }
            return layout;
        }

        layout.rotation = -(snapshot.orientation.degrees() as i32);
        if let Some(text) = snapshot.progress {
            layout.captions.push(Caption {
                text,
                x: cx,
                y: caption_y,
            });
        }

        if snapshot.status == PanoStatus::Completing {
            if let Some(text) = snapshot.advisory {
                let (x, y) = aim.center();
                layout.captions.push(Caption { text, x, y });
            }
            return layout;
        }

        layout.aim = Some(aim);
        layout.guide = snapshot
            .guide
            .and_then(|guide| guide_quad(&guide, &snapshot.sensor, view_width, view_height));

        if let Some(canvas) = snapshot.canvas {
            let (bw, bh) = (canvas.backing_size.0 as f32, canvas.backing_size.1 as f32);
            let master = match canvas.direction.axis() {
                SweepAxis::Horizontal => Rect::new(cx - bw / 2.0, caption_y - bh, cx + bw / 2.0, caption_y),
                SweepAxis::Vertical => {
                    let qx = view_width / 4.0;
                    Rect::new(qx - bw / 2.0, cy - bh / 2.0, qx + bw / 2.0, cy + bh / 2.0)
                }
            };
            let left = master.left + canvas.live_offset.0 as f32;
            let top = master.top + canvas.live_offset.1 as f32;
            layout.live = Some(Rect::new(left, top, left + thumb_w, top + thumb_h));
            layout.master = Some(master);
        }

        layout
    }
}

/// Angular offset of the anchor from the current heading, projected onto the view
///
/// `None` when the anchor is behind the viewer.
fn project(anchor: f32, current: f32) -> Option<f32> {
    let theta = ((anchor - current) + 360.0).rem_euclid(360.0);
    if (90.0..=270.0).contains(&theta) {
        return None;
    }
    Some(GUIDE_DEPTH * theta.to_radians().sin())
}

/// Corners of the guide rectangle, skewed towards the side it drifted to
pub fn guide_quad(
    guide: &GuideFrame,
    current: &SensorAngles,
    view_width: f32,
    view_height: f32,
) -> Option<[(f32, f32); 4]> {
    let x = project(guide.anchor.deg_x, current.deg_x)?;
    let y = project(guide.anchor.deg_y, current.deg_y)?;

    let half_w = view_width / 2.0;
    let half_h = view_height / 2.0;
    let rect = Rect::new(
        half_w + x - guide.width as f32,
        half_h + y - guide.height as f32,
        half_w + x + guide.width as f32,
        half_h + y + guide.height as f32,
    );

    let mut left_h = rect.height();
    let mut right_h = left_h;
    let mut top_w = rect.width();
    let mut bottom_w = top_w;
    if x < 0.0 {
        left_h *= (-x / half_w) / 2.0 + 1.0;
    } else {
        right_h *= (x / half_w) / 2.0 + 1.0;
    }
    if y < 0.0 {
        top_w *= (-y / half_h) / 2.0 + 1.0;
    } else {
        bottom_w *= (y / half_h) / 2.0 + 1.0;
    }

    let (mx, my) = rect.center();
    Some([
        (mx - top_w / 2.0, my - left_h / 2.0),
        (mx + top_w / 2.0, my - right_h / 2.0),
        (mx + bottom_w / 2.0, my + right_h / 2.0),
        (mx - bottom_w / 2.0, my + left_h / 2.0),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::messages;

    fn angles(deg_x: f32, deg_y: f32) -> SensorAngles {
        SensorAngles { deg_x, deg_y }
    }

    fn snapshot(status: PanoStatus) -> PreviewSnapshot {
        PreviewSnapshot {
            status,
            advisory: None,
            progress: None,
            orientation: Orientation::Deg0,
            pending_orientation: Orientation::Deg90,
            thumb_size: (40, 30),
            sensor: angles(0.0, 0.0),
            guide: None,
            canvas: None,
        }
    }

    #[test]
    fn test_guide_centered_when_facing_anchor() {
        let guide = GuideFrame {
            anchor: angles(10.0, 20.0),
            width: 40,
            height: 30,
        };
        let quad = guide_quad(&guide, &angles(10.0, 20.0), 1000.0, 800.0).unwrap();
        assert_eq!(quad[0], (460.0, 370.0));
        assert_eq!(quad[2], (540.0, 430.0));
    }

    #[test]
    fn test_guide_skews_and_culls() {
        let guide = GuideFrame {
            anchor: angles(30.0, 0.0),
            width: 40,
            height: 30,
        };
        let quad = guide_quad(&guide, &angles(0.0, 0.0), 1000.0, 800.0).unwrap();
        // Anchor to the right: right edge taller than the left
        let left_h = quad[3].1 - quad[0].1;
        let right_h = quad[2].1 - quad[1].1;
        assert!(right_h > left_h);
        assert!(quad[0].0 > 500.0);

        // Turned around: anchor is behind the viewer
        assert!(guide_quad(&guide, &angles(210.0, 0.0), 1000.0, 800.0).is_none());
    }

    #[test]
    fn test_inactive_layout_uses_pending_rotation() {
        let mut snap = snapshot(PanoStatus::Inactive);
        snap.advisory = Some(messages::INTRO);
        let layout = PreviewLayout::compute(&snap, 1000.0, 800.0);
        assert_eq!(layout.rotation, -90);
        assert_eq!(layout.aim, None);
        assert_eq!(layout.captions.len(), 1);
        assert_eq!(layout.captions[0].y, 640.0);
    }

    #[test]
    fn test_completing_layout_hides_preview() {
        let mut snap = snapshot(PanoStatus::Completing);
        snap.advisory = Some(messages::PROCESSING);
        let layout = PreviewLayout::compute(&snap, 1000.0, 800.0);
        assert_eq!(layout.rotation, 0);
        assert_eq!(layout.master, None);
        assert_eq!(layout.captions[0].text, messages::PROCESSING);
        assert_eq!((layout.captions[0].x, layout.captions[0].y), (500.0, 400.0));
    }

    #[test]
    fn test_active_layout_places_live_frame() {
        let mut snap = snapshot(PanoStatus::ActiveRight);
        snap.canvas = Some(CanvasView {
            direction: SweepDirection::Right,
            backing_size: (240, 30),
            logical_size: (52, 30),
            extent: 52,
            target_extent: 240,
            live_offset: (12, -3),
            merged_frames: 2,
        });
        let layout = PreviewLayout::compute(&snap, 1000.0, 800.0);

        let master = layout.master.unwrap();
        assert_eq!(master, Rect::new(380.0, 610.0, 620.0, 640.0));
        let live = layout.live.unwrap();
        assert_eq!((live.left, live.top), (392.0, 607.0));
        assert_eq!((live.width(), live.height()), (40.0, 30.0));
        assert!(snap.canvas.unwrap().progress() > 0.2);
    }
}
