// SPDX-License-Identifier: GPL-3.0-only

//! Frame buffer utilities
//!
//! Rotates and scales camera frames into the working orientation and converts
//! RGBA frames into the NV21 layout the stitching engine classifies.

use crate::errors::FrameError;
use image::{Rgba, RgbaImage};

/// Pixel written where a rotated/scaled source does not cover the destination
const FILL_PIXEL: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Quarter-turn orientation in degrees (clockwise)
///
/// Used both for the display orientation reported by the device and for the
/// fixed mounting angle of the camera sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum Orientation {
    /// No rotation
    #[default]
    Deg0,
    /// 90 degrees clockwise
    Deg90,
    /// 180 degrees (upside down)
    Deg180,
    /// 270 degrees clockwise (90 degrees counter-clockwise)
    Deg270,
}

impl Orientation {
    /// Create an orientation from an integer degree value (normalised to 0-360).
    ///
    /// Values that are not a multiple of 90 snap to the nearest quarter turn.
    pub fn from_degrees(degrees: i32) -> Self {
        let snapped = ((degrees.rem_euclid(360) + 45) / 90) % 4;
        match snapped {
            1 => Orientation::Deg90,
            2 => Orientation::Deg180,
            3 => Orientation::Deg270,
            _ => Orientation::Deg0,
        }
    }

    /// Get the rotation in degrees
    pub fn degrees(&self) -> u32 {
        match self {
            Orientation::Deg0 => 0,
            Orientation::Deg90 => 90,
            Orientation::Deg180 => 180,
            Orientation::Deg270 => 270,
        }
    }

    /// Check if rotation swaps width and height
    pub fn swaps_dimensions(&self) -> bool {
        matches!(self, Orientation::Deg90 | Orientation::Deg270)
    }

    /// Combine two rotations (e.g. sensor mounting + display rotation)
    pub fn combine(self, other: Orientation) -> Orientation {
        Orientation::from_degrees((self.degrees() + other.degrees()) as i32)
    }

    /// Size of a `width`×`height` buffer once laid out for this orientation
    pub fn oriented_size(&self, width: u32, height: u32) -> (u32, u32) {
        if self.swaps_dimensions() {
            (height, width)
        } else {
            (width, height)
        }
    }
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Allocate an opaque black RGBA buffer, reporting failure instead of aborting
///
/// Allocation failures are transient per-frame errors: the caller drops the
/// frame and keeps the session going.
pub fn allocate_frame(width: u32, height: u32) -> Result<RgbaImage, FrameError> {
    if width == 0 || height == 0 {
        return Err(FrameError::Empty);
    }

    let len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|px| px.checked_mul(4))
        .ok_or(FrameError::Allocation { width, height })?;

    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|_| FrameError::Allocation { width, height })?;
    data.extend(std::iter::repeat_n([0u8, 0, 0, 255], len / 4).flatten());

    RgbaImage::from_raw(width, height, data).ok_or(FrameError::Allocation { width, height })
}

/// Rotate `src` clockwise by `rotation`, scale it by `ratio` and write it into `dst`
///
/// The rotated, scaled image is anchored at the top-left corner of `dst`;
/// destination pixels it does not cover are filled opaque black. Every
/// destination pixel is written, so the result depends only on the inputs.
/// Sampling is nearest-neighbour.
pub fn rotate_and_scale(
    src: &RgbaImage,
    dst: &mut RgbaImage,
    rotation: Orientation,
    ratio: f32,
) -> Result<(), FrameError> {
    if !(ratio.is_finite() && ratio > 0.0) {
        return Err(FrameError::InvalidScale(ratio.to_string()));
    }
    let (src_w, src_h) = src.dimensions();
    if src_w == 0 || src_h == 0 {
        return Err(FrameError::Empty);
    }

    let (rot_w, rot_h) = rotation.oriented_size(src_w, src_h);
    let inv = 1.0 / ratio;

    for (x, y, pixel) in dst.enumerate_pixels_mut() {
        let rx = (x as f32 * inv) as u32;
        let ry = (y as f32 * inv) as u32;
        if rx >= rot_w || ry >= rot_h {
            *pixel = FILL_PIXEL;
            continue;
        }

        // Inverse of the clockwise rotation: rotated (rx, ry) -> source (sx, sy)
        let (sx, sy) = match rotation {
            Orientation::Deg0 => (rx, ry),
            Orientation::Deg90 => (ry, src_h - 1 - rx),
            Orientation::Deg180 => (src_w - 1 - rx, src_h - 1 - ry),
            Orientation::Deg270 => (src_w - 1 - ry, rx),
        };
        *pixel = *src.get_pixel(sx, sy);
    }

    Ok(())
}

/// Number of bytes in an NV21 buffer for the given frame size
pub fn nv21_len(width: u32, height: u32) -> usize {
    let luma = width as usize * height as usize;
    let chroma = width.div_ceil(2) as usize * height.div_ceil(2) as usize * 2;
    luma + chroma
}

/// Convert an RGBA frame into NV21 (full-res Y plane + interleaved V/U plane)
///
/// Uses the BT.601 integer coefficients; chroma is taken from the top-left
/// pixel of every 2x2 block. `out` is cleared and refilled so the caller can
/// keep one buffer for the whole session.
pub fn rgba_to_nv21(image: &RgbaImage, out: &mut Vec<u8>) {
    let (width, height) = image.dimensions();
    let luma_len = width as usize * height as usize;

    out.clear();
    out.resize(nv21_len(width, height), 0);
    let (luma, chroma) = out.split_at_mut(luma_len);

    let mut uv = 0usize;
    for (x, y, pixel) in image.enumerate_pixels() {
        let r = pixel[0] as i32;
        let g = pixel[1] as i32;
        let b = pixel[2] as i32;

        let y_val = ((66 * r + 129 * g + 25 * b + 128) >> 8) + 16;
        luma[(y * width + x) as usize] = y_val.clamp(0, 255) as u8;

        if y % 2 == 0 && x % 2 == 0 {
            let u_val = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
            let v_val = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;
            chroma[uv] = v_val.clamp(0, 255) as u8;
            chroma[uv + 1] = u_val.clamp(0, 255) as u8;
            uv += 2;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| Rgba([x as u8, y as u8, 0, 255]))
    }

    #[test]
    fn test_orientation_from_degrees() {
        assert_eq!(Orientation::from_degrees(0), Orientation::Deg0);
        assert_eq!(Orientation::from_degrees(90), Orientation::Deg90);
        assert_eq!(Orientation::from_degrees(-90), Orientation::Deg270);
        assert_eq!(Orientation::from_degrees(450), Orientation::Deg90);
        assert_eq!(Orientation::from_degrees(359), Orientation::Deg0);
    }

    #[test]
    fn test_orientation_combine() {
        assert_eq!(
            Orientation::Deg90.combine(Orientation::Deg270),
            Orientation::Deg0
        );
        assert_eq!(
            Orientation::Deg180.combine(Orientation::Deg90),
            Orientation::Deg270
        );
        assert_eq!(Orientation::Deg90.oriented_size(4, 3), (3, 4));
        assert_eq!(Orientation::Deg180.oriented_size(4, 3), (4, 3));
    }

    #[test]
    fn test_rotate_identity_copies() {
        let src = numbered(3, 2);
        let mut dst = RgbaImage::new(3, 2);
        rotate_and_scale(&src, &mut dst, Orientation::Deg0, 1.0).unwrap();
        assert_eq!(src, dst);
    }

    #[test]
    fn test_rotate_90_clockwise() {
        // Source 3x2: top-left (0,0) ends up top-right after a clockwise turn
        let src = numbered(3, 2);
        let mut dst = RgbaImage::new(2, 3);
        rotate_and_scale(&src, &mut dst, Orientation::Deg90, 1.0).unwrap();

        assert_eq!(dst.get_pixel(1, 0), src.get_pixel(0, 0));
        assert_eq!(dst.get_pixel(0, 0), src.get_pixel(0, 1));
        assert_eq!(dst.get_pixel(1, 2), src.get_pixel(2, 0));
    }

    #[test]
    fn test_rotate_180_and_270() {
        let src = numbered(3, 2);

        let mut half = RgbaImage::new(3, 2);
        rotate_and_scale(&src, &mut half, Orientation::Deg180, 1.0).unwrap();
        assert_eq!(half.get_pixel(0, 0), src.get_pixel(2, 1));

        let mut quarter = RgbaImage::new(2, 3);
        rotate_and_scale(&src, &mut quarter, Orientation::Deg270, 1.0).unwrap();
        // Counter-clockwise turn: top-right of the source becomes top-left
        assert_eq!(quarter.get_pixel(0, 0), src.get_pixel(2, 0));
        assert_eq!(quarter.get_pixel(1, 2), src.get_pixel(0, 1));
    }

    #[test]
    fn test_scale_down_and_fill() {
        let src = numbered(8, 8);
        let mut dst = RgbaImage::new(6, 6);
        rotate_and_scale(&src, &mut dst, Orientation::Deg0, 0.5).unwrap();

        assert_eq!(dst.get_pixel(1, 1), src.get_pixel(2, 2));
        assert_eq!(dst.get_pixel(3, 3), src.get_pixel(6, 6));
        // Outside the 4x4 scaled image
        assert_eq!(*dst.get_pixel(5, 5), FILL_PIXEL);
    }

    #[test]
    fn test_rotate_is_repeatable() {
        let src = numbered(5, 3);
        let mut first = RgbaImage::new(3, 5);
        let mut second = RgbaImage::from_pixel(3, 5, Rgba([9, 9, 9, 9]));
        rotate_and_scale(&src, &mut first, Orientation::Deg90, 1.0).unwrap();
        rotate_and_scale(&src, &mut second, Orientation::Deg90, 1.0).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_ratio_rejected() {
        let src = numbered(2, 2);
        let mut dst = RgbaImage::new(2, 2);
        assert!(matches!(
            rotate_and_scale(&src, &mut dst, Orientation::Deg0, 0.0),
            Err(FrameError::InvalidScale(_))
        ));
    }

    #[test]
    fn test_allocate_frame() {
        let frame = allocate_frame(4, 2).unwrap();
        assert_eq!(frame.dimensions(), (4, 2));
        assert_eq!(*frame.get_pixel(3, 1), FILL_PIXEL);
        assert_eq!(allocate_frame(0, 2), Err(FrameError::Empty));
    }

    #[test]
    fn test_nv21_layout_and_values() {
        let white = RgbaImage::from_pixel(4, 2, Rgba([255, 255, 255, 255]));
        let mut out = Vec::new();
        rgba_to_nv21(&white, &mut out);

        assert_eq!(out.len(), 4 * 2 * 3 / 2);
        // BT.601 studio swing: white maps to Y=235, neutral chroma
        assert!(out[..8].iter().all(|&y| y == 235));
        assert!(out[8..].iter().all(|&c| c == 128));
    }

    #[test]
    fn test_nv21_vu_order() {
        let red = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255]));
        let mut out = vec![1, 2, 3];
        rgba_to_nv21(&red, &mut out);

        assert_eq!(out.len(), 6);
        assert_eq!(out[0], 82);
        // V comes first in NV21 and is high for red
        assert_eq!(out[4], 240);
        assert_eq!(out[5], 90);
    }

    #[test]
    fn test_nv21_odd_dimensions() {
        assert_eq!(nv21_len(3, 3), 9 + 2 * 2 * 2);
        let img = RgbaImage::from_pixel(3, 3, Rgba([0, 0, 0, 255]));
        let mut out = Vec::new();
        rgba_to_nv21(&img, &mut out);
        assert_eq!(out.len(), nv21_len(3, 3));
        assert!(out[..9].iter().all(|&y| y == 16));
    }
}
