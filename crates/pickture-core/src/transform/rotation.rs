//! Image rotation onto an expanded, white-filled canvas.
//!
//! # Algorithm
//!
//! The rotation uses inverse mapping: for each pixel in the output image,
//! we calculate which source position it comes from and sample it with
//! bilinear interpolation. Neighbors that fall outside the source read
//! as the fill value, so exposed corners blend into the background.
//!
//! Positive angles rotate clockwise on screen (y axis pointing down). For
//! rotation by angle θ, the inverse transform is:
//! ```text
//! src_x = src_cx + (dst_x - dst_cx) * cos(θ) + (dst_y - dst_cy) * sin(θ)
//! src_y = src_cy - (dst_x - dst_cx) * sin(θ) + (dst_y - dst_cy) * cos(θ)
//! ```
//! Centers use the pixel-center convention `((w - 1) / 2, (h - 1) / 2)`,
//! which makes quarter turns exact pixel permutations.

use crate::decode::{ChannelBuffer, RasterImage};

/// Background value for canvas area not covered by the source.
pub const WHITE: u8 = 255;

/// Tolerance for treating an angle as an exact multiple of 90 degrees.
const QUARTER_TURN_EPSILON: f64 = 1e-9;

/// Cosine and sine of an angle in degrees.
///
/// Exact multiples of 90 degrees return exact 0/±1 values instead of the
/// nearly-zero residue `f64::cos` leaves at π/2.
pub fn rotation_trig(angle_degrees: f64) -> (f64, f64) {
    let quarter = angle_degrees / 90.0;
    let nearest = quarter.round();
    if (quarter - nearest).abs() < QUARTER_TURN_EPSILON {
        return match (nearest as i64).rem_euclid(4) {
            0 => (1.0, 0.0),
            1 => (0.0, 1.0),
            2 => (-1.0, 0.0),
            _ => (0.0, -1.0),
        };
    }
    let rad = angle_degrees.to_radians();
    (rad.cos(), rad.sin())
}

/// Compute the dimensions of the bounding box for a rotated image.
///
/// When an image is rotated, the corners extend beyond the original bounds.
/// This function calculates the canvas that contains the entire rotated
/// image:
/// ```text
/// new_w = round(w * |cos θ| + h * |sin θ|)
/// new_h = round(w * |sin θ| + h * |cos θ|)
/// ```
///
/// # Example
///
/// ```ignore
/// use pickture_core::transform::compute_rotated_bounds;
///
/// // 90-degree rotation swaps dimensions
/// assert_eq!(compute_rotated_bounds(100, 50, 90.0), (50, 100));
/// ```
pub fn compute_rotated_bounds(width: u32, height: u32, angle_degrees: f64) -> (u32, u32) {
    let (cos, sin) = rotation_trig(angle_degrees);
    let (cos, sin) = (cos.abs(), sin.abs());

    let w = width as f64;
    let h = height as f64;

    let new_w = (w * cos + h * sin).round() as u32;
    let new_h = (w * sin + h * cos).round() as u32;

    (new_w.max(1), new_h.max(1))
}

/// Rotate an image about its center onto an expanded canvas.
///
/// The output canvas is sized by [`compute_rotated_bounds`] so nothing is
/// clipped; uncovered canvas area is set to `fill` in every plane.
pub fn rotate_expand(image: &RasterImage, angle_degrees: f64, fill: u8) -> RasterImage {
    if image.is_empty() {
        return image.clone();
    }

    let (dst_w, dst_h) = compute_rotated_bounds(image.width, image.height, angle_degrees);
    let (cos, sin) = rotation_trig(angle_degrees);

    let src_cx = (image.width as f64 - 1.0) / 2.0;
    let src_cy = (image.height as f64 - 1.0) / 2.0;
    let dst_cx = (dst_w as f64 - 1.0) / 2.0;
    let dst_cy = (dst_h as f64 - 1.0) / 2.0;

    let count = dst_w as usize * dst_h as usize;
    let mut planes: Vec<Vec<u8>> = image
        .channels
        .iter()
        .map(|_| Vec::with_capacity(count))
        .collect();

    for dst_y in 0..dst_h {
        let dy = dst_y as f64 - dst_cy;
        for dst_x in 0..dst_w {
            let dx = dst_x as f64 - dst_cx;

            let src_x = src_cx + dx * cos + dy * sin;
            let src_y = src_cy - dx * sin + dy * cos;

            for (plane, out) in image.channels.iter().zip(planes.iter_mut()) {
                out.push(sample_bilinear(plane, src_x, src_y, fill));
            }
        }
    }

    RasterImage {
        width: dst_w,
        height: dst_h,
        layout: image.layout,
        channels: planes
            .into_iter()
            .map(|data| ChannelBuffer::new(dst_w, dst_h, data))
            .collect(),
    }
}

/// Read a plane value, returning `fill` outside the plane.
#[inline]
fn fetch(plane: &ChannelBuffer, x: i64, y: i64, fill: u8) -> f64 {
    if x < 0 || y < 0 || x >= plane.width as i64 || y >= plane.height as i64 {
        return fill as f64;
    }
    plane.data[y as usize * plane.width as usize + x as usize] as f64
}

/// Sample a plane using bilinear interpolation.
///
/// Bilinear interpolation considers the 4 nearest pixels and weights
/// their contribution based on distance.
fn sample_bilinear(plane: &ChannelBuffer, x: f64, y: f64, fill: u8) -> u8 {
    let (w, h) = (plane.width as f64, plane.height as f64);

    // Entirely outside: no neighbor can contribute
    if x <= -1.0 || y <= -1.0 || x >= w || y >= h {
        return fill;
    }

    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let p00 = fetch(plane, x0, y0, fill);
    let p10 = fetch(plane, x0 + 1, y0, fill);
    let p01 = fetch(plane, x0, y0 + 1, fill);
    let p11 = fetch(plane, x0 + 1, y0 + 1, fill);

    let v = p00 * (1.0 - fx) * (1.0 - fy)
        + p10 * fx * (1.0 - fy)
        + p01 * (1.0 - fx) * fy
        + p11 * fx * fy;
    v.clamp(0.0, 255.0).round() as u8
}
