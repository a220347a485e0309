//! Cropping in pixel coordinates, plus the aspect-preserving crop that
//! trims a rotated canvas back to the source aspect ratio.
//!
//! # Coordinate System
//!
//! - (0, 0) = top-left corner
//! - Rectangles are clamped to the canvas before copying

use crate::decode::{ChannelBuffer, RasterImage};

use super::rotation::rotation_trig;

/// Axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Largest centered rectangle with the source aspect ratio that fits inside
/// a rotated source.
///
/// For a `src_width` x `src_height` image rotated by θ, with
/// `r = src_width / src_height`, the rectangle is the source scaled by
/// ```text
/// k = 1 / max(|cos θ| + |sin θ| / r, r * |sin θ| + |cos θ|)
/// ```
/// and centered on the rotated canvas. Origin and size are truncated,
/// then clamped to the canvas. A degenerate result selects the whole
/// canvas.
pub fn aspect_crop_rect(
    rotated_width: u32,
    rotated_height: u32,
    src_width: u32,
    src_height: u32,
    angle_degrees: f64,
) -> CropRect {
    let whole = CropRect {
        x: 0,
        y: 0,
        width: rotated_width,
        height: rotated_height,
    };
    if src_width == 0 || src_height == 0 {
        return whole;
    }

    let (cos, sin) = rotation_trig(angle_degrees);
    let (cos, sin) = (cos.abs(), sin.abs());
    let ratio = src_width as f64 / src_height as f64;

    let scale = 1.0 / (cos + sin / ratio).max(ratio * sin + cos);
    let crop_w = scale * src_width as f64;
    let crop_h = scale * src_height as f64;

    let x = ((rotated_width as f64 - crop_w) / 2.0).trunc().max(0.0) as i64;
    let y = ((rotated_height as f64 - crop_h) / 2.0).trunc().max(0.0) as i64;
    let w = (crop_w.trunc() as i64).min(rotated_width as i64 - x);
    let h = (crop_h.trunc() as i64).min(rotated_height as i64 - y);

    if w <= 0 || h <= 0 {
        return whole;
    }

    CropRect {
        x: x as u32,
        y: y as u32,
        width: w as u32,
        height: h as u32,
    }
}

/// Copy a pixel rectangle out of every plane of an image.
///
/// The rectangle is clamped to the image; a rectangle that misses the image
/// entirely yields an empty raster.
pub fn crop_region(image: &RasterImage, rect: CropRect) -> RasterImage {
    if rect.x == 0 && rect.y == 0 && rect.width >= image.width && rect.height >= image.height {
        return image.clone();
    }

    let left = rect.x.min(image.width);
    let top = rect.y.min(image.height);
    let out_width = rect.width.min(image.width - left);
    let out_height = rect.height.min(image.height - top);

    let channels = image
        .channels
        .iter()
        .map(|plane| {
            let mut data = Vec::with_capacity(out_width as usize * out_height as usize);
            // Copy pixel data row by row
            for y in top..top + out_height {
                let row_start = y as usize * plane.width as usize + left as usize;
                data.extend_from_slice(&plane.data[row_start..row_start + out_width as usize]);
            }
            ChannelBuffer::new(out_width, out_height, data)
        })
        .collect();

    RasterImage {
        width: out_width,
        height: out_height,
        layout: image.layout,
        channels,
    }
}

/// Trim a rotated canvas to the source aspect ratio.
pub fn crop_to_aspect(
    rotated: &RasterImage,
    src_width: u32,
    src_height: u32,
    angle_degrees: f64,
) -> RasterImage {
    let rect = aspect_crop_rect(
        rotated.width,
        rotated.height,
        src_width,
        src_height,
        angle_degrees,
    );
    crop_region(rotated, rect)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Create a test image with position-encoded pixels.
    fn test_image(width: u32, height: u32) -> RasterImage {
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(x as u8);
                pixels.push(y as u8);
                pixels.push(128);
            }
        }
        RasterImage::from_rgb_interleaved(width, height, &pixels)
    }

    #[test]
    fn test_full_rect_returns_copy() {
        let img = test_image(10, 8);
        let rect = CropRect {
            x: 0,
            y: 0,
            width: 10,
            height: 8,
        };
        assert_eq!(crop_region(&img, rect), img);
    }

    #[test]
    fn test_crop_region_extracts_pixels() {
        let img = test_image(10, 10);
        let rect = CropRect {
            x: 2,
            y: 3,
            width: 4,
            height: 5,
        };
        let cropped = crop_region(&img, rect);

        assert_eq!((cropped.width, cropped.height), (4, 5));
        // Red plane (index 2) encodes x, green plane encodes y
        assert_eq!(cropped.channels[2].get(0, 0), 2);
        assert_eq!(cropped.channels[1].get(0, 0), 3);
        assert_eq!(cropped.channels[2].get(3, 4), 5);
        assert_eq!(cropped.channels[1].get(3, 4), 7);
    }

    #[test]
    fn test_crop_region_clamps_to_bounds() {
        let img = test_image(10, 10);
        let rect = CropRect {
            x: 8,
            y: 8,
            width: 5,
            height: 5,
        };
        let cropped = crop_region(&img, rect);
        assert_eq!((cropped.width, cropped.height), (2, 2));
    }

    #[test]
    fn test_crop_region_outside_is_empty() {
        let img = test_image(10, 10);
        let rect = CropRect {
            x: 20,
            y: 20,
            width: 5,
            height: 5,
        };
        assert!(crop_region(&img, rect).is_empty());
    }

    #[test]
    fn test_aspect_rect_without_rotation_is_whole_canvas() {
        let rect = aspect_crop_rect(100, 50, 100, 50, 0.0);
        assert_eq!(
            rect,
            CropRect {
                x: 0,
                y: 0,
                width: 100,
                height: 50
            }
        );
    }

    #[test]
    fn test_aspect_rect_ten_degrees() {
        // 100x50 rotated by 10 degrees lands on a 107x67 canvas
        let rect = aspect_crop_rect(107, 67, 100, 50, 10.0);
        assert_eq!(
            rect,
            CropRect {
                x: 15,
                y: 14,
                width: 75,
                height: 37
            }
        );
    }

    #[test]
    fn test_aspect_rect_square_at_45_degrees() {
        // Same-aspect square inside a square turned 45 degrees: side / sqrt(2)
        let rect = aspect_crop_rect(141, 141, 100, 100, 45.0);
        assert_eq!((rect.width, rect.height), (70, 70));
        assert_eq!((rect.x, rect.y), (35, 35));
    }

    #[test]
    fn test_aspect_rect_degenerate_source_selects_canvas() {
        let rect = aspect_crop_rect(5, 5, 0, 0, 30.0);
        assert_eq!((rect.x, rect.y, rect.width, rect.height), (0, 0, 5, 5));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================
