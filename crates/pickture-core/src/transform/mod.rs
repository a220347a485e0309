//! Geometric transforms: rotation and cropping.
//!
//! # Coordinate System
//!
//! - Rotation angles are in degrees, positive = clockwise on screen
//! - Crop rectangles are in pixels on the rotated canvas
//! - Origin is top-left corner
//!
//! A rotation always lands on an expanded canvas whose uncovered area is
//! white. With aspect preservation the canvas is then trimmed to the
//! largest centered rectangle of the source's aspect ratio.

mod crop;
mod rotation;

pub use crop::{aspect_crop_rect, crop_region, crop_to_aspect, CropRect};
pub use rotation::{compute_rotated_bounds, rotate_expand, rotation_trig, WHITE};

use crate::decode::RasterImage;
use crate::params::RotateParams;

/// Rotate an image, optionally cropping back to its aspect ratio.
///
/// A zero angle returns an unchanged copy.
pub fn rotate_and_crop(image: &RasterImage, params: &RotateParams) -> RasterImage {
    let angle = params.angle_degrees();
    if angle == 0.0 {
        return image.clone();
    }

    let rotated = rotate_expand(image, angle, WHITE);
    if !params.preserve_aspect_ratio() {
        return rotated;
    }
    crop_to_aspect(&rotated, image.width, image.height, angle)
}
