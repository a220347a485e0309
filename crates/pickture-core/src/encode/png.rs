//! Lossless PNG encoding for processed results.
//!
//! Every processed variant is stored and saved as PNG so that the cache
//! holds exactly the pixels the transform produced.

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use thiserror::Error;

use crate::decode::{ChannelLayout, RasterImage};

/// Errors that can occur during PNG encoding.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// A plane's length doesn't match the raster dimensions
    #[error("Invalid pixel data: expected {expected} bytes per plane (width * height), got {actual}")]
    InvalidPixelData { expected: usize, actual: usize },

    /// Width or height is zero
    #[error("Invalid dimensions: width ({width}) and height ({height}) must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    /// Only BGR rasters with three planes can be encoded
    #[error("Cannot encode a {layout:?} raster with {channels} channels")]
    UnsupportedLayout {
        layout: ChannelLayout,
        channels: usize,
    },

    /// PNG encoding failed
    #[error("PNG encoding failed: {0}")]
    EncodingFailed(String),
}

/// Encode a BGR raster to PNG bytes.
///
/// # Errors
///
/// Rejects empty rasters, HSV rasters, and rasters whose planes don't
/// match the declared dimensions.
///
/// # Example
///
/// ```ignore
/// use pickture_core::encode::encode_png;
///
/// let png = encode_png(&raster)?;
/// assert_eq!(&png[1..4], b"PNG");
/// ```
pub fn encode_png(image: &RasterImage) -> Result<Vec<u8>, EncodeError> {
    let (width, height) = (image.width, image.height);
    if width == 0 || height == 0 {
        return Err(EncodeError::InvalidDimensions { width, height });
    }

    if image.layout != ChannelLayout::Bgr || image.channels.len() != 3 {
        return Err(EncodeError::UnsupportedLayout {
            layout: image.layout,
            channels: image.channels.len(),
        });
    }

    let expected = image.pixel_count();
    if let Some(plane) = image.channels.iter().find(|c| c.data.len() != expected) {
        return Err(EncodeError::InvalidPixelData {
            expected,
            actual: plane.data.len(),
        });
    }

    let pixels = image.to_rgb_interleaved();
    let mut buffer = Vec::new();
    PngEncoder::new(&mut buffer)
        .write_image(&pixels, width, height, ExtendedColorType::Rgb8)
        .map_err(|e| EncodeError::EncodingFailed(e.to_string()))?;

    Ok(buffer)
}


// ============================================================================
// Property-Based Tests
// ============================================================================
