//! Core raster types shared by every transform.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error types for image decoding operations.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The file format is not recognized.
    #[error("Invalid or unrecognized image format")]
    InvalidFormat,

    /// The format is recognized by extension but no codec is available for it.
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// The image file is corrupted or incomplete.
    #[error("Corrupted or incomplete image file: {0}")]
    CorruptedFile(String),

    /// I/O error during file reading.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for DecodeError {
    fn from(err: std::io::Error) -> Self {
        DecodeError::IoError(err.to_string())
    }
}

/// EXIF orientation values (1-8).
/// See: https://exiftool.org/TagNames/EXIF.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Orientation {
    /// Normal (no transformation needed).
    #[default]
    Normal = 1,
    /// Horizontal flip.
    FlipHorizontal = 2,
    /// Rotate 180 degrees.
    Rotate180 = 3,
    /// Vertical flip.
    FlipVertical = 4,
    /// Transpose (flip horizontal + rotate 270 CW).
    Transpose = 5,
    /// Rotate 90 degrees clockwise.
    Rotate90CW = 6,
    /// Transverse (flip horizontal + rotate 90 CW).
    Transverse = 7,
    /// Rotate 270 degrees clockwise (90 CCW).
    Rotate270CW = 8,
}

impl From<u32> for Orientation {
    fn from(value: u32) -> Self {
        match value {
            2 => Orientation::FlipHorizontal,
            3 => Orientation::Rotate180,
            4 => Orientation::FlipVertical,
            5 => Orientation::Transpose,
            6 => Orientation::Rotate90CW,
            7 => Orientation::Transverse,
            8 => Orientation::Rotate270CW,
            _ => Orientation::Normal,
        }
    }
}

/// Meaning of the planes held by a [`RasterImage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelLayout {
    /// Blue, green, red planes in that order.
    #[default]
    Bgr,
    /// Hue (0-179, degrees / 2), saturation (0-255), value (0-255).
    Hsv,
}

/// A dense 8-bit plane holding one channel of a raster.
///
/// Pixels are stored row-major with no padding, so whole-plane operations
/// run as tight loops over a contiguous slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelBuffer {
    /// Plane width in pixels.
    pub width: u32,
    /// Plane height in pixels.
    pub height: u32,
    /// Pixel values, `width * height` bytes.
    pub data: Vec<u8>,
}

impl ChannelBuffer {
    /// Wrap existing plane data.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(
            data.len(),
            width as usize * height as usize,
            "Channel buffer size mismatch"
        );
        Self {
            width,
            height,
            data,
        }
    }

    /// Create a plane where every pixel has `value`.
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self::new(width, height, vec![value; width as usize * height as usize])
    }

    /// Value at `(x, y)`.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// Total number of pixels in the plane.
    pub fn pixel_count(&self) -> usize {
        self.data.len()
    }
}

/// A decoded image split into per-channel planes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// How to interpret `channels`.
    pub layout: ChannelLayout,
    /// Planes in layout order; each matches `width` x `height`.
    pub channels: Vec<ChannelBuffer>,
}

impl RasterImage {
    /// Build a BGR raster from three planes of identical size.
    pub fn from_bgr_planes(blue: ChannelBuffer, green: ChannelBuffer, red: ChannelBuffer) -> Self {
        debug_assert!(blue.width == green.width && green.width == red.width);
        debug_assert!(blue.height == green.height && green.height == red.height);
        Self {
            width: blue.width,
            height: blue.height,
            layout: ChannelLayout::Bgr,
            channels: vec![blue, green, red],
        }
    }

    /// Split interleaved RGB pixel data into BGR planes.
    pub fn from_rgb_interleaved(width: u32, height: u32, pixels: &[u8]) -> Self {
        let count = width as usize * height as usize;
        debug_assert_eq!(pixels.len(), count * 3, "Pixel buffer size mismatch");

        let mut blue = Vec::with_capacity(count);
        let mut green = Vec::with_capacity(count);
        let mut red = Vec::with_capacity(count);
        for chunk in pixels.chunks_exact(3) {
            red.push(chunk[0]);
            green.push(chunk[1]);
            blue.push(chunk[2]);
        }

        Self::from_bgr_planes(
            ChannelBuffer::new(width, height, blue),
            ChannelBuffer::new(width, height, green),
            ChannelBuffer::new(width, height, red),
        )
    }

    /// Create a raster from an `image::RgbImage`.
    pub fn from_rgb_image(img: image::RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self::from_rgb_interleaved(width, height, img.as_raw())
    }

    /// Interleave BGR planes back into RGB bytes (3 bytes per pixel).
    pub fn to_rgb_interleaved(&self) -> Vec<u8> {
        debug_assert_eq!(self.layout, ChannelLayout::Bgr);
        let [blue, green, red] = [&self.channels[0], &self.channels[1], &self.channels[2]];

        let mut pixels = Vec::with_capacity(self.pixel_count() * 3);
        for ((&b, &g), &r) in blue.data.iter().zip(&green.data).zip(&red.data) {
            pixels.extend_from_slice(&[r, g, b]);
        }
        pixels
    }

    /// Get the total number of pixels.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Check if this is an empty/invalid image.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.channels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation_from_u32() {
        assert_eq!(Orientation::from(1), Orientation::Normal);
        assert_eq!(Orientation::from(6), Orientation::Rotate90CW);
        assert_eq!(Orientation::from(99), Orientation::Normal); // Invalid defaults to Normal
    }

    #[test]
    fn test_planes_are_bgr_ordered() {
        let pixels = vec![10, 20, 30, 40, 50, 60];
        let img = RasterImage::from_rgb_interleaved(2, 1, &pixels);

        assert_eq!(img.layout, ChannelLayout::Bgr);
        assert_eq!(img.channels[0].data, vec![30, 60]);
        assert_eq!(img.channels[1].data, vec![20, 50]);
        assert_eq!(img.channels[2].data, vec![10, 40]);
    }

    #[test]
    fn test_interleave_restores_rgb() {
        let pixels: Vec<u8> = (0..4 * 3 * 3).map(|v| v as u8).collect();
        let img = RasterImage::from_rgb_interleaved(4, 3, &pixels);
        assert_eq!(img.to_rgb_interleaved(), pixels);
    }

    #[test]
    fn test_channel_buffer_get() {
        let plane = ChannelBuffer::new(3, 2, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(plane.get(0, 0), 0);
        assert_eq!(plane.get(2, 0), 2);
        assert_eq!(plane.get(1, 1), 4);
        assert_eq!(plane.pixel_count(), 6);
    }

    #[test]
    fn test_raster_empty() {
        let img = RasterImage::from_rgb_interleaved(0, 0, &[]);
        assert!(img.is_empty());
        assert_eq!(img.pixel_count(), 0);
    }

    #[test]
    fn test_decode_error_display() {
        let err = DecodeError::UnsupportedFormat("heic".to_string());
        assert_eq!(err.to_string(), "Unsupported image format: heic");

        let err = DecodeError::InvalidFormat;
        assert_eq!(err.to_string(), "Invalid or unrecognized image format");
    }
}
