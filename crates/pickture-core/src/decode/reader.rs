//! Image decoding with EXIF orientation handling.

use std::io::Cursor;
use std::path::Path;

use exif::{In, Reader, Tag};
use image::{DynamicImage, ImageError, ImageReader};

use super::{DecodeError, Orientation, RasterImage};

/// Extensions the scanner lists but no codec in this build can read.
const UNDECODABLE_EXTENSIONS: [&str; 2] = ["heic", "heif"];

/// Decode an image from bytes, applying EXIF orientation correction.
///
/// The result is a BGR raster. Any format the `image` crate recognizes
/// from its magic bytes is accepted.
///
/// # Errors
///
/// Returns `DecodeError::InvalidFormat` if the bytes are not a known format.
/// Returns `DecodeError::CorruptedFile` if decoding fails part-way.
pub fn decode_bytes(bytes: &[u8]) -> Result<RasterImage, DecodeError> {
    let orientation = extract_orientation(bytes);
    let img = decode_dynamic(bytes)?;
    let oriented = apply_orientation(img, orientation);
    Ok(RasterImage::from_rgb_image(oriented.into_rgb8()))
}

/// Decode an image from bytes without applying EXIF orientation.
pub fn decode_bytes_no_orientation(bytes: &[u8]) -> Result<RasterImage, DecodeError> {
    let img = decode_dynamic(bytes)?;
    Ok(RasterImage::from_rgb_image(img.into_rgb8()))
}

/// Read and decode an image file.
pub fn decode_file(path: &Path) -> Result<RasterImage, DecodeError> {
    let bytes = read_source(path)?;
    decode_bytes(&bytes)
}

/// Read the raw bytes of an image file.
///
/// Files whose extension names a format without a codec fail fast with
/// `DecodeError::UnsupportedFormat` instead of being read and sniffed.
pub fn read_source(path: &Path) -> Result<Vec<u8>, DecodeError> {
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        let ext = ext.to_ascii_lowercase();
        if UNDECODABLE_EXTENSIONS.contains(&ext.as_str()) {
            return Err(DecodeError::UnsupportedFormat(ext));
        }
    }
    Ok(std::fs::read(path)?)
}

fn decode_dynamic(bytes: &[u8]) -> Result<DynamicImage, DecodeError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| DecodeError::IoError(e.to_string()))?;

    if reader.format().is_none() {
        return Err(DecodeError::InvalidFormat);
    }

    reader.decode().map_err(|e| match e {
        ImageError::Unsupported(inner) => DecodeError::UnsupportedFormat(inner.to_string()),
        other => DecodeError::CorruptedFile(other.to_string()),
    })
}

/// Extract EXIF orientation from image bytes.
///
/// Returns `Orientation::Normal` if no EXIF data is found or orientation
/// cannot be determined.
fn extract_orientation(bytes: &[u8]) -> Orientation {
    let mut cursor = Cursor::new(bytes);

    match Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => exif
            .get_field(Tag::Orientation, In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .map(Orientation::from)
            .unwrap_or_default(),
        Err(_) => Orientation::Normal,
    }
}

/// Apply EXIF orientation transformation to an image.
fn apply_orientation(img: DynamicImage, orientation: Orientation) -> DynamicImage {
    match orientation {
        Orientation::Normal => img,
        Orientation::FlipHorizontal => img.fliph(),
        Orientation::Rotate180 => img.rotate180(),
        Orientation::FlipVertical => img.flipv(),
        Orientation::Transpose => img.rotate90().fliph(),
        Orientation::Rotate90CW => img.rotate90(),
        Orientation::Transverse => img.rotate270().fliph(),
        Orientation::Rotate270CW => img.rotate270(),
    }
}
