//! Raster input for the enhancement engine.
//!
//! This module provides functionality for:
//! - Decoding any supported image file into planar BGR channels
//! - Honoring EXIF orientation the way photo viewers do
//!
//! # Architecture
//!
//! Every transform works on a [`RasterImage`]: one [`ChannelBuffer`] per
//! color plane. A raster is owned by the transform invocation that decoded
//! it and is dropped after encoding.
//!
//! # Examples
//!
//! ```ignore
//! use pickture_core::decode::decode_file;
//!
//! let image = decode_file(Path::new("photo.jpg"))?;
//! println!("Decoded {}x{} image", image.width, image.height);
//! ```

mod reader;
mod types;

pub use reader::{decode_bytes, decode_bytes_no_orientation, decode_file, read_source};
pub use types::{ChannelBuffer, ChannelLayout, DecodeError, Orientation, RasterImage};
