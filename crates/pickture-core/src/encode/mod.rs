//! Raster output for the enhancement engine.
//!
//! Processed rasters are encoded losslessly (PNG) before they are cached or
//! written to the selection folder.
//!
//! # Examples
//!
//! ```ignore
//! use pickture_core::encode::encode_png;
//!
//! let png_bytes = encode_png(&raster)?;
//! println!("Encoded {} bytes", png_bytes.len());
//! ```

mod png;

pub use png::{encode_png, EncodeError};
