//! Pickture Core - Image enhancement engine
//!
//! This crate provides the processing behind Pickture's photo culling view:
//! automatic and custom white balance, rotation with aspect-preserving
//! crop, a bounded cache of processed results, and background precompute
//! of the variants a user is likely to look at next.
//!
//! # Flow
//!
//! 1. [`scan::scan_folder`] lists the images of a folder.
//! 2. [`PrecomputeCoordinator::select`] starts computing the white balance
//!    variants of the selected image.
//! 3. [`PrecomputeCoordinator::fetch`] returns a variant's encoded bytes from
//!    the cache, the in-flight job, or a fresh computation.
//! 4. [`output::save_selection`] writes the chosen variant next to the source.

pub mod adjustments;
pub mod cache;
pub mod cancel;
pub mod config;
pub mod decode;
pub mod encode;
pub mod histogram;
pub mod hsv;
pub mod output;
pub mod params;
pub mod pipeline;
pub mod precompute;
pub mod scan;
pub mod transform;

pub use cache::{cache_key, CacheConfig, ProcessedImageCache};
pub use cancel::CancellationToken;
pub use config::{ConfigError, EngineConfig};
pub use decode::{DecodeError, RasterImage};
pub use histogram::ChannelHistogram;
pub use params::{CustomLevels, EnhanceSettings, ParameterError, RotateParams};
pub use pipeline::{brightness_histogram, process_bytes, process_file, ProcessError, TransformKind};
pub use precompute::{FsImageSource, ImageSource, JobSummary, PrecomputeCoordinator, PrecomputeJob};
