//! Transform selection and the decode -> transform -> encode pipeline.
//!
//! A [`TransformKind`] names one displayable variant of a source image.
//! Processing a variant always produces encoded bytes: the raw source for
//! [`TransformKind::Original`], a lossless PNG for everything else.

use std::fmt;
use std::path::Path;

use thiserror::Error;

use crate::adjustments::{custom_levels, levels_on_value, white_balance_rgb};
use crate::cancel::CancellationToken;
use crate::decode::{decode_bytes, read_source, DecodeError, RasterImage};
use crate::encode::{encode_png, EncodeError};
use crate::histogram::{compute_channel_histogram, ChannelHistogram};
use crate::hsv::bgr_to_hsv;
use crate::params::{CustomLevels, EnhanceSettings, ParameterError, RotateParams};
use crate::transform::rotate_and_crop;

/// Failure producing one variant of one image.
///
/// Failures are local to the variant being computed; they never affect
/// other variants or cached results.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    InvalidParameters(#[from] ParameterError),

    /// The owning job was cancelled. Means "no result yet", not a failure.
    #[error("Operation cancelled")]
    Cancelled,

    /// The image source could not supply the raw bytes.
    #[error("Failed to load source image: {0}")]
    Source(String),
}

/// The closed set of transforms a source image can be displayed with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransformKind {
    /// The unmodified source bytes.
    Original,
    /// Auto levels with gamma on the HSV value channel.
    WhiteBalanceValue,
    /// Percentile stretch of each color channel.
    WhiteBalanceRgb,
    /// User clamp range and gamma on the value channel.
    Custom(CustomLevels),
    /// Rotation, optionally cropped back to the source aspect ratio.
    Rotate(RotateParams),
}

impl TransformKind {
    /// The two variants computed ahead of time when an image is selected.
    pub const PRECOMPUTED: [TransformKind; 2] =
        [TransformKind::WhiteBalanceRgb, TransformKind::WhiteBalanceValue];

    /// Stable identifier for cache keys.
    ///
    /// Includes every parameter that changes the output, so two kinds
    /// with different settings never share a key.
    pub fn cache_tag(&self, settings: &EnhanceSettings) -> String {
        match self {
            TransformKind::Original => "original".to_string(),
            TransformKind::WhiteBalanceValue => format!("wb_value:g{}", settings.value_gamma),
            TransformKind::WhiteBalanceRgb => format!("wb_rgb:d{}", settings.discard_percent),
            TransformKind::Custom(levels) => format!(
                "custom:{}-{}:g{}",
                levels.low_clamp(),
                levels.high_clamp(),
                levels.gamma()
            ),
            TransformKind::Rotate(params) => format!(
                "rotate:{}:{}",
                params.angle_degrees(),
                if params.preserve_aspect_ratio() { "crop" } else { "full" }
            ),
        }
    }

    /// File name suffix for a saved selection.
    pub fn file_suffix(&self) -> &'static str {
        match self {
            TransformKind::Original => "",
            TransformKind::WhiteBalanceValue => "_wb_value",
            TransformKind::WhiteBalanceRgb => "_wb_rgb",
            TransformKind::Custom(_) => "_wb_custom",
            TransformKind::Rotate(_) => "_rotated",
        }
    }

    /// Whether processing returns the source bytes untouched.
    pub fn is_original(&self) -> bool {
        matches!(self, TransformKind::Original)
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformKind::Original => write!(f, "original"),
            TransformKind::WhiteBalanceValue => write!(f, "white balance (value)"),
            TransformKind::WhiteBalanceRgb => write!(f, "white balance (rgb)"),
            TransformKind::Custom(_) => write!(f, "custom levels"),
            TransformKind::Rotate(params) => write!(f, "rotate {}°", params.angle_degrees()),
        }
    }
}

/// Apply a transform to a decoded raster.
///
/// `Original` returns a copy. The channel transforms check the token
/// between their passes over the image.
pub fn apply_transform(
    image: &RasterImage,
    kind: &TransformKind,
    settings: &EnhanceSettings,
    token: &CancellationToken,
) -> Result<RasterImage, ProcessError> {
    match kind {
        TransformKind::Original => Ok(image.clone()),
        TransformKind::WhiteBalanceValue => {
            levels_on_value(image, &settings.value_levels(), token)
        }
        TransformKind::WhiteBalanceRgb => {
            white_balance_rgb(image, settings.discard_percent, token)
        }
        TransformKind::Custom(levels) => custom_levels(image, levels, token),
        TransformKind::Rotate(params) => Ok(rotate_and_crop(image, params)),
    }
}

/// Produce the encoded bytes of one variant from raw source bytes.
///
/// The token is checked before decoding, after decoding, inside the
/// transform and after it. A cancelled run returns
/// [`ProcessError::Cancelled`] and produces nothing.
pub fn process_bytes(
    raw: &[u8],
    kind: &TransformKind,
    settings: &EnhanceSettings,
    token: &CancellationToken,
) -> Result<Vec<u8>, ProcessError> {
    token.check()?;
    if kind.is_original() {
        return Ok(raw.to_vec());
    }

    let image = decode_bytes(raw)?;
    token.check()?;

    let output = apply_transform(&image, kind, settings, token)?;
    token.check()?;

    Ok(encode_png(&output)?)
}

/// Read a file and produce the encoded bytes of one variant.
pub fn process_file(
    path: &Path,
    kind: &TransformKind,
    settings: &EnhanceSettings,
    token: &CancellationToken,
) -> Result<Vec<u8>, ProcessError> {
    let raw = read_source(path)?;
    process_bytes(&raw, kind, settings, token)
}

/// Histogram of the HSV value channel of an unmodified image.
///
/// Computed once when an image is opened in the custom levels mode, and
/// drawn under the clamp markers.
pub fn brightness_histogram(raw: &[u8]) -> Result<ChannelHistogram, ProcessError> {
    let image = decode_bytes(raw)?;
    let hsv = bgr_to_hsv(&image);
    Ok(compute_channel_histogram(&hsv.channels[2]))
}
