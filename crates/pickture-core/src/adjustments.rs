//! White balance and levels algorithms
//!
//! Three per-channel enhancement modes:
//!
//! 1. **RGB white balance** - stretch every color channel independently
//!    between its percentile cuts. Channels don't interact, so casts can
//!    shift.
//! 2. **Value levels** - auto-detect the input range of the HSV value
//!    channel, then apply gamma. Hue and saturation are left untouched.
//! 3. **Custom levels** - user-chosen clamp range and gamma on the value
//!    channel.
//!
//! Every mapping depends only on the input value, so each one is built
//! once as a 256-entry LUT and applied with a single pass over the plane.

use crate::cancel::CancellationToken;
use crate::decode::{ChannelBuffer, ChannelLayout, RasterImage};
use crate::histogram::{compute_channel_histogram, find_high_cut, find_low_cut};
use crate::hsv::{bgr_to_hsv, hsv_to_bgr};
use crate::params::{CustomLevels, ValueLevels};
use crate::pipeline::ProcessError;

/// Index of the value plane in an HSV raster.
const VALUE_CHANNEL: usize = 2;

/// Input range detected for a channel before remapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputRange {
    pub low: u8,
    pub high: u8,
}

// ============================================================================
// LUT Type
// ============================================================================

/// Pre-computed 256-entry lookup table for a per-value mapping.
#[derive(Debug, Clone)]
pub struct ChannelLut {
    /// LUT values: lut[input] = output
    pub lut: [u8; 256],
}

impl ChannelLut {
    /// Build a LUT by evaluating `map` for every input value.
    ///
    /// The mapping result is rounded to the nearest integer and clamped
    /// to 0-255.
    pub fn from_fn(map: impl Fn(f64) -> f64) -> Self {
        let mut lut = [0u8; 256];
        for (i, lut_value) in lut.iter_mut().enumerate() {
            *lut_value = map(i as f64).round().clamp(0.0, 255.0) as u8;
        }
        Self { lut }
    }

    /// Create an identity LUT (no change).
    pub fn identity() -> Self {
        let mut lut = [0u8; 256];
        for (i, lut_value) in lut.iter_mut().enumerate() {
            *lut_value = i as u8;
        }
        Self { lut }
    }

    /// Check if this LUT is an identity mapping.
    pub fn is_identity(&self) -> bool {
        self.lut.iter().enumerate().all(|(i, &v)| v == i as u8)
    }

    /// Remap every pixel of a plane in place.
    pub fn apply(&self, channel: &mut ChannelBuffer) {
        for value in channel.data.iter_mut() {
            *value = self.lut[*value as usize];
        }
    }
}

impl Default for ChannelLut {
    fn default() -> Self {
        Self::identity()
    }
}

// ============================================================================
// Percentile stretch
// ============================================================================

/// Stretch a channel so its percentile cuts map to 0 and 255.
///
/// `discard_percent` is in percent units. Every value `v` becomes
/// `clamp((v - low) * 255 / (high - low), 0, 255)`, rounded.
///
/// Returns the detected range, or `None` when `high <= low` and the
/// channel was left unchanged.
pub fn stretch_channel(channel: &mut ChannelBuffer, discard_percent: f64) -> Option<InputRange> {
    let hist = compute_channel_histogram(channel);
    let low = find_low_cut(&hist, discard_percent);
    let high = find_high_cut(&hist, discard_percent);

    if high <= low {
        return None;
    }

    let span = (high - low) as f64;
    let lut = ChannelLut::from_fn(|v| (v - low as f64) * 255.0 / span);
    lut.apply(channel);

    Some(InputRange { low, high })
}

/// Percentile white balance over all three color channels.
///
/// Each channel is stretched on its own; a flat channel stays as is. The
/// token is checked before every channel.
pub fn white_balance_rgb(
    image: &RasterImage,
    discard_percent: f64,
    token: &CancellationToken,
) -> Result<RasterImage, ProcessError> {
    debug_assert_eq!(image.layout, ChannelLayout::Bgr);
    let mut output = image.clone();
    for (index, channel) in output.channels.iter_mut().enumerate() {
        token.check()?;
        if stretch_channel(channel, discard_percent).is_none() {
            tracing::debug!(channel = index, "Flat channel, white balance skipped");
        }
    }
    Ok(output)
}

// ============================================================================
// Value-channel levels
// ============================================================================

/// Find the smallest non-zero value and the largest value of a channel.
///
/// Zero pixels are ignored for both bounds. Returns `None` if every
/// pixel is zero.
fn nonzero_range(channel: &ChannelBuffer) -> Option<InputRange> {
    let mut low = u8::MAX;
    let mut high = 0u8;
    for &v in channel.data.iter().filter(|&&v| v > 0) {
        low = low.min(v);
        high = high.max(v);
    }
    (high > 0).then_some(InputRange { low, high })
}

/// Apply auto levels to a single channel in place.
///
/// The input range runs from the lowest non-zero value to the highest
/// value. Each pixel is normalized to 0-1 over that range, clamped,
/// raised to `1 / gamma`, and rescaled to the output range. Zero pixels
/// stay zero whatever the output range.
///
/// Returns `None` and leaves the channel unchanged when the range is
/// empty (`low >= high`).
pub fn apply_value_levels(channel: &mut ChannelBuffer, params: &ValueLevels) -> Option<InputRange> {
    let range = nonzero_range(channel)?;
    if range.low >= range.high {
        return None;
    }

    let (low_in, high_in) = (range.low as f64, range.high as f64);
    let (low_out, high_out) = (params.low_output as f64, params.high_output as f64);
    let exponent = 1.0 / params.gamma;

    let lut = ChannelLut::from_fn(|v| {
        if v == 0.0 {
            return 0.0;
        }
        let normalized = ((v - low_in) / (high_in - low_in)).clamp(0.0, 1.0);
        let corrected = normalized.powf(exponent);
        (corrected * (high_out - low_out) + low_out).clamp(low_out, high_out)
    });
    lut.apply(channel);

    Some(range)
}

/// Levels on the HSV value channel, preserving hue and saturation.
///
/// The token is checked between the color conversions and the levels pass.
pub fn levels_on_value(
    image: &RasterImage,
    params: &ValueLevels,
    token: &CancellationToken,
) -> Result<RasterImage, ProcessError> {
    let mut hsv = bgr_to_hsv(image);
    token.check()?;
    if apply_value_levels(&mut hsv.channels[VALUE_CHANNEL], params).is_none() {
        tracing::debug!("Value channel has no dynamic range, levels skipped");
        return Ok(image.clone());
    }
    token.check()?;
    Ok(hsv_to_bgr(&hsv))
}

// ============================================================================
// Custom clamp + gamma
// ============================================================================

/// LUT for a user-chosen clamp range and gamma.
///
/// Values are clamped to `[low, high]`, normalized, raised to
/// `1 / gamma`, and scaled by 255.
pub fn custom_levels_lut(params: &CustomLevels) -> ChannelLut {
    let (low, high) = (params.low_clamp(), params.high_clamp());
    let exponent = 1.0 / params.gamma();

    ChannelLut::from_fn(|v| {
        let normalized = (v.clamp(low, high) - low) / (high - low);
        normalized.powf(exponent) * 255.0
    })
}

/// Apply custom levels to the value channel of an image.
pub fn custom_levels(
    image: &RasterImage,
    params: &CustomLevels,
    token: &CancellationToken,
) -> Result<RasterImage, ProcessError> {
    let lut = custom_levels_lut(params);
    if lut.is_identity() {
        return Ok(image.clone());
    }

    let mut hsv = bgr_to_hsv(image);
    token.check()?;
    lut.apply(&mut hsv.channels[VALUE_CHANNEL]);
    token.check()?;
    Ok(hsv_to_bgr(&hsv))
}


// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn channel_strategy() -> impl Strategy<Value = ChannelBuffer> {
        prop::collection::vec(any::<u8>(), 1..400)
            .prop_map(|values| ChannelBuffer::new(values.len() as u32, 1, values))
    }

    proptest! {
        /// Property: Flat channels are never modified by a stretch.
        #[test]
        fn prop_flat_channel_unchanged(value in any::<u8>(), len in 1usize..300, discard in 0.01f64..49.0) {
            let mut channel = ChannelBuffer::new(len as u32, 1, vec![value; len]);
            stretch_channel(&mut channel, discard);
            prop_assert!(channel.data.iter().all(|&v| v == value));
        }

        /// Property: Stretch preserves the ordering of values.
        #[test]
        fn prop_stretch_is_monotonic(channel in channel_strategy(), discard in 0.0f64..49.0) {
            let mut stretched = channel.clone();
            stretch_channel(&mut stretched, discard);

            let mut pairs: Vec<(u8, u8)> = channel.data.iter().copied().zip(stretched.data).collect();
            pairs.sort_unstable();
            prop_assert!(pairs.windows(2).all(|w| w[0].1 <= w[1].1));
        }

        /// Property: Value levels never move a zero pixel.
        #[test]
        fn prop_value_levels_keep_zero(
            channel in channel_strategy(),
            gamma in 0.2f64..5.0,
            low_out in 0u8..128,
            high_out in 128u8..=255,
        ) {
            prop_assume!(high_out > low_out);
            let mut leveled = channel.clone();
            let params = ValueLevels::new(gamma, low_out, high_out).unwrap();
            apply_value_levels(&mut leveled, &params);
            for (before, after) in channel.data.iter().zip(&leveled.data) {
                if *before == 0 {
                    prop_assert_eq!(*after, 0);
                }
            }
        }

        /// Property: Custom levels LUT is monotonic for any valid parameters.
        #[test]
        fn prop_custom_lut_monotonic(low in 0.0f64..254.0, span in 1.0f64..255.0, gamma in 0.1f64..10.0) {
            let high = (low + span).min(255.0);
            prop_assume!(high > low);
            let lut = custom_levels_lut(&CustomLevels::new(low, high, gamma).unwrap());
            prop_assert!(lut.lut.windows(2).all(|w| w[0] <= w[1]));
        }
    }
}
