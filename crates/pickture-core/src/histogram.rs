//! Single-channel histogram computation and percentile cut points.
//!
//! The white balance transforms use these cuts to decide which input range
//! to stretch, and the custom levels mode renders the value-channel
//! histogram under its clamp markers.

use crate::decode::ChannelBuffer;

/// Number of bins in an 8-bit histogram.
pub const BIN_COUNT: usize = 256;

/// 256-bin count histogram of one channel.
///
/// The bin counts always sum to the channel's pixel count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelHistogram {
    /// Pixel count per value.
    pub bins: [u32; BIN_COUNT],
}

impl Default for ChannelHistogram {
    fn default() -> Self {
        Self {
            bins: [0; BIN_COUNT],
        }
    }
}

impl ChannelHistogram {
    /// Create a new empty histogram
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of counted pixels.
    pub fn total(&self) -> u64 {
        self.bins.iter().map(|&c| c as u64).sum()
    }

    /// Largest bin count, for normalizing a histogram display.
    pub fn max_value(&self) -> u32 {
        self.bins.iter().copied().max().unwrap_or(0)
    }
}

/// Compute the histogram of a single channel.
///
/// # Performance
/// Single pass over the contiguous plane, O(width x height).
pub fn compute_channel_histogram(channel: &ChannelBuffer) -> ChannelHistogram {
    let mut hist = ChannelHistogram::new();
    for &value in &channel.data {
        hist.bins[value as usize] += 1;
    }
    hist
}

/// Pixel count that a cut must accumulate before it stops.
///
/// `discard_percent` is in percent units: `0.05` discards 0.05% of pixels.
#[inline]
fn cut_threshold(hist: &ChannelHistogram, discard_percent: f64) -> f64 {
    hist.total() as f64 * (discard_percent / 100.0)
}

/// Find the low percentile cut.
///
/// Scans bins upward, accumulating counts, and returns the first bin at
/// which the accumulated count reaches the discard threshold. A zero
/// discard yields 0. If the threshold is never reached the cut falls back
/// to bin 0.
pub fn find_low_cut(hist: &ChannelHistogram, discard_percent: f64) -> u8 {
    let threshold = cut_threshold(hist, discard_percent);
    let mut accumulated = 0u64;
    for (value, &count) in hist.bins.iter().enumerate() {
        accumulated += count as u64;
        if accumulated as f64 >= threshold {
            return value as u8;
        }
    }
    0
}

/// Find the high percentile cut.
///
/// Mirror of [`find_low_cut`] scanning downward from 255. Falls back to
/// bin 255.
pub fn find_high_cut(hist: &ChannelHistogram, discard_percent: f64) -> u8 {
    let threshold = cut_threshold(hist, discard_percent);
    let mut accumulated = 0u64;
    for (value, &count) in hist.bins.iter().enumerate().rev() {
        accumulated += count as u64;
        if accumulated as f64 >= threshold {
            return value as u8;
        }
    }
    255
}


// ============================================================================
// Property-Based Tests
// ============================================================================
