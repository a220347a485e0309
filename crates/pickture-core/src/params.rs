//! Immutable parameter objects for the enhancement transforms.
//!
//! User-supplied parameters are validated when they are constructed, so a
//! transform can never be invoked with an inverted clamp range or a
//! non-positive gamma.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default percentile discard for RGB white balance, in percent units.
///
/// `0.05` discards 0.05% of pixels at each end, not 5%.
pub const DEFAULT_DISCARD_PERCENT: f64 = 0.05;

/// Default gamma for value-channel levels.
pub const DEFAULT_VALUE_GAMMA: f64 = 1.15;

/// Rejected transform parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParameterError {
    /// The high clamp must be strictly above the low clamp.
    #[error("Invalid clamp range: high ({high}) must be greater than low ({low})")]
    InvalidClampRange { low: f64, high: f64 },

    /// Clamp markers live on the 0-255 value axis.
    #[error("Clamp value {0} is outside 0-255")]
    ClampOutOfRange(f64),

    /// Gamma must be finite and positive.
    #[error("Invalid gamma: {0}")]
    InvalidGamma(f64),

    /// Rotation angle must be finite.
    #[error("Invalid rotation angle: {0}")]
    InvalidAngle(f64),

    /// Discard must satisfy 0 <= discard < 50 (percent).
    #[error("Invalid discard percentage: {0} (expected 0 <= discard < 50)")]
    InvalidDiscard(f64),

    /// Output range must be increasing.
    #[error("Invalid output range: {low}-{high}")]
    InvalidOutputRange { low: u8, high: u8 },
}

fn check_gamma(gamma: f64) -> Result<(), ParameterError> {
    if gamma.is_finite() && gamma > 0.0 {
        Ok(())
    } else {
        Err(ParameterError::InvalidGamma(gamma))
    }
}

/// Engine-wide presets for the two automatic white balance modes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhanceSettings {
    /// Percentile discard for RGB white balance (percent units).
    pub discard_percent: f64,
    /// Gamma applied by value-channel levels.
    pub value_gamma: f64,
}

impl Default for EnhanceSettings {
    fn default() -> Self {
        Self {
            discard_percent: DEFAULT_DISCARD_PERCENT,
            value_gamma: DEFAULT_VALUE_GAMMA,
        }
    }
}

impl EnhanceSettings {
    /// Check that both presets are usable.
    pub fn validate(&self) -> Result<(), ParameterError> {
        let d = self.discard_percent;
        if !(d.is_finite() && (0.0..50.0).contains(&d)) {
            return Err(ParameterError::InvalidDiscard(d));
        }
        check_gamma(self.value_gamma)
    }

    /// Value-channel levels preset derived from these settings.
    pub fn value_levels(&self) -> ValueLevels {
        ValueLevels {
            gamma: self.value_gamma,
            ..ValueLevels::default()
        }
    }
}

/// Levels applied to the V channel with automatic input range detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueLevels {
    /// Gamma correction (output = input^(1/gamma)).
    pub gamma: f64,
    /// Output black point.
    pub low_output: u8,
    /// Output white point.
    pub high_output: u8,
}

impl Default for ValueLevels {
    fn default() -> Self {
        Self {
            gamma: DEFAULT_VALUE_GAMMA,
            low_output: 0,
            high_output: 255,
        }
    }
}

impl ValueLevels {
    /// Create a levels preset, rejecting a bad gamma or output range.
    pub fn new(gamma: f64, low_output: u8, high_output: u8) -> Result<Self, ParameterError> {
        check_gamma(gamma)?;
        if low_output >= high_output {
            return Err(ParameterError::InvalidOutputRange {
                low: low_output,
                high: high_output,
            });
        }
        Ok(Self {
            gamma,
            low_output,
            high_output,
        })
    }
}

/// User-tuned clamp range and gamma for the custom white balance mode.
///
/// Fields are private: the only way to obtain one is through
/// [`CustomLevels::new`], which enforces `0 <= low < high <= 255` and a
/// positive gamma.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CustomLevels {
    low_clamp: f64,
    high_clamp: f64,
    gamma: f64,
}

impl CustomLevels {
    /// Validate and build a custom levels parameter set.
    pub fn new(low_clamp: f64, high_clamp: f64, gamma: f64) -> Result<Self, ParameterError> {
        for value in [low_clamp, high_clamp] {
            if !(value.is_finite() && (0.0..=255.0).contains(&value)) {
                return Err(ParameterError::ClampOutOfRange(value));
            }
        }
        if high_clamp <= low_clamp {
            return Err(ParameterError::InvalidClampRange {
                low: low_clamp,
                high: high_clamp,
            });
        }
        check_gamma(gamma)?;
        Ok(Self {
            low_clamp,
            high_clamp,
            gamma,
        })
    }

    /// The identity mapping: full range, gamma 1.
    pub fn identity() -> Self {
        Self {
            low_clamp: 0.0,
            high_clamp: 255.0,
            gamma: 1.0,
        }
    }

    pub fn low_clamp(&self) -> f64 {
        self.low_clamp
    }

    pub fn high_clamp(&self) -> f64 {
        self.high_clamp
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }
}

/// Rotation request for rotate-and-crop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotateParams {
    angle_degrees: f64,
    preserve_aspect_ratio: bool,
}

impl RotateParams {
    /// Positive angles rotate clockwise on screen.
    pub fn new(angle_degrees: f64, preserve_aspect_ratio: bool) -> Result<Self, ParameterError> {
        if !angle_degrees.is_finite() {
            return Err(ParameterError::InvalidAngle(angle_degrees));
        }
        Ok(Self {
            angle_degrees,
            preserve_aspect_ratio,
        })
    }

    /// A fine-tune rotation cropped back to the source aspect ratio.
    pub fn straighten(angle_degrees: f64) -> Result<Self, ParameterError> {
        Self::new(angle_degrees, true)
    }

    /// An exact quarter turn count (1 = 90 degrees clockwise), uncropped.
    pub fn quarter_turns(turns: i32) -> Self {
        Self {
            angle_degrees: 90.0 * turns.rem_euclid(4) as f64,
            preserve_aspect_ratio: false,
        }
    }

    pub fn angle_degrees(&self) -> f64 {
        self.angle_degrees
    }

    pub fn preserve_aspect_ratio(&self) -> bool {
        self.preserve_aspect_ratio
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default() {
        let settings = EnhanceSettings::default();
        assert_eq!(settings.discard_percent, 0.05);
        assert_eq!(settings.value_gamma, 1.15);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_reject_large_discard() {
        let settings = EnhanceSettings {
            discard_percent: 50.0,
            ..Default::default()
        };
        assert_eq!(settings.validate(), Err(ParameterError::InvalidDiscard(50.0)));
    }

    #[test]
    fn test_settings_value_levels() {
        let settings = EnhanceSettings {
            value_gamma: 2.0,
            ..Default::default()
        };
        let levels = settings.value_levels();
        assert_eq!(levels.gamma, 2.0);
        assert_eq!((levels.low_output, levels.high_output), (0, 255));
    }

    #[test]
    fn test_value_levels_rejects_inverted_output() {
        assert!(matches!(
            ValueLevels::new(1.0, 200, 100),
            Err(ParameterError::InvalidOutputRange { .. })
        ));
    }

    #[test]
    fn test_custom_levels_valid() {
        let levels = CustomLevels::new(10.0, 240.0, 1.2).unwrap();
        assert_eq!(levels.low_clamp(), 10.0);
        assert_eq!(levels.high_clamp(), 240.0);
        assert_eq!(levels.gamma(), 1.2);
    }

    #[test]
    fn test_custom_levels_rejects_inverted_range() {
        assert_eq!(
            CustomLevels::new(200.0, 100.0, 1.0),
            Err(ParameterError::InvalidClampRange {
                low: 200.0,
                high: 100.0
            })
        );
        assert!(CustomLevels::new(100.0, 100.0, 1.0).is_err());
    }

    #[test]
    fn test_custom_levels_rejects_out_of_range() {
        assert_eq!(
            CustomLevels::new(-1.0, 100.0, 1.0),
            Err(ParameterError::ClampOutOfRange(-1.0))
        );
        assert!(CustomLevels::new(0.0, 300.0, 1.0).is_err());
        assert!(CustomLevels::new(f64::NAN, 100.0, 1.0).is_err());
    }

    #[test]
    fn test_custom_levels_rejects_bad_gamma() {
        assert!(CustomLevels::new(0.0, 255.0, 0.0).is_err());
        assert!(CustomLevels::new(0.0, 255.0, -1.0).is_err());
        assert!(CustomLevels::new(0.0, 255.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_rotate_params() {
        assert!(RotateParams::new(f64::NAN, true).is_err());

        let straighten = RotateParams::straighten(3.5).unwrap();
        assert!(straighten.preserve_aspect_ratio());

        let turn = RotateParams::quarter_turns(-1);
        assert_eq!(turn.angle_degrees(), 270.0);
        assert!(!turn.preserve_aspect_ratio());
    }
}
