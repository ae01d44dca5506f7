//! Track routing onto the output channels and the pan laws.

use std::f32::consts::{FRAC_PI_2, SQRT_2};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where a track lands on the output device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputRouting {
    /// Output channel 0 only, no pan.
    Left,
    /// Output channel 1 only, no pan.
    Right,
    /// Output channels 0 and 1 through the equal-power pan law.
    Paired,
}

impl OutputRouting {
    /// Map the numeric selector used by the control API:
    /// `<= 0` left, `1` right, `>= 2` paired.
    pub fn from_selector(selector: i32) -> Self {
        match selector {
            s if s <= 0 => Self::Left,
            1 => Self::Right,
            _ => Self::Paired,
        }
    }
}

fn default_gain() -> f32 {
    1.0
}

/// One track of a preview session as requested by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSpec {
    pub path: PathBuf,
    #[serde(rename = "output")]
    pub routing: OutputRouting,
    #[serde(default = "default_gain")]
    pub gain: f32,
    #[serde(default)]
    pub pan: f32,
}

impl TrackSpec {
    /// Build a track with gain clamped to `[0, 1]` and pan to `[-1, 1]`.
    pub fn new(path: impl Into<PathBuf>, routing: OutputRouting, gain: f32, pan: f32) -> Self {
        Self {
            path: path.into(),
            routing,
            gain: clamp_gain(gain),
            pan: clamp_pan(pan),
        }
    }
}

/// Clamp to `[0, 1]`; non-finite input falls back to unity.
pub fn clamp_gain(gain: f32) -> f32 {
    if gain.is_finite() {
        gain.clamp(0.0, 1.0)
    } else {
        1.0
    }
}

/// Clamp to `[-1, 1]`; non-finite input falls back to centre.
pub fn clamp_pan(pan: f32) -> f32 {
    if pan.is_finite() {
        pan.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

fn pan_angle(pan: f32) -> f32 {
    (clamp_pan(pan) + 1.0) / 2.0 * FRAC_PI_2
}

/// Equal-power pan law: `(cos θ, sin θ)` with `θ = (pan + 1) / 2 · π/2`.
pub fn equal_power_gains(pan: f32) -> (f32, f32) {
    let angle = pan_angle(pan);
    (angle.cos(), angle.sin())
}

/// Bus balance: the same curve scaled by √2 and capped at unity, so the
/// centre position leaves both sides untouched.
pub fn balance_gains(pan: f32) -> (f32, f32) {
    let (left, right) = equal_power_gains(pan);
    ((left * SQRT_2).min(1.0), (right * SQRT_2).min(1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_mapping() {
        assert_eq!(OutputRouting::from_selector(-3), OutputRouting::Left);
        assert_eq!(OutputRouting::from_selector(0), OutputRouting::Left);
        assert_eq!(OutputRouting::from_selector(1), OutputRouting::Right);
        assert_eq!(OutputRouting::from_selector(2), OutputRouting::Paired);
        assert_eq!(OutputRouting::from_selector(7), OutputRouting::Paired);
    }

    #[test]
    fn equal_power_law_preserves_power_across_range() {
        for step in 0..=200 {
            let pan = -1.0 + step as f32 * 0.01;
            let (left, right) = equal_power_gains(pan);
            assert!((left * left + right * right - 1.0).abs() < 1e-5, "pan {}", pan);
        }
        let (left, right) = equal_power_gains(-1.0);
        assert!((left - 1.0).abs() < 1e-6 && right.abs() < 1e-6);
        let (left, right) = equal_power_gains(1.0);
        assert!(left.abs() < 1e-6 && (right - 1.0).abs() < 1e-6);
    }

    #[test]
    fn balance_is_unity_at_centre_and_silences_far_side() {
        let (left, right) = balance_gains(0.0);
        assert!((left - 1.0).abs() < 1e-5 && (right - 1.0).abs() < 1e-5);
        let (left, right) = balance_gains(1.0);
        assert!(left.abs() < 1e-6);
        assert_eq!(right, 1.0);
    }

    #[test]
    fn track_spec_clamps_parameters() {
        let spec = TrackSpec::new("a.wav", OutputRouting::Paired, 3.0, -9.0);
        assert_eq!(spec.gain, 1.0);
        assert_eq!(spec.pan, -1.0);
        assert_eq!(clamp_gain(f32::NAN), 1.0);
        assert_eq!(clamp_pan(f32::INFINITY), 0.0);
    }
}
