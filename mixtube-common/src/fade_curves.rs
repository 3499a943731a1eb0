//! Fade curves for player transitions
//!
//! Players fade their volume (and, for visual backends, their opacity) in and
//! out along one of these curves while two videos overlap.

use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_2, PI};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Fade curve types
///
/// - Linear: constant rate of change
/// - Exponential: slow start, fast finish (natural fade-in)
/// - Logarithmic: fast start, slow finish (natural fade-out)
/// - SCurve: smooth acceleration and deceleration
/// - EqualPower: constant perceived loudness while two players overlap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FadeCurve {
    Linear,
    Exponential,
    Logarithmic,
    #[default]
    SCurve,
    EqualPower,
}

impl FadeCurve {
    /// Level multiplier while fading in, `position` normalized to 0.0..=1.0
    pub fn fade_in(&self, position: f32) -> f32 {
        let t = position.clamp(0.0, 1.0);
        match self {
            FadeCurve::Linear => t,
            FadeCurve::Exponential => t * t,
            FadeCurve::Logarithmic => t.sqrt(),
            FadeCurve::SCurve => 0.5 * (1.0 - (PI * t).cos()),
            FadeCurve::EqualPower => (t * FRAC_PI_2).sin(),
        }
    }

    /// Level multiplier while fading out, 1.0 at the start and 0.0 at the end
    pub fn fade_out(&self, position: f32) -> f32 {
        let t = position.clamp(0.0, 1.0);
        match self {
            FadeCurve::Linear => 1.0 - t,
            FadeCurve::Exponential | FadeCurve::Logarithmic => {
                let inv = 1.0 - t;
                inv * inv
            }
            FadeCurve::SCurve => 0.5 * (1.0 + (PI * t).cos()),
            FadeCurve::EqualPower => (t * FRAC_PI_2).cos(),
        }
    }

    /// Interpolate from `from` toward `to` at `position` along this curve.
    ///
    /// Used when a fade interrupts another one and has to start from the
    /// level the previous fade reached.
    pub fn interpolate(&self, from: f32, to: f32, position: f32) -> f32 {
        if to >= from {
            from + (to - from) * self.fade_in(position)
        } else {
            to + (from - to) * self.fade_out(position)
        }
    }
}

impl fmt::Display for FadeCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FadeCurve::Linear => "linear",
            FadeCurve::Exponential => "exponential",
            FadeCurve::Logarithmic => "logarithmic",
            FadeCurve::SCurve => "s_curve",
            FadeCurve::EqualPower => "equal_power",
        };
        f.write_str(name)
    }
}

impl FromStr for FadeCurve {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linear" => Ok(FadeCurve::Linear),
            "exponential" => Ok(FadeCurve::Exponential),
            "logarithmic" => Ok(FadeCurve::Logarithmic),
            "s_curve" | "scurve" | "cosine" => Ok(FadeCurve::SCurve),
            "equal_power" => Ok(FadeCurve::EqualPower),
            other => Err(Error::InvalidInput(format!("Unknown fade curve: {}", other))),
        }
    }
}
