//! Crossfade curves
//!
//! `t` runs from 0.0 (start of the overlap) to 1.0 (end). The outgoing gain
//! falls from 1 to 0 and the incoming gain is its complement.

use std::f32::consts::FRAC_PI_2;

use serde::{Deserialize, Serialize};

/// Shape of a crossfade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FadeCurve {
    /// Straight-line gains; out + in = 1
    Linear,
    /// Quarter-period cos/sin gains; out² + in² = 1
    #[default]
    EqualPower,
}

impl FadeCurve {
    /// Gain for the outgoing buffer at progress `t`
    #[inline]
    pub fn gain_out(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            FadeCurve::Linear => 1.0 - t,
            FadeCurve::EqualPower => (t * FRAC_PI_2).cos(),
        }
    }

    /// Gain for the incoming buffer at progress `t`
    #[inline]
    pub fn gain_in(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            FadeCurve::Linear => t,
            FadeCurve::EqualPower => (t * FRAC_PI_2).sin(),
        }
    }
}

/// Progress of sample `i` in an overlap of `len` samples
///
/// Spans 0.0 to 1.0 inclusive; a one-sample overlap sits at 0.0.
#[inline]
pub fn progress(i: usize, len: usize) -> f32 {
    if len <= 1 {
        0.0
    } else {
        i as f32 / (len - 1) as f32
    }
}
