//! Loudness Normalizer
//!
//! Rescales a buffer so its RMS (or its peak) hits a target level, giving
//! every track in the mix the same perceived volume.

use serde::{Deserialize, Serialize};

use crate::engine::buffer::{calculate_peak, calculate_rms, linear_to_db, AudioBuffer};

/// Default RMS target (linear, ~-18.4 dBFS)
pub const DEFAULT_RMS_TARGET: f32 = 0.12;

/// Default peak target (fraction of full scale)
pub const DEFAULT_PEAK_TARGET: f32 = 0.8;

/// Normalization mode and target level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Normalization {
    /// Scale so the RMS equals the target (linear)
    Rms { target: f32 },
    /// Scale so the largest absolute sample equals the target
    Peak { target: f32 },
}

impl Default for Normalization {
    fn default() -> Self {
        Normalization::Rms {
            target: DEFAULT_RMS_TARGET,
        }
    }
}

impl Normalization {
    /// Target level (linear)
    pub fn target(&self) -> f32 {
        match *self {
            Normalization::Rms { target } | Normalization::Peak { target } => target,
        }
    }

    /// Measure the level this mode normalizes
    pub fn measure(&self, buffer: &AudioBuffer) -> f32 {
        match self {
            Normalization::Rms { .. } => calculate_rms(buffer),
            Normalization::Peak { .. } => calculate_peak(buffer),
        }
    }

    /// Gain that would bring `buffer` to the target, or None for silence
    pub fn gain_for(&self, buffer: &AudioBuffer) -> Option<f32> {
        let level = self.measure(buffer);
        if level > 0.0 && level.is_finite() {
            Some(self.target() / level)
        } else {
            None
        }
    }

    /// Normalize `buffer` in place
    ///
    /// Silent (all-zero) buffers are passed through untouched. Returns the
    /// gain applied in dB, if any.
    pub fn normalize(&self, buffer: &mut AudioBuffer) -> Option<f32> {
        let gain = self.gain_for(buffer)?;
        buffer.scale(gain);
        Some(linear_to_db(gain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::signal::{generate_constant, generate_test_tone};
    use approx::assert_relative_eq;

    #[test]
    fn test_rms_normalization_hits_target() {
        let mut tone = generate_test_tone(440.0, 1.0, 44100, 0.9);
        Normalization::Rms { target: 0.12 }.normalize(&mut tone);
        assert_relative_eq!(calculate_rms(&tone), 0.12, epsilon = 1e-4);
    }

    #[test]
    fn test_peak_normalization_hits_target() {
        let mut tone = generate_test_tone(440.0, 1.0, 44100, 0.3);
        Normalization::Peak { target: 0.8 }.normalize(&mut tone);
        assert_relative_eq!(calculate_peak(&tone), 0.8, epsilon = 1e-5);
    }

    #[test]
    fn test_normalization_is_idempotent() {
        for mode in [Normalization::Rms { target: 0.12 }, Normalization::Peak { target: 0.8 }] {
            let mut once = generate_test_tone(330.0, 0.5, 44100, 0.05);
            mode.normalize(&mut once);
            let mut twice = once.clone();
            mode.normalize(&mut twice);

            assert_relative_eq!(mode.measure(&once), mode.measure(&twice), epsilon = 1e-6);
            for (a, b) in once.channel(0).iter().zip(twice.channel(0)) {
                assert_relative_eq!(*a, *b, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_silence_passes_through() {
        for mode in [Normalization::Rms { target: 0.12 }, Normalization::Peak { target: 0.8 }] {
            let mut silence = generate_constant(0.0, 0.5, 44100);
            assert_eq!(mode.normalize(&mut silence), None);
            assert!(silence.is_finite());
            assert!(silence.channel(0).iter().all(|&s| s == 0.0));
        }
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_value(Normalization::Peak { target: 0.8 }).unwrap();
        assert_eq!(json["mode"], "peak");
        assert!(json["target"].is_number());
        let back: Normalization = serde_json::from_value(json).unwrap();
        assert_eq!(back, Normalization::Peak { target: 0.8 });
    }
}
