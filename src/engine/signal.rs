//! Synthetic signals
//!
//! Tones and click tracks with known tempo, used to exercise the analyzer
//! and the stitcher without audio fixtures on disk.

use crate::engine::buffer::AudioBuffer;

/// Length of each click in a click track (seconds)
const CLICK_SECS: f32 = 0.02;

/// Frequency of the click carrier (Hz)
const CLICK_FREQ: f32 = 1000.0;

/// Generate a mono sine tone
pub fn generate_test_tone(
    frequency: f32,
    duration_secs: f32,
    sample_rate: u32,
    amplitude: f32,
) -> AudioBuffer {
    let num_samples = (duration_secs * sample_rate as f32).round() as usize;
    let angular_freq = 2.0 * std::f32::consts::PI * frequency / sample_rate as f32;

    let samples = (0..num_samples)
        .map(|i| amplitude * (angular_freq * i as f32).sin())
        .collect();

    AudioBuffer::from_mono(samples, sample_rate)
}

/// Generate a mono click track at `bpm`
///
/// Each beat is a short decaying 1 kHz burst; everything between beats is
/// silent. The first click starts at `first_beat_secs`.
pub fn generate_click_track(
    bpm: f64,
    duration_secs: f64,
    sample_rate: u32,
    first_beat_secs: f64,
) -> AudioBuffer {
    let num_samples = (duration_secs * sample_rate as f64).round() as usize;
    let mut samples = vec![0.0_f32; num_samples];

    let beat_interval = 60.0 / bpm;
    let click_len = (CLICK_SECS * sample_rate as f32) as usize;
    let angular_freq = 2.0 * std::f32::consts::PI * CLICK_FREQ / sample_rate as f32;

    let mut beat = first_beat_secs;
    while beat < duration_secs {
        let start = (beat * sample_rate as f64).round() as usize;
        for i in 0..click_len {
            let Some(sample) = samples.get_mut(start + i) else {
                break;
            };
            let decay = 1.0 - i as f32 / click_len as f32;
            *sample = 0.8 * decay * (angular_freq * i as f32).sin();
        }
        beat += beat_interval;
    }

    AudioBuffer::from_mono(samples, sample_rate)
}

/// Generate a mono buffer holding a constant value
pub fn generate_constant(value: f32, duration_secs: f64, sample_rate: u32) -> AudioBuffer {
    let num_samples = (duration_secs * sample_rate as f64).round() as usize;
    AudioBuffer::from_mono(vec![value; num_samples], sample_rate)
}
