//! Start-point detectors: intro silence and energy drop
//!
//! Both detectors fail open: when nothing qualifies they return 0.0.

use crate::analysis::frames::{frame_rms, frame_to_secs};

/// Frame length for energy-based detectors
pub const ENERGY_FRAME_LEN: usize = 2048;
/// Hop length for energy-based detectors
pub const ENERGY_HOP: usize = 512;

/// Default silence floor below the loudest frame (dB)
pub const DEFAULT_TOP_DB: f32 = 25.0;
/// Default drop threshold as a multiple of mean RMS
pub const DEFAULT_DROP_FACTOR: f32 = 1.2;

/// Short-time RMS energy over time
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyProfile {
    /// Seconds between consecutive values
    pub hop_secs: f64,
    /// RMS per centered frame
    pub rms: Vec<f32>,
}

impl EnergyProfile {
    /// Compute the profile of a mono signal
    pub fn compute(samples: &[f32], sample_rate: u32) -> Self {
        Self {
            hop_secs: ENERGY_HOP as f64 / sample_rate as f64,
            rms: frame_rms(samples, ENERGY_FRAME_LEN, ENERGY_HOP),
        }
    }

    /// Mean RMS over the whole profile
    pub fn mean(&self) -> f32 {
        if self.rms.is_empty() {
            return 0.0;
        }
        self.rms.iter().sum::<f32>() / self.rms.len() as f32
    }
}

/// Split a mono signal into non-silent intervals
///
/// A frame is non-silent when its RMS is within `top_db` of the loudest
/// frame. Returns half-open sample ranges `(start, end)`, clipped to the
/// signal length.
pub fn non_silent_intervals(samples: &[f32], top_db: f32) -> Vec<(usize, usize)> {
    let rms = frame_rms(samples, ENERGY_FRAME_LEN, ENERGY_HOP);
    let loudest = rms.iter().copied().fold(0.0_f32, f32::max);
    if loudest <= 0.0 {
        return Vec::new();
    }

    let threshold = loudest * 10.0_f32.powf(-top_db / 20.0);
    let to_sample = |frame: usize| (frame * ENERGY_HOP).min(samples.len());

    let mut intervals = Vec::new();
    let mut run_start: Option<usize> = None;
    for (i, &r) in rms.iter().enumerate() {
        match (r > threshold, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(start)) => {
                intervals.push((to_sample(start), to_sample(i)));
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = run_start {
        intervals.push((to_sample(start), samples.len()));
    }

    intervals.retain(|(start, end)| end > start);
    intervals
}

/// Seconds until the first non-silent interval (the vocal/lyric start)
pub fn voice_start(samples: &[f32], sample_rate: u32, top_db: f32) -> f64 {
    non_silent_intervals(samples, top_db)
        .first()
        .map(|&(start, _)| start as f64 / sample_rate as f64)
        .unwrap_or(0.0)
}

/// Seconds until the first frame whose RMS exceeds `mean × factor`
pub fn detect_drop(samples: &[f32], sample_rate: u32, factor: f32) -> f64 {
    let profile = EnergyProfile::compute(samples, sample_rate);
    let threshold = profile.mean() * factor;
    if threshold <= 0.0 {
        return 0.0;
    }

    profile
        .rms
        .iter()
        .position(|&r| r > threshold)
        .map(|frame| frame_to_secs(frame, ENERGY_HOP, sample_rate))
        .unwrap_or(0.0)
}
