//! Tempo estimation and beat tracking
//!
//! The onset envelope (rectified rise in frame loudness) is autocorrelated
//! over the plausible tempo range; a log-normal prior around 120 BPM
//! resolves octave ambiguity. Beats are then tracked forward from the best
//! phase, each one pulled to the strongest onset near its prediction.

use log::debug;

use crate::analysis::frames::{frame_rms, frame_to_secs};
use crate::error::{MixError, Result};

/// Frame length for the onset envelope
pub const ONSET_FRAME_LEN: usize = 1024;
/// Hop length for the onset envelope
pub const ONSET_HOP: usize = 512;

/// Slowest tempo considered
pub const MIN_BPM: f64 = 40.0;
/// Fastest tempo considered
pub const MAX_BPM: f64 = 220.0;
/// Center of the tempo prior
const PRIOR_BPM: f64 = 120.0;
/// Spread of the tempo prior in octaves
const PRIOR_OCTAVES: f64 = 1.0;

/// Shortest buffer the estimator will accept (seconds)
pub const MIN_ANALYSIS_SECS: f64 = 2.0;

/// Loudness range kept by the onset envelope (dB below the loudest frame)
const ONSET_FLOOR_DB: f32 = 80.0;

/// Half-width of the triangular smoothing kernel (frames)
const SMOOTHING_HALF_WIDTH: usize = 3;

/// Result of tempo estimation
#[derive(Debug, Clone, PartialEq)]
pub struct TempoEstimate {
    /// Estimated tempo, rounded to 0.1 BPM
    pub bpm: f64,
    /// Ascending beat times in seconds
    pub beats: Vec<f64>,
}

/// Compute the onset strength envelope of a mono signal
///
/// One value per centered frame (hop [`ONSET_HOP`]): the positive
/// frame-to-frame increase in RMS level, in dB.
pub fn onset_envelope(samples: &[f32]) -> Vec<f32> {
    let rms = frame_rms(samples, ONSET_FRAME_LEN, ONSET_HOP);
    let loudest = rms.iter().copied().fold(0.0_f32, f32::max);
    if loudest <= 0.0 {
        return vec![0.0; rms.len()];
    }

    let floor_db = 20.0 * loudest.log10() - ONSET_FLOOR_DB;
    let db: Vec<f32> = rms
        .iter()
        .map(|&r| if r > 0.0 { (20.0 * r.log10()).max(floor_db) } else { floor_db })
        .collect();

    let mut envelope = Vec::with_capacity(db.len());
    envelope.push(0.0);
    envelope.extend(db.windows(2).map(|w| (w[1] - w[0]).max(0.0)));
    envelope
}

/// Estimate tempo and beat positions of a mono signal
///
/// Always yields a single BPM value.
///
/// # Errors
/// `AnalysisFailure` if the signal is shorter than [`MIN_ANALYSIS_SECS`],
/// has no onsets, or shows no periodicity in the tempo range.
pub fn estimate_tempo(samples: &[f32], sample_rate: u32) -> Result<TempoEstimate> {
    if sample_rate == 0 || (samples.len() as f64) < MIN_ANALYSIS_SECS * sample_rate as f64 {
        return Err(MixError::AnalysisFailure {
            reason: format!(
                "need at least {:.0}s of audio for tempo estimation",
                MIN_ANALYSIS_SECS
            ),
        });
    }

    let envelope = onset_envelope(samples);
    if envelope.iter().all(|&v| v <= f32::EPSILON) {
        return Err(MixError::AnalysisFailure {
            reason: "no onsets detected (silent or constant signal)".to_string(),
        });
    }

    let smoothed = smooth(&envelope, SMOOTHING_HALF_WIDTH);
    let frame_rate = sample_rate as f64 / ONSET_HOP as f64;
    let period = best_period(&smoothed, frame_rate)?;

    let bpm = (600.0 * frame_rate / period).round() / 10.0;
    let beats = track_beats(&envelope, &smoothed, period)
        .into_iter()
        .map(|frame| frame_to_secs(frame, ONSET_HOP, sample_rate))
        .collect::<Vec<_>>();

    debug!(
        "Tempo {:.1} BPM (period {:.2} frames), {} beats",
        bpm,
        period,
        beats.len()
    );

    Ok(TempoEstimate { bpm, beats })
}

/// Triangular moving average
fn smooth(values: &[f32], half_width: usize) -> Vec<f32> {
    let n = values.len();
    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(half_width);
            let hi = (i + half_width).min(n - 1);
            let mut acc = 0.0;
            let mut weight_sum = 0.0;
            for (j, &v) in values.iter().enumerate().take(hi + 1).skip(lo) {
                let w = (half_width + 1 - i.abs_diff(j)) as f32;
                acc += v * w;
                weight_sum += w;
            }
            acc / weight_sum
        })
        .collect()
}

/// Tempo prior weight for a beat period in frames
fn tempo_prior(lag: f64, frame_rate: f64) -> f64 {
    let bpm = 60.0 * frame_rate / lag;
    let octaves = (bpm / PRIOR_BPM).log2() / PRIOR_OCTAVES;
    (-0.5 * octaves * octaves).exp()
}

/// Find the beat period (in fractional frames) of an onset envelope
fn best_period(envelope: &[f32], frame_rate: f64) -> Result<f64> {
    let n = envelope.len();
    let min_lag = ((60.0 * frame_rate / MAX_BPM).floor() as usize).max(1);
    let max_lag = ((60.0 * frame_rate / MIN_BPM).ceil() as usize).min(n.saturating_sub(2));
    if min_lag + 1 >= max_lag {
        return Err(MixError::AnalysisFailure {
            reason: "signal too short for the tempo range".to_string(),
        });
    }

    let mean = envelope.iter().map(|&v| v as f64).sum::<f64>() / n as f64;
    let centered: Vec<f64> = envelope.iter().map(|&v| v as f64 - mean).collect();

    // Unbiased autocorrelation for lags min_lag - 1 ..= max_lag + 1
    let acf = |lag: usize| -> f64 {
        if lag >= n {
            return 0.0;
        }
        let sum: f64 = centered[..n - lag]
            .iter()
            .zip(&centered[lag..])
            .map(|(a, b)| a * b)
            .sum();
        sum / (n - lag) as f64
    };
    let correlations: Vec<f64> = (0..=max_lag + 1).map(acf).collect();

    let (best_lag, best_score) = (min_lag..=max_lag)
        .map(|lag| (lag, correlations[lag] * tempo_prior(lag as f64, frame_rate)))
        .fold((0, 0.0), |best, cur| if cur.1 > best.1 { cur } else { best });

    if best_lag == 0 || best_score <= 0.0 {
        return Err(MixError::AnalysisFailure {
            reason: "no periodicity found in the tempo range".to_string(),
        });
    }

    // Parabolic refinement around the peak
    let (a, b, c) = (
        correlations[best_lag - 1],
        correlations[best_lag],
        correlations[best_lag + 1],
    );
    let denom = a - 2.0 * b + c;
    let delta = if denom.abs() > f64::EPSILON {
        (0.5 * (a - c) / denom).clamp(-0.5, 0.5)
    } else {
        0.0
    };

    Ok(best_lag as f64 + delta)
}

/// Track beats through the envelope given a period in frames
///
/// Returns strictly ascending frame indices.
fn track_beats(envelope: &[f32], smoothed: &[f32], period: f64) -> Vec<usize> {
    let n = envelope.len();
    if n == 0 || period < 1.0 {
        return Vec::new();
    }

    // Best phase of a regular grid over the smoothed envelope
    let phase = (0..period.ceil() as usize)
        .map(|offset| {
            let mut score = 0.0;
            let mut pos = offset as f64;
            while (pos.round() as usize) < n {
                score += smoothed[pos.round() as usize];
                pos += period;
            }
            (offset, score)
        })
        .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best })
        .0;

    let mean = envelope.iter().sum::<f32>() / n as f32;
    let radius = (period / 4.0).max(1.0);

    let strongest_near = |predicted: f64| -> Option<usize> {
        let lo = (predicted - radius).max(0.0).round() as usize;
        let hi = ((predicted + radius).round() as usize).min(n - 1);
        if lo > hi {
            return None;
        }
        (lo..=hi)
            .max_by(|&x, &y| envelope[x].total_cmp(&envelope[y]))
            .filter(|&i| envelope[i] > mean)
    };

    // The grid starts at the first predicted beat that lands on an onset
    let mut predicted = phase as f64;
    while predicted < n as f64 && strongest_near(predicted).is_none() {
        predicted += period;
    }

    let mut beats = Vec::new();
    while predicted < n as f64 {
        let candidate = strongest_near(predicted).unwrap_or(predicted.round() as usize);
        let beat = match beats.last() {
            Some(&last) if candidate <= last => predicted.round() as usize,
            _ => candidate,
        };
        if beat >= n || beats.last().is_some_and(|&last| beat <= last) {
            break;
        }
        beats.push(beat);
        predicted = beat as f64 + period;
    }

    beats
}
