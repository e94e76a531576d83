//! Beat-grid snapping
//!
//! Snapping moves a raw start candidate onto a detected beat so the seam
//! lands on the rhythm. The result is always a member of the grid, or the
//! untouched candidate when the grid is empty.

use serde::{Deserialize, Serialize};

/// How a candidate time is moved onto the beat grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeatSnap {
    /// Beat with the smallest absolute distance
    #[default]
    Nearest,
    /// First beat at or after the candidate (nearest if none follows)
    Following,
}

impl BeatSnap {
    /// Snap `candidate` (seconds) onto `beats` (ascending seconds)
    pub fn apply(self, candidate: f64, beats: &[f64]) -> f64 {
        match self {
            BeatSnap::Nearest => snap_to_beat(candidate, beats),
            BeatSnap::Following => next_beat(candidate, beats),
        }
    }
}

/// Replace `candidate` with the nearest beat time
///
/// Ties go to the earlier beat. Returns `candidate` unchanged when `beats`
/// is empty.
pub fn snap_to_beat(candidate: f64, beats: &[f64]) -> f64 {
    beats
        .iter()
        .copied()
        .fold(None, |best: Option<f64>, beat| match best {
            Some(b) if (b - candidate).abs() <= (beat - candidate).abs() => Some(b),
            _ => Some(beat),
        })
        .unwrap_or(candidate)
}

/// Replace `candidate` with the first beat at or after it
///
/// Falls back to [`snap_to_beat`] when every beat precedes the candidate.
pub fn next_beat(candidate: f64, beats: &[f64]) -> f64 {
    let idx = beats.partition_point(|&b| b < candidate);
    beats
        .get(idx)
        .copied()
        .unwrap_or_else(|| snap_to_beat(candidate, beats))
}
