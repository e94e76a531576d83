//! Tempo & Onset Analysis
//!
//! Estimates tempo, a beat grid and candidate start points for a track.
//! Analysis runs on a mono, down-sampled copy of the first
//! `window_secs` of the track; the detectors are independent and the
//! start-point selector decides which ones to use.

pub mod beat;
pub mod frames;
pub mod onset;
pub mod tempo;

use log::{debug, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::engine::buffer::{ChannelLayout, ANALYSIS_SAMPLE_RATE};
use crate::engine::io::{load_audio, AudioSource, LoadOptions};
use crate::error::Result;

pub use beat::{next_beat, snap_to_beat, BeatSnap};
pub use onset::{detect_drop, non_silent_intervals, voice_start, EnergyProfile};
pub use tempo::{estimate_tempo, onset_envelope, TempoEstimate};

/// Analysis parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Sample rate the track is decoded at for analysis
    pub sample_rate: u32,
    /// Seconds from the start of the track that are analyzed
    pub window_secs: f64,
    /// Silence floor below the loudest frame for voice detection (dB)
    pub top_db: f32,
    /// Drop threshold as a multiple of mean RMS
    pub drop_factor: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_rate: ANALYSIS_SAMPLE_RATE,
            window_secs: 90.0,
            top_db: onset::DEFAULT_TOP_DB,
            drop_factor: onset::DEFAULT_DROP_FACTOR,
        }
    }
}

/// Everything the analyzer found out about one track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackAnalysis {
    /// Estimated tempo; None when no periodicity was found
    pub bpm: Option<f64>,
    /// Ascending beat times (seconds); empty without a tempo
    pub beats: Vec<f64>,
    /// Start of the first non-silent interval (seconds)
    pub voice_start_secs: f64,
    /// First energy drop (seconds)
    pub drop_start_secs: f64,
    /// Length of audio that was analyzed (seconds)
    pub analyzed_secs: f64,
    /// Why tempo estimation failed, if it did
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tempo_error: Option<String>,
}

/// Analyze a mono signal
///
/// Voice and drop detection do not depend on the tempo estimate: a signal
/// without a usable pulse still reports where it starts.
pub fn analyze_samples(samples: &[f32], sample_rate: u32, config: &AnalysisConfig) -> TrackAnalysis {
    let (bpm, beats, tempo_error) = match estimate_tempo(samples, sample_rate) {
        Ok(tempo) => (Some(tempo.bpm), tempo.beats, None),
        Err(e) => {
            debug!("No tempo: {}", e);
            (None, Vec::new(), Some(e.to_string()))
        }
    };

    let analysis = TrackAnalysis {
        bpm,
        beats,
        voice_start_secs: voice_start(samples, sample_rate, config.top_db),
        drop_start_secs: detect_drop(samples, sample_rate, config.drop_factor),
        analyzed_secs: samples.len() as f64 / sample_rate as f64,
        tempo_error,
    };

    debug!(
        "Analysis: {} BPM, voice at {:.2}s, drop at {:.2}s",
        analysis.bpm.map(|b| format!("{:.1}", b)).unwrap_or_else(|| "?".to_string()),
        analysis.voice_start_secs,
        analysis.drop_start_secs
    );
    analysis
}

/// Decode the analysis window of a source and analyze it
///
/// # Errors
/// Only decoding errors; a missing tempo is reported inside the analysis.
pub fn analyze_source(source: &AudioSource, config: &AnalysisConfig) -> Result<TrackAnalysis> {
    let options = LoadOptions::new(config.sample_rate, ChannelLayout::Mono)
        .with_window(0.0, Some(config.window_secs));
    let buffer = load_audio(source, &options)?;
    Ok(analyze_samples(buffer.channel(0), buffer.sample_rate, config))
}

/// Analyze many sources in parallel
///
/// Results come back in the same order as `sources`; each failure stays
/// with its own source.
pub fn analyze_sources(sources: &[&AudioSource], config: &AnalysisConfig) -> Vec<Result<TrackAnalysis>> {
    sources
        .par_iter()
        .map(|source| {
            analyze_source(source, config).map_err(|e| {
                warn!("Analysis of {} failed: {}", source.display_name(), e);
                e
            })
        })
        .collect()
}
