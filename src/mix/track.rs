//! Tracks and drum loops
//!
//! A [`Track`] is a registered piece of music plus whatever the analyzer
//! found out about it and whatever the user pinned by hand. Drum loops live
//! in a [`DrumLibrary`] and are referenced from tracks by name.

use std::fmt;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::{analyze_sources, AnalysisConfig, TrackAnalysis};
use crate::engine::io::AudioSource;
use crate::error::{MixError, Result};

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier of a registered track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackId(Uuid);

impl TrackId {
    /// Generate a fresh identifier
    pub fn new() -> Self {
        TrackId(Uuid::new_v4())
    }
}

impl Default for TrackId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a drum loop: its registered name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DrumId(String);

impl DrumId {
    pub fn new(name: impl Into<String>) -> Self {
        DrumId(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DrumId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DrumId {
    fn from(name: &str) -> Self {
        DrumId::new(name)
    }
}

// ============================================================================
// Track
// ============================================================================

/// Values pinned by the user; each one beats the analyzer's choice
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackOverride {
    /// Start offset (seconds)
    pub start: Option<f64>,
    /// Segment length (seconds)
    pub duration: Option<f64>,
    /// Drum loop layered over this track's outgoing seam
    pub drum: Option<DrumId>,
}

impl TrackOverride {
    /// True when no field is set
    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.duration.is_none() && self.drum.is_none()
    }
}

/// A registered track
#[derive(Debug, Clone)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    pub source: AudioSource,
    /// Populated by analysis; None until analyzed or when analysis failed
    pub analysis: Option<TrackAnalysis>,
    /// Why the last analysis failed, if it did
    pub analysis_error: Option<String>,
    pub overrides: TrackOverride,
}

impl Track {
    /// Create an unanalyzed track
    pub fn new(name: impl Into<String>, source: AudioSource) -> Self {
        Self {
            id: TrackId::new(),
            name: name.into(),
            source,
            analysis: None,
            analysis_error: None,
            overrides: TrackOverride::default(),
        }
    }

    /// Estimated tempo, if analysis found one
    pub fn bpm(&self) -> Option<f64> {
        self.analysis.as_ref().and_then(|a| a.bpm)
    }
}

/// Analyze every track in parallel and store the results on the tracks
///
/// Returns the number of tracks whose tempo was found. A track that cannot
/// be decoded keeps `analysis = None`; a track without a tempo keeps its
/// voice and drop detections. Both record the error message.
pub fn analyze_tracks(tracks: &mut [Track], config: &AnalysisConfig) -> usize {
    let results = {
        let sources: Vec<&AudioSource> = tracks.iter().map(|t| &t.source).collect();
        analyze_sources(&sources, config)
    };

    let mut with_tempo = 0;
    for (track, result) in tracks.iter_mut().zip(results) {
        match result {
            Ok(analysis) => {
                match analysis.bpm {
                    Some(bpm) => {
                        info!("Analyzed '{}': {:.1} BPM", track.name, bpm);
                        with_tempo += 1;
                    }
                    None => warn!(
                        "No tempo for '{}', voice starts at {:.2}s",
                        track.name, analysis.voice_start_secs
                    ),
                }
                track.analysis_error = analysis.tempo_error.clone();
                track.analysis = Some(analysis);
            }
            Err(e) => {
                track.analysis = None;
                track.analysis_error = Some(e.to_string());
            }
        }
    }
    with_tempo
}

// ============================================================================
// Drum Loops
// ============================================================================

/// A registered percussion loop
#[derive(Debug, Clone)]
pub struct DrumLoop {
    pub id: DrumId,
    pub source: AudioSource,
    /// Estimated tempo, if analyzed
    pub bpm: Option<f64>,
}

/// Drum loops keyed by name, in registration order
#[derive(Debug, Clone, Default)]
pub struct DrumLibrary {
    loops: Vec<DrumLoop>,
}

impl DrumLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a loop
    ///
    /// A name that is already registered keeps its original source.
    pub fn insert(&mut self, name: impl Into<String>, source: AudioSource) -> DrumId {
        let id = DrumId::new(name);
        if !self.contains(&id) {
            self.loops.push(DrumLoop {
                id: id.clone(),
                source,
                bpm: None,
            });
        }
        id
    }

    pub fn get(&self, id: &DrumId) -> Option<&DrumLoop> {
        self.loops.iter().find(|l| &l.id == id)
    }

    pub fn contains(&self, id: &DrumId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DrumLoop> {
        self.loops.iter()
    }

    pub fn len(&self) -> usize {
        self.loops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }

    pub fn clear(&mut self) {
        self.loops.clear();
    }

    /// Set a loop's tempo by hand
    pub fn set_bpm(&mut self, id: &DrumId, bpm: Option<f64>) -> Result<()> {
        let drum = self
            .loops
            .iter_mut()
            .find(|l| &l.id == id)
            .ok_or_else(|| MixError::UnknownDrum { name: id.to_string() })?;
        drum.bpm = bpm;
        Ok(())
    }

    /// Estimate the tempo of every loop; returns how many succeeded
    pub fn analyze(&mut self, config: &AnalysisConfig) -> usize {
        let results = {
            let sources: Vec<&AudioSource> = self.loops.iter().map(|l| &l.source).collect();
            analyze_sources(&sources, config)
        };

        let mut analyzed = 0;
        for (drum, result) in self.loops.iter_mut().zip(results) {
            drum.bpm = result.ok().and_then(|a| a.bpm);
            if drum.bpm.is_some() {
                analyzed += 1;
            }
        }
        analyzed
    }

    /// Loop whose tempo is closest to `bpm`
    ///
    /// Loops without a tempo are ignored; ties go to the earlier loop.
    pub fn nearest_by_bpm(&self, bpm: f64) -> Option<&DrumLoop> {
        self.loops
            .iter()
            .filter_map(|l| l.bpm.map(|b| (l, (b - bpm).abs())))
            .fold(None, |best: Option<(&DrumLoop, f64)>, (l, d)| match best {
                Some((_, bd)) if bd <= d => best,
                _ => Some((l, d)),
            })
            .map(|(l, _)| l)
    }
}
