//! Mix Orchestrator
//!
//! Runs select → load → normalize → drum overlay → stitch for every track
//! in order. A track that fails is reported and skipped; the run only
//! fails when no track produced any audio.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;

use crate::dsp::{Seam, Stitcher};
use crate::engine::buffer::AudioBuffer;
use crate::engine::io::{load_audio, LoadOptions};
use crate::error::{MixError, Result};
use crate::mix::config::{FailurePolicy, MixConfig, MixOrder};
use crate::mix::selector::{select, Selection, SelectionOrigin, FALLBACK_DURATION_SECS};
use crate::mix::track::{DrumId, DrumLibrary, Track};

// ============================================================================
// Report
// ============================================================================

/// A track that made it into the mix
#[derive(Debug, Clone, Serialize)]
pub struct IncludedTrack {
    pub name: String,
    pub bpm: Option<f64>,
    pub start_secs: f64,
    /// Requested segment length
    pub duration_secs: f64,
    /// Length actually decoded (shorter near the end of a track)
    pub rendered_secs: f64,
    pub origin: SelectionOrigin,
    /// Normalization gain in dB; None for silent segments
    pub gain_db: Option<f32>,
    /// Drum loop layered over this track's tail
    pub drum: Option<String>,
}

/// A track that was left out
#[derive(Debug, Clone, Serialize)]
pub struct TrackFailure {
    pub track: String,
    pub reason: String,
    pub code: String,
}

impl TrackFailure {
    fn new(track: &Track, error: &MixError) -> Self {
        Self {
            track: track.name.clone(),
            reason: error.to_string(),
            code: error.error_code().to_string(),
        }
    }
}

/// Summary of one generation run
#[derive(Debug, Clone, Serialize)]
pub struct MixReport {
    pub included: Vec<IncludedTrack>,
    pub failures: Vec<TrackFailure>,
    pub seams: Vec<Seam>,
    pub duration_secs: f64,
    pub generated_at: DateTime<Utc>,
}

/// Mixed audio plus its report
#[derive(Debug, Clone)]
pub struct MixOutput {
    pub buffer: AudioBuffer,
    pub report: MixReport,
}

// ============================================================================
// Ordering
// ============================================================================

/// Tracks in the order they enter the mix
///
/// `AscendingBpm` is a stable sort: analyzed tracks by tempo, then the
/// ones without a tempo in their given order.
pub fn order_tracks(tracks: &[Track], order: MixOrder) -> Vec<&Track> {
    let mut ordered: Vec<&Track> = tracks.iter().collect();
    if order == MixOrder::AscendingBpm {
        ordered.sort_by(|a, b| compare_bpm(a.bpm(), b.bpm()));
    }
    ordered
}

pub(crate) fn compare_bpm(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

// ============================================================================
// Generation
// ============================================================================

/// Decoded drum loops, loaded at most once per run
struct DrumCache<'a> {
    library: &'a DrumLibrary,
    options: LoadOptions,
    loaded: HashMap<DrumId, Option<AudioBuffer>>,
}

impl<'a> DrumCache<'a> {
    fn new(library: &'a DrumLibrary, config: &MixConfig) -> Self {
        Self {
            library,
            options: LoadOptions::new(config.sample_rate, config.layout).with_window(0.0, Some(config.drum.cap_secs)),
            loaded: HashMap::new(),
        }
    }

    /// Decoded loop, or None (with a warning) when it cannot be used
    fn get(&mut self, id: &DrumId) -> Option<&AudioBuffer> {
        let library = self.library;
        let options = &self.options;
        self.loaded
            .entry(id.clone())
            .or_insert_with(|| {
                let Some(drum) = library.get(id) else {
                    warn!("Drum loop '{}' is not registered, using a plain crossfade", id);
                    return None;
                };
                match load_audio(&drum.source, options) {
                    Ok(buffer) if !buffer.is_empty() => Some(buffer),
                    Ok(_) => {
                        warn!("Drum loop '{}' is empty, using a plain crossfade", id);
                        None
                    }
                    Err(e) => {
                        warn!("Drum loop '{}' could not be loaded ({}), using a plain crossfade", id, e);
                        None
                    }
                }
            })
            .as_ref()
    }
}

/// Decode and normalize one selection
fn render(track: &Track, selection: &Selection, config: &MixConfig) -> Result<(AudioBuffer, Option<f32>)> {
    let options = LoadOptions::new(config.sample_rate, config.layout)
        .with_window(selection.start_secs, Some(selection.duration_secs));
    let mut buffer = load_audio(&track.source, &options)?;

    if buffer.is_empty() {
        return Err(MixError::EmptySelection {
            track: track.name.clone(),
            start_secs: selection.start_secs,
            duration_secs: selection.duration_secs,
        });
    }

    let gain_db = config.normalization.normalize(&mut buffer);
    Ok((buffer, gain_db))
}

/// Render a track, retrying from the top when the policy allows
fn render_with_policy(
    track: &Track,
    selection: Selection,
    config: &MixConfig,
) -> Result<(AudioBuffer, Option<f32>, Selection)> {
    match render(track, &selection, config) {
        Ok((buffer, gain)) => Ok((buffer, gain, selection)),
        Err(MixError::EmptySelection { .. })
            if config.failure_policy == FailurePolicy::RetryFromStart && selection.start_secs > 0.0 =>
        {
            warn!(
                "'{}' has no audio at {:.2}s, retrying from the start",
                track.name, selection.start_secs
            );
            let retry = Selection {
                start_secs: 0.0,
                duration_secs: config.default_duration_secs.unwrap_or(FALLBACK_DURATION_SECS),
                origin: SelectionOrigin::Fallback,
            };
            let (buffer, gain) = render(track, &retry, config)?;
            Ok((buffer, gain, retry))
        }
        Err(e) => Err(e),
    }
}

/// Build the mix from `tracks`
///
/// # Arguments
/// * `tracks` - Registered tracks, reordered according to `config.order`
/// * `drums` - Loops that track overrides may reference
/// * `config` - Parameters for this run
///
/// # Returns
/// The clipped mix buffer and a report of included and failed tracks.
///
/// # Errors
/// * `InvalidConfig` - `config` fails validation
/// * `NoTracksProduced` - every track failed
pub fn generate_mix(tracks: &[Track], drums: &DrumLibrary, config: &MixConfig) -> Result<MixOutput> {
    config.validate()?;

    let ordered = order_tracks(tracks, config.order);
    let total = ordered.len();
    let mut stitcher = Stitcher::new(config.stitch_config(), config.sample_rate);
    let mut cache = DrumCache::new(drums, config);
    let mut included = Vec::new();
    let mut failures = Vec::new();

    for (i, track) in ordered.into_iter().enumerate() {
        let selection = select(track.analysis.as_ref(), &track.overrides, config);

        let (buffer, gain_db, selection) = match render_with_policy(track, selection, config) {
            Ok(rendered) => rendered,
            Err(e) => {
                warn!("Skipping '{}': {}", track.name, e);
                failures.push(TrackFailure::new(track, &e));
                continue;
            }
        };

        let drum = match &track.overrides.drum {
            Some(id) => cache.get(id).map(|buffer| (id, buffer)),
            None => None,
        };

        info!(
            "Track {}/{}: '{}' from {:.2}s for {:.2}s{}",
            i + 1,
            total,
            track.name,
            selection.start_secs,
            buffer.duration_secs(),
            drum.map(|(id, _)| format!(" with drum '{}'", id)).unwrap_or_default()
        );

        included.push(IncludedTrack {
            name: track.name.clone(),
            bpm: track.bpm(),
            start_secs: selection.start_secs,
            duration_secs: selection.duration_secs,
            rendered_secs: buffer.duration_secs(),
            origin: selection.origin,
            gain_db,
            drum: drum.map(|(id, _)| id.to_string()),
        });
        stitcher.push(buffer, drum.map(|(_, b)| b));
    }

    let Some((buffer, seams)) = stitcher.finish() else {
        return Err(MixError::NoTracksProduced { attempted: total });
    };

    info!(
        "Mix ready: {} tracks, {} skipped, {:.1}s",
        included.len(),
        failures.len(),
        buffer.duration_secs()
    );

    let report = MixReport {
        included,
        failures,
        seams,
        duration_secs: buffer.duration_secs(),
        generated_at: Utc::now(),
    };
    Ok(MixOutput { buffer, report })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::TrackAnalysis;
    use crate::dsp::{Normalization, SeamKind};
    use crate::engine::buffer::{calculate_rms, ChannelLayout};
    use crate::engine::export::write_pcm;
    use crate::engine::io::AudioSource;
    use crate::engine::signal::{generate_constant, generate_test_tone};
    use crate::mix::track::TrackOverride;
    use std::path::Path;
    use tempfile::tempdir;

    const RATE: u32 = 8000;

    fn config() -> MixConfig {
        MixConfig {
            sample_rate: RATE,
            crossfade_secs: 1.0,
            default_duration_secs: Some(4.0),
            order: MixOrder::AsGiven,
            ..MixConfig::default()
        }
    }

    fn tone_track(dir: &Path, name: &str, secs: f32, amplitude: f32) -> Track {
        let path = dir.join(format!("{}.wav", name));
        write_pcm(&generate_test_tone(220.0, secs, RATE, amplitude), &path, 16).unwrap();
        Track::new(name, AudioSource::file(path))
    }

    fn with_bpm(mut track: Track, bpm: f64) -> Track {
        track.analysis = Some(TrackAnalysis {
            bpm: Some(bpm),
            beats: Vec::new(),
            voice_start_secs: 0.0,
            drop_start_secs: 0.0,
            analyzed_secs: 10.0,
            tempo_error: None,
        });
        track
    }

    #[test]
    fn test_order_tracks_ascending_is_stable() {
        let tracks = vec![
            Track::new("none-1", AudioSource::file("a.wav")),
            with_bpm(Track::new("fast", AudioSource::file("b.wav")), 140.0),
            with_bpm(Track::new("slow", AudioSource::file("c.wav")), 100.0),
            Track::new("none-2", AudioSource::file("d.wav")),
            with_bpm(Track::new("slow-2", AudioSource::file("e.wav")), 100.0),
        ];
        let names: Vec<&str> = order_tracks(&tracks, MixOrder::AscendingBpm)
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(names, ["slow", "slow-2", "fast", "none-1", "none-2"]);

        let given: Vec<&str> = order_tracks(&tracks, MixOrder::AsGiven)
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(given, ["none-1", "fast", "slow", "none-2", "slow-2"]);
    }

    #[test]
    fn test_generate_mix_length_and_report() {
        let dir = tempdir().unwrap();
        let tracks = vec![
            tone_track(dir.path(), "a", 6.0, 0.5),
            tone_track(dir.path(), "b", 6.0, 0.1),
            tone_track(dir.path(), "c", 6.0, 0.9),
        ];

        let output = generate_mix(&tracks, &DrumLibrary::new(), &config()).unwrap();
        // 3 × 4 s − 2 × 1 s
        assert_eq!(output.buffer.len(), 10 * RATE as usize);
        assert_eq!(output.report.included.len(), 3);
        assert!(output.report.failures.is_empty());
        assert_eq!(output.report.seams.len(), 2);
        assert!((output.report.duration_secs - 10.0).abs() < 1e-9);
        assert!(output.report.included.iter().all(|t| t.origin == SelectionOrigin::Fallback));
    }

    #[test]
    fn test_tracks_are_normalized_before_stitching() {
        let dir = tempdir().unwrap();
        let tracks = vec![tone_track(dir.path(), "quiet", 6.0, 0.05)];

        let output = generate_mix(&tracks, &DrumLibrary::new(), &config()).unwrap();
        assert!((calculate_rms(&output.buffer) - 0.12).abs() < 1e-3);
        assert!(output.report.included[0].gain_db.unwrap() > 0.0);
    }

    #[test]
    fn test_failures_are_isolated() {
        let dir = tempdir().unwrap();
        let mut late_start = tone_track(dir.path(), "short", 3.0, 0.5);
        late_start.overrides.start = Some(10.0);

        let tracks = vec![
            tone_track(dir.path(), "good", 6.0, 0.5),
            Track::new("missing", AudioSource::file(dir.path().join("missing.wav"))),
            late_start,
        ];

        let output = generate_mix(&tracks, &DrumLibrary::new(), &config()).unwrap();
        assert_eq!(output.report.included.len(), 1);
        assert_eq!(output.buffer.len(), 4 * RATE as usize);

        let codes: Vec<&str> = output.report.failures.iter().map(|f| f.code.as_str()).collect();
        assert_eq!(codes, ["FILE_NOT_FOUND", "EMPTY_SELECTION"]);
    }

    #[test]
    fn test_retry_from_start_recovers_empty_selection() {
        let dir = tempdir().unwrap();
        let mut track = tone_track(dir.path(), "short", 3.0, 0.5);
        track.overrides.start = Some(10.0);

        let config = MixConfig {
            failure_policy: FailurePolicy::RetryFromStart,
            ..config()
        };
        let output = generate_mix(&[track], &DrumLibrary::new(), &config).unwrap();
        assert_eq!(output.report.included[0].start_secs, 0.0);
        assert_eq!(output.buffer.len(), 3 * RATE as usize);
    }

    #[test]
    fn test_unbounded_windows_do_not_abort_the_run() {
        let dir = tempdir().unwrap();
        let mut endless = tone_track(dir.path(), "endless", 3.0, 0.5);
        endless.overrides.start = Some(1.0);
        endless.overrides.duration = Some(f64::INFINITY);
        let mut far = tone_track(dir.path(), "far", 3.0, 0.5);
        far.overrides.start = Some(1e18);
        far.overrides.duration = Some(30.0);

        let output = generate_mix(&[endless, far], &DrumLibrary::new(), &config()).unwrap();
        assert_eq!(output.report.included.len(), 1);
        assert_eq!(output.report.included[0].start_secs, 1.0);
        assert_eq!(output.report.included[0].duration_secs, 4.0);
        assert_eq!(output.report.failures[0].code, "EMPTY_SELECTION");
    }

    #[test]
    fn test_missing_tempo_sorts_last() {
        let mut pulseless = Track::new("pulseless", AudioSource::file("p.wav"));
        pulseless.analysis = with_bpm(Track::new("x", AudioSource::file("x.wav")), 1.0)
            .analysis
            .map(|a| TrackAnalysis { bpm: None, ..a });
        let tracks = vec![pulseless, with_bpm(Track::new("fast", AudioSource::file("f.wav")), 150.0)];

        let names: Vec<&str> = order_tracks(&tracks, MixOrder::AscendingBpm)
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(names, ["fast", "pulseless"]);
    }

    #[test]
    fn test_no_tracks_produced() {
        let dir = tempdir().unwrap();
        let tracks = vec![Track::new("missing", AudioSource::file(dir.path().join("missing.wav")))];

        let result = generate_mix(&tracks, &DrumLibrary::new(), &config());
        assert!(matches!(result, Err(MixError::NoTracksProduced { attempted: 1 })));
        assert!(matches!(
            generate_mix(&[], &DrumLibrary::new(), &config()),
            Err(MixError::NoTracksProduced { attempted: 0 })
        ));
    }

    #[test]
    fn test_drum_glue_and_missing_drum() {
        let dir = tempdir().unwrap();
        let drum_path = dir.path().join("loop.wav");
        write_pcm(&generate_constant(0.5, 3.0, RATE), &drum_path, 16).unwrap();

        let mut drums = DrumLibrary::new();
        let drum_id = drums.insert("loop", AudioSource::file(drum_path));

        let mut glued = tone_track(dir.path(), "glued", 6.0, 0.5);
        glued.overrides = TrackOverride {
            drum: Some(drum_id),
            ..TrackOverride::default()
        };
        let mut dangling = tone_track(dir.path(), "dangling", 6.0, 0.5);
        dangling.overrides.drum = Some(DrumId::new("not-registered"));
        let plain = tone_track(dir.path(), "plain", 6.0, 0.5);

        let output = generate_mix(&[glued, dangling, plain], &drums, &config()).unwrap();
        let seams = &output.report.seams;
        assert_eq!(seams[0].kind, SeamKind::DrumGlue);
        assert_eq!(seams[0].overlap_frames, 2 * RATE as usize);
        assert_eq!(seams[1].kind, SeamKind::Crossfade);
        assert_eq!(output.report.included[0].drum.as_deref(), Some("loop"));
        assert_eq!(output.report.included[1].drum, None);
        // 3 × 4 s − 2 s drum seam − 1 s crossfade
        assert_eq!(output.buffer.len(), 9 * RATE as usize);
    }

    #[test]
    fn test_output_is_clipped_and_in_layout() {
        let dir = tempdir().unwrap();
        let tracks = vec![tone_track(dir.path(), "loud", 6.0, 0.5)];
        let config = MixConfig {
            normalization: Normalization::Peak { target: 1.0 },
            layout: ChannelLayout::Stereo,
            ..config()
        };

        let output = generate_mix(&tracks, &DrumLibrary::new(), &config).unwrap();
        assert_eq!(output.buffer.channels(), 2);
        for channel in &output.buffer.samples {
            assert!(channel.iter().all(|&s| (-0.98..=0.99).contains(&s)));
        }
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let config = MixConfig {
            crossfade_secs: f64::NAN,
            ..config()
        };
        assert!(matches!(
            generate_mix(&[], &DrumLibrary::new(), &config),
            Err(MixError::InvalidConfig { .. })
        ));
    }
}
