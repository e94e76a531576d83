//! Start-Point Selector
//!
//! Decides where each track's segment starts and how long it runs.
//! User overrides win field by field; otherwise the start comes from the
//! configured [`StartPolicy`] and the length from the track's tempo.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::analysis::TrackAnalysis;
use crate::mix::config::MixConfig;
use crate::mix::track::TrackOverride;

/// Segment length used when a track has no analysis
pub const FALLBACK_DURATION_SECS: f64 = 75.0;

/// Where a segment starts, given an analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartPolicy {
    /// Always the top of the track
    Zero,
    /// End of the leading silence
    Voice,
    /// First energy drop
    Drop,
    /// End of the leading silence, moved onto the beat grid
    #[default]
    VoiceOnBeat,
    /// First energy drop, moved onto the beat grid
    DropOnBeat,
}

/// What decided a selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionOrigin {
    /// Both start and duration were pinned by the user
    Override,
    /// Derived from the track's analysis
    Analysis,
    /// The track had no analysis
    Fallback,
}

/// Chosen segment of a track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub start_secs: f64,
    pub duration_secs: f64,
    pub origin: SelectionOrigin,
}

/// Segment length for a tempo
///
/// Slower tracks get longer segments: below 100 BPM 90 s, up to and
/// including 128 BPM 75 s, faster 60 s.
pub fn duration_for_tempo(bpm: f64) -> f64 {
    if bpm < 100.0 {
        90.0
    } else if bpm <= 128.0 {
        75.0
    } else {
        60.0
    }
}

/// Start candidate for a policy
pub fn policy_start(policy: StartPolicy, analysis: &TrackAnalysis, config: &MixConfig) -> f64 {
    let start = match policy {
        StartPolicy::Zero => 0.0,
        StartPolicy::Voice => analysis.voice_start_secs,
        StartPolicy::Drop => analysis.drop_start_secs,
        StartPolicy::VoiceOnBeat => config.beat_snap.apply(analysis.voice_start_secs, &analysis.beats),
        StartPolicy::DropOnBeat => config.beat_snap.apply(analysis.drop_start_secs, &analysis.beats),
    };
    start.max(0.0)
}

/// Override value, if it is a usable number of seconds
fn pinned(value: Option<f64>, what: &str) -> Option<f64> {
    match value {
        Some(v) if v.is_finite() => Some(v.max(0.0)),
        Some(v) => {
            warn!("Ignoring {} override of {}", what, v);
            None
        }
        None => None,
    }
}

/// Choose start and duration for a track
///
/// Non-finite override values are ignored.
///
/// # Arguments
/// * `analysis` - Analyzer output, None when missing or failed
/// * `overrides` - User-pinned values
/// * `config` - Start policy, beat snap and default duration
pub fn select(analysis: Option<&TrackAnalysis>, overrides: &TrackOverride, config: &MixConfig) -> Selection {
    let start_override = pinned(overrides.start, "start");
    let duration_override = pinned(overrides.duration, "duration");

    if let (Some(start), Some(duration)) = (start_override, duration_override) {
        return Selection {
            start_secs: start,
            duration_secs: duration,
            origin: SelectionOrigin::Override,
        };
    }

    let (start, duration, origin) = match analysis {
        Some(analysis) => (
            policy_start(config.start_policy, analysis, config),
            config
                .default_duration_secs
                .or_else(|| analysis.bpm.map(duration_for_tempo))
                .unwrap_or(FALLBACK_DURATION_SECS),
            SelectionOrigin::Analysis,
        ),
        None => {
            warn!("No analysis available, starting at 0s");
            (
                0.0,
                config.default_duration_secs.unwrap_or(FALLBACK_DURATION_SECS),
                SelectionOrigin::Fallback,
            )
        }
    };

    Selection {
        start_secs: start_override.unwrap_or(start),
        duration_secs: duration_override.unwrap_or(duration),
        origin,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::BeatSnap;

    fn analysis(bpm: f64) -> TrackAnalysis {
        TrackAnalysis {
            bpm: Some(bpm),
            beats: vec![0.5, 1.0, 1.5, 2.0, 2.5, 3.0],
            voice_start_secs: 1.2,
            drop_start_secs: 2.7,
            analyzed_secs: 90.0,
            tempo_error: None,
        }
    }

    fn config_with(policy: StartPolicy) -> MixConfig {
        MixConfig {
            start_policy: policy,
            ..MixConfig::default()
        }
    }

    #[test]
    fn test_duration_for_tempo_boundaries() {
        assert_eq!(duration_for_tempo(99.9), 90.0);
        assert_eq!(duration_for_tempo(100.0), 75.0);
        assert_eq!(duration_for_tempo(128.0), 75.0);
        assert_eq!(duration_for_tempo(128.1), 60.0);
    }

    #[test]
    fn test_policies() {
        let a = analysis(120.0);
        let expected = [
            (StartPolicy::Zero, 0.0),
            (StartPolicy::Voice, 1.2),
            (StartPolicy::Drop, 2.7),
            (StartPolicy::VoiceOnBeat, 1.0),
            (StartPolicy::DropOnBeat, 2.5),
        ];
        for (policy, start) in expected {
            let selection = select(Some(&a), &TrackOverride::default(), &config_with(policy));
            assert_eq!(selection.start_secs, start, "{:?}", policy);
            assert_eq!(selection.duration_secs, 75.0);
            assert_eq!(selection.origin, SelectionOrigin::Analysis);
        }
    }

    #[test]
    fn test_following_snap() {
        let config = MixConfig {
            beat_snap: BeatSnap::Following,
            ..MixConfig::default()
        };
        let selection = select(Some(&analysis(120.0)), &TrackOverride::default(), &config);
        assert_eq!(selection.start_secs, 1.5);
    }

    #[test]
    fn test_snapped_start_is_on_grid() {
        let a = analysis(120.0);
        for policy in [StartPolicy::VoiceOnBeat, StartPolicy::DropOnBeat] {
            let selection = select(Some(&a), &TrackOverride::default(), &config_with(policy));
            assert!(a.beats.contains(&selection.start_secs));
        }
    }

    #[test]
    fn test_empty_grid_keeps_raw_candidate() {
        let mut a = analysis(120.0);
        a.beats.clear();
        let selection = select(Some(&a), &TrackOverride::default(), &MixConfig::default());
        assert_eq!(selection.start_secs, 1.2);
    }

    #[test]
    fn test_overrides_win_individually() {
        let a = analysis(140.0);
        let start_only = TrackOverride {
            start: Some(30.0),
            ..TrackOverride::default()
        };
        let selection = select(Some(&a), &start_only, &MixConfig::default());
        assert_eq!(selection.start_secs, 30.0);
        assert_eq!(selection.duration_secs, 60.0);

        let duration_only = TrackOverride {
            duration: Some(12.0),
            ..TrackOverride::default()
        };
        let selection = select(None, &duration_only, &MixConfig::default());
        assert_eq!(selection.start_secs, 0.0);
        assert_eq!(selection.duration_secs, 12.0);
        assert_eq!(selection.origin, SelectionOrigin::Fallback);

        let both = TrackOverride {
            start: Some(5.0),
            duration: Some(10.0),
            drum: None,
        };
        let selection = select(Some(&a), &both, &MixConfig::default());
        assert_eq!(selection.origin, SelectionOrigin::Override);
        assert_eq!((selection.start_secs, selection.duration_secs), (5.0, 10.0));
    }

    #[test]
    fn test_missing_analysis_falls_back() {
        let selection = select(None, &TrackOverride::default(), &MixConfig::default());
        assert_eq!(selection.start_secs, 0.0);
        assert_eq!(selection.duration_secs, FALLBACK_DURATION_SECS);
        assert_eq!(selection.origin, SelectionOrigin::Fallback);
    }

    #[test]
    fn test_configured_duration_beats_tempo_mapping() {
        let config = MixConfig {
            default_duration_secs: Some(30.0),
            ..MixConfig::default()
        };
        let selection = select(Some(&analysis(90.0)), &TrackOverride::default(), &config);
        assert_eq!(selection.duration_secs, 30.0);
    }

    #[test]
    fn test_missing_tempo_still_uses_voice_start() {
        let mut a = analysis(120.0);
        a.bpm = None;
        a.beats.clear();
        a.tempo_error = Some("no periodicity".to_string());

        let selection = select(Some(&a), &TrackOverride::default(), &MixConfig::default());
        assert_eq!(selection.start_secs, 1.2);
        assert_eq!(selection.duration_secs, FALLBACK_DURATION_SECS);
        assert_eq!(selection.origin, SelectionOrigin::Analysis);
    }

    #[test]
    fn test_non_finite_overrides_are_ignored() {
        let a = analysis(140.0);
        let overrides = TrackOverride {
            start: Some(f64::NAN),
            duration: Some(f64::INFINITY),
            drum: None,
        };
        let selection = select(Some(&a), &overrides, &MixConfig::default());
        assert_eq!(selection.start_secs, 1.0);
        assert_eq!(selection.duration_secs, 60.0);
        assert_eq!(selection.origin, SelectionOrigin::Analysis);
    }
}
