//! Mix session
//!
//! An explicitly owned collection of tracks and drum loops. Callers
//! register inputs, analyze them, adjust order and overrides, and then
//! generate a mix from the current state.

use std::collections::HashSet;

use log::info;

use crate::engine::io::AudioSource;
use crate::error::{MixError, Result};
use crate::mix::config::MixConfig;
use crate::mix::orchestrator::{compare_bpm, generate_mix, MixOutput};
use crate::mix::track::{analyze_tracks, DrumId, DrumLibrary, Track, TrackId, TrackOverride};

/// Tracks and drum loops for one mix
#[derive(Debug, Default)]
pub struct MixSession {
    tracks: Vec<Track>,
    drums: DrumLibrary,
}

impl MixSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered tracks in mix order
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn drums(&self) -> &DrumLibrary {
        &self.drums
    }

    fn track_mut(&mut self, id: TrackId) -> Result<&mut Track> {
        self.tracks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| MixError::UnknownTrack { id: id.to_string() })
    }

    /// Register a track
    ///
    /// Registering a name twice returns the id of the first registration.
    pub fn add_track(&mut self, name: impl Into<String>, source: AudioSource) -> TrackId {
        let name = name.into();
        if let Some(existing) = self.tracks.iter().find(|t| t.name == name) {
            info!("Track '{}' already registered", name);
            return existing.id;
        }

        let track = Track::new(name, source);
        let id = track.id;
        self.tracks.push(track);
        id
    }

    /// Register a drum loop under `name`
    pub fn add_drum(&mut self, name: impl Into<String>, source: AudioSource) -> DrumId {
        self.drums.insert(name, source)
    }

    /// Put tracks into the given order
    ///
    /// # Errors
    /// `InvalidOrder` unless `order` names every registered track exactly once.
    pub fn reorder(&mut self, order: &[TrackId]) -> Result<()> {
        if order.len() != self.tracks.len() {
            return Err(MixError::InvalidOrder {
                reason: format!("expected {} tracks, got {}", self.tracks.len(), order.len()),
            });
        }

        let mut seen = HashSet::with_capacity(order.len());
        for id in order {
            if !seen.insert(*id) || self.track(*id).is_none() {
                return Err(MixError::InvalidOrder {
                    reason: format!("{} is unknown or listed twice", id),
                });
            }
        }

        let mut remaining: Vec<Option<Track>> = self.tracks.drain(..).map(Some).collect();
        let reordered = order
            .iter()
            .filter_map(|id| {
                remaining
                    .iter_mut()
                    .find(|slot| slot.as_ref().map(|t| t.id == *id).unwrap_or(false))
                    .and_then(Option::take)
            })
            .collect();

        self.tracks = reordered;
        Ok(())
    }

    /// Replace the user overrides of a track
    ///
    /// # Errors
    /// * `InvalidConfig` - a start or duration is not a finite number
    /// * `UnknownTrack` - no track has this id
    /// * `UnknownDrum` - the override names an unregistered drum loop
    pub fn set_override(&mut self, id: TrackId, overrides: TrackOverride) -> Result<()> {
        for (field, value) in [("start", overrides.start), ("duration", overrides.duration)] {
            if value.is_some_and(|v| !v.is_finite()) {
                return Err(MixError::InvalidConfig {
                    reason: format!("{} override must be a finite number of seconds", field),
                });
            }
        }
        if let Some(drum) = &overrides.drum {
            if !self.drums.contains(drum) {
                return Err(MixError::UnknownDrum {
                    name: drum.to_string(),
                });
            }
        }
        self.track_mut(id)?.overrides = overrides;
        Ok(())
    }

    /// Unregister a track and hand it back
    pub fn remove_track(&mut self, id: TrackId) -> Result<Track> {
        let index = self
            .tracks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| MixError::UnknownTrack { id: id.to_string() })?;
        Ok(self.tracks.remove(index))
    }

    /// Drop every track and drum loop
    pub fn reset(&mut self) {
        self.tracks.clear();
        self.drums.clear();
    }

    /// Analyze all tracks and drum loops; returns how many tracks have a tempo
    pub fn analyze(&mut self, config: &MixConfig) -> usize {
        let analyzed = analyze_tracks(&mut self.tracks, &config.analysis);
        let drums = self.drums.analyze(&config.analysis);
        info!(
            "Tempo found for {}/{} tracks and {}/{} drum loops",
            analyzed,
            self.tracks.len(),
            drums,
            self.drums.len()
        );
        analyzed
    }

    /// Order tracks by ascending tempo; tracks without a tempo go last
    pub fn sort_by_bpm(&mut self) {
        self.tracks.sort_by(|a, b| compare_bpm(a.bpm(), b.bpm()));
    }

    /// Give every analyzed track without a drum the loop closest in tempo
    ///
    /// Returns the number of tracks that received a loop.
    pub fn assign_nearest_drums(&mut self) -> usize {
        let mut assigned = 0;
        for track in &mut self.tracks {
            if track.overrides.drum.is_some() {
                continue;
            }
            let nearest = track.bpm().and_then(|bpm| self.drums.nearest_by_bpm(bpm));
            if let Some(drum) = nearest {
                track.overrides.drum = Some(drum.id.clone());
                assigned += 1;
            }
        }
        assigned
    }

    /// Generate a mix from the current state
    pub fn generate(&self, config: &MixConfig) -> Result<MixOutput> {
        generate_mix(&self.tracks, &self.drums, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::TrackAnalysis;

    fn session_with(names: &[&str]) -> (MixSession, Vec<TrackId>) {
        let mut session = MixSession::new();
        let ids = names
            .iter()
            .map(|n| session.add_track(*n, AudioSource::file(format!("{}.wav", n))))
            .collect();
        (session, ids)
    }

    fn set_bpm(session: &mut MixSession, id: TrackId, bpm: f64) {
        session.track_mut(id).unwrap().analysis = Some(TrackAnalysis {
            bpm: Some(bpm),
            beats: Vec::new(),
            voice_start_secs: 0.0,
            drop_start_secs: 0.0,
            analyzed_secs: 30.0,
            tempo_error: None,
        });
    }

    fn names(session: &MixSession) -> Vec<&str> {
        session.tracks().iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn test_duplicate_name_returns_existing_id() {
        let mut session = MixSession::new();
        let first = session.add_track("song", AudioSource::file("a.wav"));
        let second = session.add_track("song", AudioSource::file("b.wav"));
        assert_eq!(first, second);
        assert_eq!(session.tracks().len(), 1);
    }

    #[test]
    fn test_reorder_permutation() {
        let (mut session, ids) = session_with(&["a", "b", "c"]);
        session.reorder(&[ids[2], ids[0], ids[1]]).unwrap();
        assert_eq!(names(&session), ["c", "a", "b"]);
    }

    #[test]
    fn test_reorder_rejects_non_permutations() {
        let (mut session, ids) = session_with(&["a", "b", "c"]);

        let short = session.reorder(&[ids[0], ids[1]]);
        assert!(matches!(short, Err(MixError::InvalidOrder { .. })));

        let duplicate = session.reorder(&[ids[1], ids[1], ids[0]]);
        assert!(matches!(duplicate, Err(MixError::InvalidOrder { .. })));

        let unknown = session.reorder(&[ids[0], TrackId::new(), ids[2]]);
        assert!(matches!(unknown, Err(MixError::InvalidOrder { .. })));

        // Failed reorders leave the order alone
        assert_eq!(names(&session), ["a", "b", "c"]);
    }

    #[test]
    fn test_set_override_validates_ids() {
        let (mut session, ids) = session_with(&["a"]);
        let drum = session.add_drum("kick", AudioSource::file("kick.wav"));

        let good = TrackOverride {
            start: Some(12.0),
            duration: None,
            drum: Some(drum),
        };
        session.set_override(ids[0], good.clone()).unwrap();
        assert_eq!(session.track(ids[0]).unwrap().overrides, good);

        let bad_drum = TrackOverride {
            drum: Some(DrumId::new("snare")),
            ..TrackOverride::default()
        };
        assert!(matches!(
            session.set_override(ids[0], bad_drum),
            Err(MixError::UnknownDrum { .. })
        ));
        assert!(matches!(
            session.set_override(TrackId::new(), TrackOverride::default()),
            Err(MixError::UnknownTrack { .. })
        ));
    }

    #[test]
    fn test_set_override_rejects_non_finite_times() {
        let (mut session, ids) = session_with(&["a"]);
        for overrides in [
            TrackOverride {
                duration: Some(f64::INFINITY),
                ..TrackOverride::default()
            },
            TrackOverride {
                start: Some(f64::NAN),
                ..TrackOverride::default()
            },
        ] {
            assert!(matches!(
                session.set_override(ids[0], overrides),
                Err(MixError::InvalidConfig { .. })
            ));
        }
        assert!(session.track(ids[0]).unwrap().overrides.is_empty());
    }

    #[test]
    fn test_remove_and_reset() {
        let (mut session, ids) = session_with(&["a", "b"]);
        session.add_drum("kick", AudioSource::file("kick.wav"));

        let removed = session.remove_track(ids[0]).unwrap();
        assert_eq!(removed.name, "a");
        assert!(session.remove_track(ids[0]).is_err());
        assert_eq!(names(&session), ["b"]);

        session.reset();
        assert!(session.tracks().is_empty());
        assert!(session.drums().is_empty());
    }

    #[test]
    fn test_sort_by_bpm() {
        let (mut session, ids) = session_with(&["fast", "unknown", "slow"]);
        set_bpm(&mut session, ids[0], 140.0);
        set_bpm(&mut session, ids[2], 95.0);

        session.sort_by_bpm();
        assert_eq!(names(&session), ["slow", "fast", "unknown"]);
    }

    #[test]
    fn test_assign_nearest_drums_keeps_manual_choice() {
        let (mut session, ids) = session_with(&["a", "b", "c"]);
        set_bpm(&mut session, ids[0], 100.0);
        set_bpm(&mut session, ids[1], 138.0);

        let slow = session.add_drum("slow", AudioSource::file("slow.wav"));
        let fast = session.add_drum("fast", AudioSource::file("fast.wav"));
        session.drums.set_bpm(&slow, Some(98.0)).unwrap();
        session.drums.set_bpm(&fast, Some(140.0)).unwrap();

        session
            .set_override(
                ids[1],
                TrackOverride {
                    drum: Some(slow.clone()),
                    ..TrackOverride::default()
                },
            )
            .unwrap();

        assert_eq!(session.assign_nearest_drums(), 1);
        assert_eq!(session.track(ids[0]).unwrap().overrides.drum, Some(slow.clone()));
        assert_eq!(session.track(ids[1]).unwrap().overrides.drum, Some(slow));
        assert_eq!(session.track(ids[2]).unwrap().overrides.drum, None);
    }
}
