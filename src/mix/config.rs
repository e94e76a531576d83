//! Mix configuration
//!
//! One [`MixConfig`] drives a whole generation run. Every field has a
//! default, so a JSON file only needs the values it changes.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::analysis::tempo::MIN_ANALYSIS_SECS;
use crate::analysis::{AnalysisConfig, BeatSnap};
use crate::dsp::{ClipRange, DrumGlueConfig, FadeCurve, Normalization, StitchConfig};
use crate::engine::buffer::{ChannelLayout, MIX_SAMPLE_RATE};
use crate::engine::export::ExportSettings;
use crate::error::{MixError, Result};
use crate::mix::selector::StartPolicy;

/// Highest mixing rate accepted
const MAX_SAMPLE_RATE: u32 = 384_000;

/// Order in which tracks enter the mix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MixOrder {
    /// Registration (or explicit reorder) order
    AsGiven,
    /// Slowest first; tracks without a tempo go last in their given order
    #[default]
    AscendingBpm,
}

/// What to do with a track that produces no audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Report the failure and continue with the next track
    #[default]
    Skip,
    /// Retry an empty selection from the top of the track first
    RetryFromStart,
}

/// Parameters for one mix generation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixConfig {
    /// Rate every segment is converted to before stitching
    pub sample_rate: u32,
    /// Output channel layout
    pub layout: ChannelLayout,
    /// Main crossfade length (seconds)
    pub crossfade_secs: f64,
    pub curve: FadeCurve,
    pub normalization: Normalization,
    pub drum: DrumGlueConfig,
    pub clip: ClipRange,
    pub start_policy: StartPolicy,
    pub beat_snap: BeatSnap,
    /// Segment length for every analyzed track; None uses the tempo mapping
    pub default_duration_secs: Option<f64>,
    pub order: MixOrder,
    pub failure_policy: FailurePolicy,
    pub analysis: AnalysisConfig,
    pub export: ExportSettings,
}

impl Default for MixConfig {
    fn default() -> Self {
        Self {
            sample_rate: MIX_SAMPLE_RATE,
            layout: ChannelLayout::Mono,
            crossfade_secs: 5.0,
            curve: FadeCurve::EqualPower,
            normalization: Normalization::default(),
            drum: DrumGlueConfig::default(),
            clip: ClipRange::default(),
            start_policy: StartPolicy::default(),
            beat_snap: BeatSnap::default(),
            default_duration_secs: None,
            order: MixOrder::default(),
            failure_policy: FailurePolicy::default(),
            analysis: AnalysisConfig::default(),
            export: ExportSettings::default(),
        }
    }
}

impl MixConfig {
    /// Load and validate a JSON configuration file
    ///
    /// # Errors
    /// * `FileNotFound` - the file does not exist
    /// * `Serialization` - the file is not valid JSON for this structure
    /// * `InvalidConfig` - a value is out of range
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MixError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let text = fs::read_to_string(path)?;
        let config: MixConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Pretty JSON rendering
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Stitcher parameters for this run
    pub fn stitch_config(&self) -> StitchConfig {
        StitchConfig {
            crossfade_secs: self.crossfade_secs,
            curve: self.curve,
            drum: self.drum.clone(),
            clip: self.clip,
        }
    }

    /// Check every value is in range
    pub fn validate(&self) -> Result<()> {
        fn invalid(reason: impl Into<String>) -> Result<()> {
            Err(MixError::InvalidConfig { reason: reason.into() })
        }
        fn non_negative(value: f64) -> bool {
            value.is_finite() && value >= 0.0
        }

        if self.sample_rate == 0 || self.sample_rate > MAX_SAMPLE_RATE {
            return invalid(format!("sample_rate {} out of range", self.sample_rate));
        }
        if !non_negative(self.crossfade_secs) {
            return invalid("crossfade_secs must be a non-negative number");
        }

        let target = self.normalization.target();
        if !(target.is_finite() && target > 0.0) {
            return invalid("normalization target must be positive");
        }

        if !non_negative(self.drum.cap_secs) || !non_negative(self.drum.seam_secs) {
            return invalid("drum cap_secs and seam_secs must be non-negative numbers");
        }
        let weights = [self.drum.track_weight, self.drum.drum_weight];
        if weights.iter().any(|w| !(w.is_finite() && *w >= 0.0)) {
            return invalid("drum weights must be non-negative");
        }
        if self.drum.track_weight >= self.drum.drum_weight {
            return invalid(format!(
                "drum track_weight {} must be below drum_weight {}",
                self.drum.track_weight, self.drum.drum_weight
            ));
        }

        let clip = self.clip;
        if !(clip.low >= -1.0 && clip.high <= 1.0 && clip.low < clip.high) {
            return invalid(format!("clip range [{}, {}] must lie inside [-1, 1]", clip.low, clip.high));
        }

        if let Some(duration) = self.default_duration_secs {
            if !(duration.is_finite() && duration > 0.0) {
                return invalid("default_duration_secs must be positive");
            }
        }

        if self.analysis.sample_rate == 0 || self.analysis.sample_rate > MAX_SAMPLE_RATE {
            return invalid(format!("analysis sample_rate {} out of range", self.analysis.sample_rate));
        }
        if !(self.analysis.window_secs.is_finite() && self.analysis.window_secs >= MIN_ANALYSIS_SECS) {
            return invalid(format!("analysis window_secs must be at least {}", MIN_ANALYSIS_SECS));
        }

        if ![16, 24, 32].contains(&self.export.bit_depth) {
            return invalid(format!("bit_depth {} not one of 16, 24, 32", self.export.bit_depth));
        }
        if self.export.bitrate_kbps == 0 {
            return invalid("bitrate_kbps must be positive");
        }

        Ok(())
    }
}
