//! Segment Stitcher
//!
//! Joins an ordered sequence of trimmed, normalized track buffers into one
//! output buffer. Each seam is either a crossfade or, when the outgoing
//! track carries a drum loop, a drum-glue transition: the loop is blended
//! over the outgoing track's tail and the seam uses a short crossfade.
//!
//! Every seam computes its overlap region as a pure function of the two
//! operands and then performs one bounded write into the output, so the
//! whole run is linear in the total number of samples.

use serde::{Deserialize, Serialize};

use crate::dsp::fade::{progress, FadeCurve};
use crate::engine::buffer::AudioBuffer;
use crate::engine::io::resample;

// ============================================================================
// Configuration
// ============================================================================

/// Drum-glue parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrumGlueConfig {
    /// Longest stretch of the loop laid over a track tail (seconds)
    pub cap_secs: f64,
    /// Weight of the original track under the loop
    pub track_weight: f32,
    /// Weight of the drum loop
    pub drum_weight: f32,
    /// Crossfade length of a drum-glued seam (seconds)
    pub seam_secs: f64,
}

impl Default for DrumGlueConfig {
    fn default() -> Self {
        Self {
            cap_secs: 8.0,
            track_weight: 0.4,
            drum_weight: 0.6,
            seam_secs: 2.0,
        }
    }
}

/// Final hard-clip range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipRange {
    pub low: f32,
    pub high: f32,
}

impl Default for ClipRange {
    fn default() -> Self {
        Self {
            low: -0.98,
            high: 0.99,
        }
    }
}

/// Stitcher parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StitchConfig {
    /// Main crossfade length (seconds)
    pub crossfade_secs: f64,
    /// Crossfade curve for every seam
    pub curve: FadeCurve,
    /// Drum-glue parameters
    pub drum: DrumGlueConfig,
    /// Limiter applied once after the last seam
    pub clip: ClipRange,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            crossfade_secs: 5.0,
            curve: FadeCurve::EqualPower,
            drum: DrumGlueConfig::default(),
            clip: ClipRange::default(),
        }
    }
}

// ============================================================================
// Seam Records
// ============================================================================

/// Join strategy used at a seam
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeamKind {
    Crossfade,
    DrumGlue,
}

/// One completed seam
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seam {
    /// Join strategy
    pub kind: SeamKind,
    /// Output frame where the overlap starts
    pub position_frames: usize,
    /// Overlap length actually used, after clamping
    pub overlap_frames: usize,
}

// ============================================================================
// Join Primitives
// ============================================================================

/// Compute the crossfaded overlap of an outgoing tail and an incoming head
///
/// The result has `min(tail.len(), head.len())` samples; the tail is
/// aligned to its end and the head to its start.
pub fn crossfade_region(tail: &[f32], head: &[f32], curve: FadeCurve) -> Vec<f32> {
    let len = tail.len().min(head.len());
    let tail = &tail[tail.len() - len..];

    (0..len)
        .map(|i| {
            let t = progress(i, len);
            tail[i] * curve.gain_out(t) + head[i] * curve.gain_in(t)
        })
        .collect()
}

/// Crossfade `incoming` onto the end of `output`
///
/// The overlap is clamped to both buffers. Returns the overlap used.
pub fn crossfade_join(
    output: &mut AudioBuffer,
    incoming: &AudioBuffer,
    overlap_frames: usize,
    curve: FadeCurve,
) -> usize {
    if incoming.channels() == 0 {
        return 0;
    }
    let overlap = overlap_frames.min(output.len()).min(incoming.len());
    let start = output.len() - overlap;

    for (ch, out) in output.samples.iter_mut().enumerate() {
        let inc = &incoming.samples[ch.min(incoming.channels() - 1)];
        let region = crossfade_region(&out[start..], &inc[..overlap], curve);
        out[start..].copy_from_slice(&region);
        out.extend_from_slice(&inc[overlap..]);
    }

    overlap
}

/// Blend a drum loop over the tail of a track
///
/// The last `min(len(drum), cap, len(track))` frames become
/// `track × track_weight + drum × drum_weight`, using the start of the loop.
/// Returns the number of frames overlaid.
pub fn overlay_drum(track: &mut AudioBuffer, drum: &AudioBuffer, glue: &DrumGlueConfig) -> usize {
    if track.channels() == 0 || drum.channels() == 0 {
        return 0;
    }

    let resampled;
    let drum = if drum.sample_rate != track.sample_rate {
        resampled = resample(drum, track.sample_rate);
        &resampled
    } else {
        drum
    };

    let cap = track.secs_to_frames(glue.cap_secs);
    let overlay = drum.len().min(cap).min(track.len());
    let start = track.len() - overlay;

    for (ch, samples) in track.samples.iter_mut().enumerate() {
        let loop_samples = &drum.samples[ch.min(drum.channels() - 1)][..overlay];
        let blended: Vec<f32> = samples[start..]
            .iter()
            .zip(loop_samples)
            .map(|(&t, &d)| t * glue.track_weight + d * glue.drum_weight)
            .collect();
        samples[start..].copy_from_slice(&blended);
    }

    overlay
}

// ============================================================================
// Stitcher
// ============================================================================

/// Accumulates track buffers into the output mix
///
/// # Example
/// ```
/// use smartmix::dsp::{StitchConfig, Stitcher};
/// use smartmix::engine::signal::generate_constant;
///
/// let config = StitchConfig { crossfade_secs: 1.0, ..StitchConfig::default() };
/// let mut stitcher = Stitcher::new(config, 1000);
/// stitcher.push(generate_constant(0.1, 4.0, 1000), None);
/// stitcher.push(generate_constant(0.1, 3.0, 1000), None);
/// assert_eq!(stitcher.len(), 6000);
/// ```
#[derive(Debug)]
pub struct Stitcher {
    config: StitchConfig,
    sample_rate: u32,
    output: Option<AudioBuffer>,
    /// Join strategy for the next incoming buffer, set by the previous push
    pending: SeamKind,
    seams: Vec<Seam>,
}

impl Stitcher {
    /// Create an empty stitcher for buffers at `sample_rate`
    pub fn new(config: StitchConfig, sample_rate: u32) -> Self {
        Self {
            config,
            sample_rate,
            output: None,
            pending: SeamKind::Crossfade,
            seams: Vec::new(),
        }
    }

    /// Frames accumulated so far
    pub fn len(&self) -> usize {
        self.output.as_ref().map(|o| o.len()).unwrap_or(0)
    }

    /// True until the first buffer is pushed
    pub fn is_empty(&self) -> bool {
        self.output.is_none()
    }

    /// Seams completed so far
    pub fn seams(&self) -> &[Seam] {
        &self.seams
    }

    fn seam_frames(&self, kind: SeamKind) -> usize {
        let secs = match kind {
            SeamKind::Crossfade => self.config.crossfade_secs,
            SeamKind::DrumGlue => self.config.drum.seam_secs,
        };
        (secs.max(0.0) * self.sample_rate as f64).round() as usize
    }

    /// Append the next track
    ///
    /// With a drum loop the loop is blended over this track's tail and the
    /// seam into the following track uses the drum-glue crossfade.
    pub fn push(&mut self, mut buffer: AudioBuffer, drum: Option<&AudioBuffer>) {
        if let Some(drum) = drum {
            overlay_drum(&mut buffer, drum, &self.config.drum);
        }

        let kind = self.pending;
        let requested = self.seam_frames(kind);
        let curve = self.config.curve;

        match self.output.as_mut() {
            None => self.output = Some(buffer),
            Some(output) => {
                let overlap = crossfade_join(output, &buffer, requested, curve);
                self.seams.push(Seam {
                    kind,
                    position_frames: output.len() - buffer.len(),
                    overlap_frames: overlap,
                });
            }
        }

        self.pending = if drum.is_some() {
            SeamKind::DrumGlue
        } else {
            SeamKind::Crossfade
        };
    }

    /// Apply the final clip and return the mix, or None if nothing was pushed
    pub fn finish(self) -> Option<(AudioBuffer, Vec<Seam>)> {
        let clip = self.config.clip;
        self.output.map(|mut output| {
            output.clamp_range(clip.low, clip.high);
            (output, self.seams)
        })
    }
}

/// Stitch a sequence of (buffer, optional drum loop) pairs in one call
pub fn stitch<'a, I>(segments: I, config: StitchConfig, sample_rate: u32) -> Option<AudioBuffer>
where
    I: IntoIterator<Item = (AudioBuffer, Option<&'a AudioBuffer>)>,
{
    let mut stitcher = Stitcher::new(config, sample_rate);
    for (buffer, drum) in segments {
        stitcher.push(buffer, drum);
    }
    stitcher.finish().map(|(output, _)| output)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::buffer::ChannelLayout;
    use crate::engine::signal::generate_constant;
    use approx::assert_relative_eq;

    const RATE: u32 = 1000;

    fn config(crossfade_secs: f64) -> StitchConfig {
        StitchConfig {
            crossfade_secs,
            clip: ClipRange {
                low: -10.0,
                high: 10.0,
            },
            ..StitchConfig::default()
        }
    }

    fn ramp(len: usize) -> AudioBuffer {
        AudioBuffer::from_mono((0..len).map(|i| i as f32 / len as f32).collect(), RATE)
    }

    #[test]
    fn test_crossfade_region_linear() {
        let region = crossfade_region(&[1.0; 5], &[0.0; 5], FadeCurve::Linear);
        assert_eq!(region, vec![1.0, 0.75, 0.5, 0.25, 0.0]);
    }

    #[test]
    fn test_crossfade_region_aligns_tail_end() {
        let region = crossfade_region(&[9.0, 9.0, 1.0, 1.0], &[0.0, 0.0], FadeCurve::Linear);
        assert_eq!(region, vec![1.0, 0.0]);
    }

    #[test]
    fn test_equal_power_keeps_uncorrelated_power() {
        // Equal RMS on both sides: power stays flat through the overlap
        let n = 1001;
        let region_gain: Vec<f32> = (0..n)
            .map(|i| {
                let t = progress(i, n);
                FadeCurve::EqualPower.gain_out(t).powi(2) + FadeCurve::EqualPower.gain_in(t).powi(2)
            })
            .collect();
        assert!(region_gain.iter().all(|g| (g - 1.0).abs() < 1e-5));
        assert_relative_eq!(region_gain[n / 2], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_first_buffer_is_output_verbatim() {
        let first = ramp(1234);
        let mut stitcher = Stitcher::new(config(1.0), RATE);
        stitcher.push(first.clone(), None);
        let (output, seams) = stitcher.finish().unwrap();
        assert_eq!(output, first);
        assert!(seams.is_empty());
    }

    #[test]
    fn test_output_length_is_sum_minus_overlaps() {
        let lengths = [4000, 3500, 6000, 2500];
        let crossfade = 2.0;
        let segments = lengths.iter().map(|&l| (generate_constant(0.1, l as f64 / 1000.0, RATE), None));
        let output = stitch(segments, config(crossfade), RATE).unwrap();

        let expected = lengths.iter().sum::<usize>() - (lengths.len() - 1) * 2000;
        assert_eq!(output.len(), expected);
    }

    #[test]
    fn test_short_track_clamps_overlap() {
        // 3 s track against a 5 s crossfade
        let mut stitcher = Stitcher::new(config(5.0), RATE);
        stitcher.push(generate_constant(0.2, 10.0, RATE), None);
        stitcher.push(generate_constant(0.2, 3.0, RATE), None);
        assert_eq!(stitcher.seams()[0].overlap_frames, 3000);
        assert_eq!(stitcher.len(), 10_000);

        // Output now shorter than the next requested overlap is fine as well
        let mut stitcher = Stitcher::new(config(5.0), RATE);
        stitcher.push(generate_constant(0.2, 3.0, RATE), None);
        stitcher.push(generate_constant(0.2, 8.0, RATE), None);
        assert_eq!(stitcher.seams()[0].overlap_frames, 3000);
        assert_eq!(stitcher.len(), 8000);
    }

    #[test]
    fn test_empty_incoming_buffer() {
        let mut stitcher = Stitcher::new(config(1.0), RATE);
        stitcher.push(generate_constant(0.2, 2.0, RATE), None);
        stitcher.push(AudioBuffer::new(0, ChannelLayout::Mono, RATE), None);
        assert_eq!(stitcher.len(), 2000);
        assert_eq!(stitcher.seams()[0].overlap_frames, 0);
    }

    #[test]
    fn test_crossfade_join_writes_overlap_and_appends_rest() {
        let mut output = generate_constant(1.0, 0.01, RATE);
        let incoming = generate_constant(0.0, 0.02, RATE);
        let overlap = crossfade_join(&mut output, &incoming, 5, FadeCurve::Linear);

        assert_eq!(overlap, 5);
        assert_eq!(output.len(), 25);
        assert_eq!(&output.channel(0)[..5], &[1.0; 5]);
        assert_eq!(&output.channel(0)[5..10], &[1.0, 0.75, 0.5, 0.25, 0.0]);
        assert!(output.channel(0)[10..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_drum_overlay_region() {
        // 10 s loop, 8 s cap, 60 s track
        let mut track = generate_constant(0.5, 60.0, RATE);
        let drum = ramp(10_000);
        let glue = DrumGlueConfig::default();

        let overlaid = overlay_drum(&mut track, &drum, &glue);
        assert_eq!(overlaid, 8000);

        let samples = track.channel(0);
        assert!(samples[..52_000].iter().all(|&s| s == 0.5));
        for i in 0..8000 {
            let expected = 0.5 * glue.track_weight + drum.channel(0)[i] * glue.drum_weight;
            assert_relative_eq!(samples[52_000 + i], expected, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_drum_overlay_clamps_to_short_track() {
        let mut track = generate_constant(0.5, 3.0, RATE);
        let drum = generate_constant(1.0, 10.0, RATE);
        assert_eq!(overlay_drum(&mut track, &drum, &DrumGlueConfig::default()), 3000);
        assert!(track.channel(0).iter().all(|&s| (s - 0.8).abs() < 1e-6));
    }

    #[test]
    fn test_drum_overlay_resamples_loop() {
        let mut track = generate_constant(0.0, 10.0, RATE);
        let drum = generate_constant(1.0, 2.0, RATE * 2);
        let overlaid = overlay_drum(&mut track, &drum, &DrumGlueConfig::default());
        assert_eq!(overlaid, 2000);
    }

    #[test]
    fn test_drum_track_uses_short_seam() {
        let drum = generate_constant(0.3, 10.0, RATE);
        let mut stitcher = Stitcher::new(config(5.0), RATE);
        stitcher.push(generate_constant(0.2, 30.0, RATE), Some(&drum));
        stitcher.push(generate_constant(0.2, 30.0, RATE), None);
        stitcher.push(generate_constant(0.2, 30.0, RATE), None);

        let seams = stitcher.seams();
        assert_eq!(seams[0].kind, SeamKind::DrumGlue);
        assert_eq!(seams[0].overlap_frames, 2000);
        assert_eq!(seams[0].position_frames, 28_000);
        assert_eq!(seams[1].kind, SeamKind::Crossfade);
        assert_eq!(seams[1].overlap_frames, 5000);
        assert_eq!(stitcher.len(), 90_000 - 2000 - 5000);
    }

    #[test]
    fn test_finish_applies_clip_once() {
        let mut stitcher = Stitcher::new(StitchConfig::default(), RATE);
        stitcher.push(generate_constant(1.5, 1.0, RATE), None);
        stitcher.push(generate_constant(-1.5, 1.0, RATE), None);
        let (output, _) = stitcher.finish().unwrap();

        let samples = output.channel(0);
        assert!(samples.iter().all(|&s| (-0.98..=0.99).contains(&s)));
        assert_eq!(samples[0], 0.99);
        assert_eq!(*samples.last().unwrap(), -0.98);
    }

    #[test]
    fn test_stereo_stitch() {
        let left_right = AudioBuffer {
            samples: vec![vec![0.1; 3000], vec![-0.1; 3000]],
            sample_rate: RATE,
        };
        let output = stitch(
            vec![(left_right.clone(), None), (left_right, None)],
            config(1.0),
            RATE,
        )
        .unwrap();
        assert_eq!(output.channels(), 2);
        assert_eq!(output.len(), 5000);
    }

    #[test]
    fn test_stitch_nothing() {
        assert!(stitch(Vec::new(), StitchConfig::default(), RATE).is_none());
    }
}
