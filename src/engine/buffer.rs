//! Audio Buffer Management
//!
//! Provides the planar sample buffer used for analysis, normalization and
//! stitching, plus the level measurements the normalizer relies on.

use crate::error::{MixError, Result};

// ============================================================================
// Constants
// ============================================================================

/// Sample rate used for mixing unless configured otherwise (44.1kHz)
pub const MIX_SAMPLE_RATE: u32 = 44100;

/// Sample rate used for tempo/onset analysis (22.05kHz)
pub const ANALYSIS_SAMPLE_RATE: u32 = 22050;

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert linear amplitude to decibels
///
/// Returns -f32::INFINITY for zero input.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

/// Calculate the linear RMS level across all channels
///
/// Returns 0.0 for empty buffers.
pub fn calculate_rms(buffer: &AudioBuffer) -> f32 {
    let total_samples = buffer.channels() * buffer.len();
    if total_samples == 0 {
        return 0.0;
    }

    let sum_squares: f64 = buffer
        .samples
        .iter()
        .flat_map(|channel| channel.iter())
        .map(|&s| (s as f64) * (s as f64))
        .sum();

    (sum_squares / total_samples as f64).sqrt() as f32
}

/// Calculate the linear peak (maximum absolute sample) across all channels
pub fn calculate_peak(buffer: &AudioBuffer) -> f32 {
    buffer
        .samples
        .iter()
        .flat_map(|channel| channel.iter())
        .map(|&s| s.abs())
        .fold(0.0_f32, f32::max)
}

// ============================================================================
// Channel Layout
// ============================================================================

/// Audio channel configuration
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ChannelLayout {
    /// Single channel (mono)
    #[default]
    Mono,
    /// Two channels (stereo: left, right)
    Stereo,
}

impl ChannelLayout {
    /// Returns the number of channels for this layout
    pub fn num_channels(&self) -> usize {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }
}

// ============================================================================
// Audio Buffer
// ============================================================================

/// Planar 32-bit float audio buffer
///
/// Each channel is a separate `Vec<f32>`; all channels have the same length.
///
/// # Example
/// ```
/// use smartmix::engine::buffer::{AudioBuffer, ChannelLayout, MIX_SAMPLE_RATE};
///
/// let buffer = AudioBuffer::new(MIX_SAMPLE_RATE as usize, ChannelLayout::Stereo, MIX_SAMPLE_RATE);
/// assert_eq!(buffer.channels(), 2);
/// assert_eq!(buffer.len(), 44100);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Sample data: outer Vec is channels, inner Vec is samples
    pub samples: Vec<Vec<f32>>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Create a silent buffer with `num_samples` frames
    pub fn new(num_samples: usize, layout: ChannelLayout, sample_rate: u32) -> Self {
        Self {
            samples: vec![vec![0.0_f32; num_samples]; layout.num_channels()],
            sample_rate,
        }
    }

    /// Wrap a single channel of samples
    pub fn from_mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: vec![samples],
            sample_rate,
        }
    }

    /// Create a buffer from interleaved sample data
    ///
    /// # Errors
    /// `Decode` if the data length is not a multiple of the channel count.
    pub fn from_interleaved(interleaved: &[f32], channels: usize, sample_rate: u32) -> Result<Self> {
        if channels == 0 {
            return Err(MixError::UnsupportedFormat {
                format: "zero-channel audio".to_string(),
            });
        }

        if interleaved.len() % channels != 0 {
            return Err(MixError::Decode {
                source_name: "interleaved buffer".to_string(),
                reason: format!(
                    "length {} is not divisible by channel count {}",
                    interleaved.len(),
                    channels
                ),
                source: None,
            });
        }

        let frames = interleaved.len() / channels;
        let mut samples = vec![Vec::with_capacity(frames); channels];
        for frame in interleaved.chunks_exact(channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                samples[ch].push(sample);
            }
        }

        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Convert the buffer to interleaved format (L, R, L, R, ...)
    pub fn to_interleaved(&self) -> Vec<f32> {
        let mut interleaved = Vec::with_capacity(self.channels() * self.len());
        for frame in 0..self.len() {
            for channel in &self.samples {
                interleaved.push(channel[frame]);
            }
        }
        interleaved
    }

    /// Get the number of channels
    #[inline]
    pub fn channels(&self) -> usize {
        self.samples.len()
    }

    /// Get the number of frames (samples per channel)
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.first().map(|ch| ch.len()).unwrap_or(0)
    }

    /// Check if the buffer holds no frames
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the duration in seconds
    #[inline]
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }

    /// Convert seconds to a frame count at this buffer's rate
    #[inline]
    pub fn secs_to_frames(&self, secs: f64) -> usize {
        (secs.max(0.0) * self.sample_rate as f64).round() as usize
    }

    /// Immutable access to a channel's samples
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.samples[index]
    }

    /// Down-mix all channels to one by averaging
    pub fn to_mono(&self) -> Vec<f32> {
        match self.channels() {
            0 => Vec::new(),
            1 => self.samples[0].clone(),
            n => {
                let scale = 1.0 / n as f32;
                (0..self.len())
                    .map(|i| self.samples.iter().map(|ch| ch[i]).sum::<f32>() * scale)
                    .collect()
            }
        }
    }

    /// Convert to the given layout
    ///
    /// Mono is duplicated to stereo; anything else is averaged down first.
    pub fn into_layout(self, layout: ChannelLayout) -> Self {
        if self.channels() == layout.num_channels() {
            return self;
        }

        let mono = self.to_mono();
        Self {
            samples: vec![mono; layout.num_channels()],
            sample_rate: self.sample_rate,
        }
    }

    /// Keep only the frames in `start..start + len`, clamped to the buffer
    pub fn truncate_window(&mut self, start: usize, len: usize) {
        let total = self.len();
        let start = start.min(total);
        let end = start.saturating_add(len).min(total);
        for channel in &mut self.samples {
            channel.truncate(end);
            channel.drain(..start);
        }
    }

    /// Scale every sample by a linear gain
    pub fn scale(&mut self, gain: f32) {
        for channel in &mut self.samples {
            for sample in channel.iter_mut() {
                *sample *= gain;
            }
        }
    }

    /// Clamp every sample into `[low, high]`
    pub fn clamp_range(&mut self, low: f32, high: f32) {
        for channel in &mut self.samples {
            for sample in channel.iter_mut() {
                *sample = sample.clamp(low, high);
            }
        }
    }

    /// Check if all samples are finite (not NaN or Infinity)
    pub fn is_finite(&self) -> bool {
        self.samples
            .iter()
            .flat_map(|ch| ch.iter())
            .all(|s| s.is_finite())
    }
}

impl Default for AudioBuffer {
    fn default() -> Self {
        Self::new(0, ChannelLayout::Mono, MIX_SAMPLE_RATE)
    }
}

// ============================================================================
// Tests
// ============================================================================
