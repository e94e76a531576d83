//! Audio loading for SmartMix
//!
//! Decodes a source into an [`AudioBuffer`] at a target sample rate and
//! layout, limited to an offset/duration window. WAV is read with `hound`;
//! everything else goes through `symphonia`'s default probe and codecs.
//!
//! Decoding stops as soon as the requested window is complete, so the cost
//! of a load is bounded by `offset + duration` rather than by file length.

use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hound::{SampleFormat, WavReader};
use log::debug;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::engine::buffer::{AudioBuffer, ChannelLayout, MIX_SAMPLE_RATE};
use crate::error::{MixError, Result};

/// File extensions accepted as audio inputs
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "flac", "ogg"];

// ============================================================================
// Audio Source
// ============================================================================

/// Where a track or drum loop's bytes come from
#[derive(Debug, Clone)]
pub enum AudioSource {
    /// A file on disk
    File(PathBuf),
    /// An uploaded byte stream, with the container extension if known
    Memory {
        data: Arc<[u8]>,
        extension: Option<String>,
    },
}

impl AudioSource {
    /// Create a source from a file path
    pub fn file(path: impl Into<PathBuf>) -> Self {
        AudioSource::File(path.into())
    }

    /// Create a source from in-memory bytes
    pub fn memory(data: impl Into<Arc<[u8]>>, extension: Option<&str>) -> Self {
        AudioSource::Memory {
            data: data.into(),
            extension: extension.map(|e| e.to_ascii_lowercase()),
        }
    }

    /// Human-readable name for logs and errors
    pub fn display_name(&self) -> String {
        match self {
            AudioSource::File(path) => path.display().to_string(),
            AudioSource::Memory { data, extension } => format!(
                "<{} bytes{}>",
                data.len(),
                extension
                    .as_deref()
                    .map(|e| format!(" .{}", e))
                    .unwrap_or_default()
            ),
        }
    }

    /// Lowercase container extension, if known
    pub fn extension(&self) -> Option<String> {
        match self {
            AudioSource::File(path) => path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase()),
            AudioSource::Memory { extension, .. } => extension.clone(),
        }
    }

    fn is_wav(&self) -> bool {
        self.extension().as_deref() == Some("wav")
    }
}

/// Check whether a path has one of the supported audio extensions
pub fn is_audio_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| AUDIO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

// ============================================================================
// Load Options
// ============================================================================

/// Target format and time window for a load
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOptions {
    /// Output sample rate
    pub sample_rate: u32,
    /// Output channel layout
    pub layout: ChannelLayout,
    /// Seconds to skip from the start of the source
    pub offset_secs: f64,
    /// Maximum seconds to keep (None = to the end)
    pub duration_secs: Option<f64>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            sample_rate: MIX_SAMPLE_RATE,
            layout: ChannelLayout::Mono,
            offset_secs: 0.0,
            duration_secs: None,
        }
    }
}

impl LoadOptions {
    /// Load the whole source at the given rate and layout
    pub fn new(sample_rate: u32, layout: ChannelLayout) -> Self {
        Self {
            sample_rate,
            layout,
            ..Self::default()
        }
    }

    /// Restrict the load to `offset_secs .. offset_secs + duration_secs`
    ///
    /// A NaN offset reads from the start; an infinite or NaN duration reads to the end.
    pub fn with_window(mut self, offset_secs: f64, duration_secs: Option<f64>) -> Self {
        self.offset_secs = if offset_secs.is_nan() { 0.0 } else { offset_secs.max(0.0) };
        self.duration_secs = duration_secs
            .filter(|d| *d < f64::INFINITY)
            .map(|d| d.max(0.0));
        self
    }

    /// Frame range in a source at `rate`: (start, optional exclusive end)
    fn frame_bounds(&self, rate: u32) -> (usize, Option<usize>) {
        let start = secs_to_frames(self.offset_secs, rate);
        let end = self
            .duration_secs
            .map(|d| start.saturating_add(secs_to_frames(d, rate)));
        (start, end)
    }
}

/// Seconds to a frame count, saturating at `usize::MAX`
fn secs_to_frames(secs: f64, rate: u32) -> usize {
    // `as` saturates and maps NaN to 0
    (secs * rate as f64).round() as usize
}

/// Interleaved samples at the source's native rate
struct RawAudio {
    interleaved: Vec<f32>,
    channels: usize,
    sample_rate: u32,
}

// ============================================================================
// Loading
// ============================================================================

/// Load an audio source into the requested format and window
///
/// An offset at or beyond the end of the source yields an empty buffer.
///
/// # Errors
/// * `FileNotFound` - the source file does not exist
/// * `Decode` - the data cannot be parsed or decoded
/// * `UnsupportedFormat` - the container or sample format is not handled
pub fn load_audio(source: &AudioSource, options: &LoadOptions) -> Result<AudioBuffer> {
    if let AudioSource::File(path) = source {
        if !path.exists() {
            return Err(MixError::FileNotFound {
                path: path.display().to_string(),
            });
        }
    }

    let raw = if source.is_wav() {
        decode_wav(source, options)?
    } else {
        decode_with_symphonia(source, options)?
    };

    let buffer = AudioBuffer::from_interleaved(&raw.interleaved, raw.channels, raw.sample_rate)?;

    let mut buffer = if raw.sample_rate != options.sample_rate {
        resample(&buffer, options.sample_rate)
    } else {
        buffer
    };

    // Resampling may round up by a frame
    if let Some(duration) = options.duration_secs {
        let max_frames = secs_to_frames(duration, options.sample_rate);
        buffer.truncate_window(0, max_frames);
    }

    debug!(
        "Loaded {}: {:.2}s at {} Hz (offset {:.2}s)",
        source.display_name(),
        buffer.duration_secs(),
        options.sample_rate,
        options.offset_secs
    );

    Ok(buffer.into_layout(options.layout))
}

fn decode_wav(source: &AudioSource, options: &LoadOptions) -> Result<RawAudio> {
    match source {
        AudioSource::File(path) => {
            let reader = WavReader::open(path).map_err(|e| {
                MixError::decode(source.display_name(), format!("failed to open WAV: {}", e), e)
            })?;
            read_wav(reader, source, options)
        }
        AudioSource::Memory { data, .. } => {
            let reader = WavReader::new(Cursor::new(Arc::clone(data))).map_err(|e| {
                MixError::decode(source.display_name(), format!("failed to parse WAV: {}", e), e)
            })?;
            read_wav(reader, source, options)
        }
    }
}

fn read_wav<R>(mut reader: WavReader<R>, source: &AudioSource, options: &LoadOptions) -> Result<RawAudio>
where
    R: std::io::Read + std::io::Seek,
{
    let spec = reader.spec();
    let channels = spec.channels as usize;
    let total_frames = reader.duration() as usize;
    let (start, end) = options.frame_bounds(spec.sample_rate);

    if start >= total_frames {
        return Ok(RawAudio {
            interleaved: Vec::new(),
            channels,
            sample_rate: spec.sample_rate,
        });
    }

    reader.seek(start as u32).map_err(|e| {
        MixError::decode(source.display_name(), format!("failed to seek: {}", e), e)
    })?;

    let frames = end.unwrap_or(total_frames).min(total_frames).saturating_sub(start);
    let interleaved = read_samples_as_f32(
        &mut reader,
        spec.bits_per_sample,
        spec.sample_format,
        frames * channels,
        source,
    )?;

    Ok(RawAudio {
        interleaved,
        channels,
        sample_rate: spec.sample_rate,
    })
}

/// Read up to `limit` samples from a WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    reader: &mut WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
    limit: usize,
    source: &AudioSource,
) -> Result<Vec<f32>> {
    let to_error = |e: hound::Error| {
        MixError::decode(
            source.display_name(),
            format!("failed to read {}-bit samples: {}", bits_per_sample, e),
            e,
        )
    };

    match (sample_format, bits_per_sample) {
        (SampleFormat::Float, _) => reader
            .samples::<f32>()
            .take(limit)
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(to_error),
        (SampleFormat::Int, 8) => reader
            .samples::<i8>()
            .take(limit)
            .map(|s| s.map(|v| v as f32 / 128.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(to_error),
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .take(limit)
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(to_error),
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .take(limit)
            .map(|s| s.map(|v| v as f32 / 8388608.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(to_error),
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .take(limit)
            .map(|s| s.map(|v| v as f32 / 2147483648.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(to_error),
        (SampleFormat::Int, bits) => Err(MixError::UnsupportedFormat {
            format: format!("{}-bit integer audio", bits),
        }),
    }
}

fn decode_with_symphonia(source: &AudioSource, options: &LoadOptions) -> Result<RawAudio> {
    let name = source.display_name();
    let media: Box<dyn MediaSource> = match source {
        AudioSource::File(path) => Box::new(File::open(path)?),
        AudioSource::Memory { data, .. } => Box::new(Cursor::new(Arc::clone(data))),
    };
    let mss = MediaSourceStream::new(media, Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = source.extension() {
        hint.with_extension(&ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| MixError::decode(&name, format!("failed to probe format: {}", e), e))?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| MixError::UnsupportedFormat {
            format: format!("{} has no audio track", name),
        })?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| MixError::UnsupportedFormat {
            format: format!("{} has an unknown sample rate", name),
        })?;
    let mut channels = codec_params.channels.map(|c| c.count()).unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| MixError::decode(&name, format!("failed to create decoder: {}", e), e))?;

    let (start, end) = options.frame_bounds(sample_rate);
    let mut interleaved: Vec<f32> = Vec::new();
    let mut frames_seen = 0usize;
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        if end.is_some_and(|end| frames_seen >= end) {
            break;
        }

        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(MixError::decode(&name, format!("error reading packet: {}", e), e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            // Corrupt frames are skipped, as players do
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(MixError::decode(&name, format!("decode error: {}", e), e)),
        };

        let spec = *decoded.spec();
        channels = spec.channels.count();
        let buf = sample_buf.get_or_insert_with(|| SampleBuffer::new(decoded.capacity() as u64, spec));
        if (buf.capacity() as usize) < decoded.capacity() * channels {
            *buf = SampleBuffer::new(decoded.capacity() as u64, spec);
        }
        buf.copy_interleaved_ref(decoded);

        let packet_frames = buf.samples().len() / channels.max(1);
        let keep_from = start.saturating_sub(frames_seen).min(packet_frames);
        let keep_to = end
            .map(|end| end.saturating_sub(frames_seen).min(packet_frames))
            .unwrap_or(packet_frames);
        if keep_to > keep_from {
            interleaved.extend_from_slice(&buf.samples()[keep_from * channels..keep_to * channels]);
        }
        frames_seen += packet_frames;
    }

    if channels == 0 {
        channels = 1;
    }

    Ok(RawAudio {
        interleaved,
        channels,
        sample_rate,
    })
}

// ============================================================================
// Resampling
// ============================================================================

/// Resample every channel of a buffer to `target_rate`
pub fn resample(buffer: &AudioBuffer, target_rate: u32) -> AudioBuffer {
    if buffer.sample_rate == target_rate || buffer.sample_rate == 0 {
        return buffer.clone();
    }

    let ratio = target_rate as f64 / buffer.sample_rate as f64;
    AudioBuffer {
        samples: buffer
            .samples
            .iter()
            .map(|channel| resample_linear(channel, ratio))
            .collect(),
        sample_rate: target_rate,
    }
}

/// Linear interpolation resampling
fn resample_linear(samples: &[f32], ratio: f64) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }

    let source_len = samples.len();
    let target_len = ((source_len as f64) * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(target_len);

    for i in 0..target_len {
        let src_pos = i as f64 / ratio;
        let src_idx = src_pos.floor() as usize;
        let frac = (src_pos - src_idx as f64) as f32;

        let sample = if src_idx + 1 < source_len {
            samples[src_idx] * (1.0 - frac) + samples[src_idx + 1] * frac
        } else if src_idx < source_len {
            samples[src_idx]
        } else {
            0.0
        };

        output.push(sample);
    }

    output
}

// ============================================================================
// Tests
// ============================================================================
