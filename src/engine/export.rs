//! Mix export
//!
//! Writes the finished buffer as a PCM WAV container and, for lossy
//! formats, hands the WAV to an external transcoder process. The
//! transcoder is always invoked with a structured argument list.

use std::ffi::OsString;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Command;

use hound::{SampleFormat, WavSpec, WavWriter};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::engine::buffer::AudioBuffer;
use crate::error::{MixError, Result};

/// Default bitrate for lossy export (kbps)
pub const DEFAULT_BITRATE_KBPS: u32 = 320;

/// Default PCM bit depth
pub const DEFAULT_BIT_DEPTH: u16 = 24;

// ============================================================================
// Export Settings
// ============================================================================

/// Output container for the finished mix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// PCM WAV, written directly
    #[default]
    Wav,
    /// MP3, produced by the external transcoder from a PCM WAV
    Mp3,
}

impl ExportFormat {
    /// File extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Wav => "wav",
            ExportFormat::Mp3 => "mp3",
        }
    }
}

/// Export configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Output container
    pub format: ExportFormat,
    /// PCM bit depth: 16, 24, or 32 (float)
    pub bit_depth: u16,
    /// Lossy bitrate in kbps
    pub bitrate_kbps: u32,
    /// Transcoder executable
    pub transcoder: PathBuf,
    /// Keep the intermediate WAV after a successful lossy export
    pub keep_pcm: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            format: ExportFormat::Wav,
            bit_depth: DEFAULT_BIT_DEPTH,
            bitrate_kbps: DEFAULT_BITRATE_KBPS,
            transcoder: PathBuf::from("ffmpeg"),
            keep_pcm: false,
        }
    }
}

/// What an export wrote
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    /// Final output file
    pub output_path: PathBuf,
    /// Intermediate WAV, if it was kept
    pub pcm_path: Option<PathBuf>,
    /// SHA-256 of the output file
    pub sha256: String,
    /// Size of the output file in bytes
    pub bytes: u64,
}

// ============================================================================
// PCM Writing
// ============================================================================

/// Write a buffer to a WAV file at the buffer's sample rate
///
/// Samples are clamped to [-1, 1] before integer conversion.
///
/// # Errors
/// `UnsupportedFormat` for bit depths other than 16, 24, or 32.
pub fn write_pcm(buffer: &AudioBuffer, path: &Path, bit_depth: u16) -> Result<()> {
    let spec = WavSpec {
        channels: buffer.channels().max(1) as u16,
        sample_rate: buffer.sample_rate,
        bits_per_sample: bit_depth,
        sample_format: if bit_depth == 32 {
            SampleFormat::Float
        } else {
            SampleFormat::Int
        },
    };

    if !matches!(bit_depth, 16 | 24 | 32) {
        return Err(MixError::UnsupportedFormat {
            format: format!("{}-bit audio (only 16, 24, 32 supported)", bit_depth),
        });
    }

    let mut writer = WavWriter::create(path, spec).map_err(hound_to_io)?;

    for sample in buffer.to_interleaved() {
        let sample = sample.clamp(-1.0, 1.0);
        let written = match bit_depth {
            16 => writer.write_sample((sample * 32767.0) as i16),
            // 24-bit stored as i32 in hound
            24 => writer.write_sample((sample * 8388607.0) as i32),
            _ => writer.write_sample(sample),
        };
        written.map_err(hound_to_io)?;
    }

    writer.finalize().map_err(hound_to_io)?;
    Ok(())
}

fn hound_to_io(e: hound::Error) -> MixError {
    match e {
        hound::Error::IoError(io) => MixError::Io(io),
        other => MixError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            other.to_string(),
        )),
    }
}

// ============================================================================
// Transcoding
// ============================================================================

/// External transcoder process (ffmpeg-compatible command line)
#[derive(Debug, Clone)]
pub struct Transcoder {
    program: PathBuf,
}

impl Transcoder {
    /// Create a transcoder that runs `program`
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Build the argument list for one transcode
    ///
    /// Paths are passed through unchanged, including non-UTF-8 names.
    pub fn arguments(pcm_path: &Path, bitrate_kbps: u32, out_path: &Path) -> Vec<OsString> {
        vec![
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-y".into(),
            "-i".into(),
            pcm_path.as_os_str().to_os_string(),
            "-b:a".into(),
            format!("{}k", bitrate_kbps).into(),
            out_path.as_os_str().to_os_string(),
        ]
    }

    /// Transcode `pcm_path` into `out_path`
    ///
    /// # Errors
    /// `ExportFailure` if the process cannot be started or exits non-zero.
    pub fn transcode(&self, pcm_path: &Path, bitrate_kbps: u32, out_path: &Path) -> Result<()> {
        let status = Command::new(&self.program)
            .args(Self::arguments(pcm_path, bitrate_kbps, out_path))
            .status()
            .map_err(|e| MixError::ExportFailure {
                reason: format!("could not start {}: {}", self.program.display(), e),
                pcm_path: pcm_path.to_path_buf(),
            })?;

        if !status.success() {
            return Err(MixError::ExportFailure {
                reason: format!("{} exited with {}", self.program.display(), status),
                pcm_path: pcm_path.to_path_buf(),
            });
        }

        Ok(())
    }
}

// ============================================================================
// Export
// ============================================================================

/// Export the finished mix to `out_path`
///
/// The output extension is forced to match the format. For lossy formats
/// the PCM master is written next to it first; if the transcoder fails the
/// PCM file is left in place and reported in the `ExportFailure`.
pub fn export_mix(buffer: &AudioBuffer, settings: &ExportSettings, out_path: &Path) -> Result<ExportReport> {
    let output_path = out_path.with_extension(settings.format.extension());

    match settings.format {
        ExportFormat::Wav => {
            write_pcm(buffer, &output_path, settings.bit_depth)?;
            info!("Wrote {}", output_path.display());
            report_for(output_path, None)
        }
        ExportFormat::Mp3 => {
            let pcm_path = pcm_path_for(&output_path);
            write_pcm(buffer, &pcm_path, settings.bit_depth)?;

            Transcoder::new(&settings.transcoder).transcode(
                &pcm_path,
                settings.bitrate_kbps,
                &output_path,
            )?;
            info!("Transcoded {} -> {}", pcm_path.display(), output_path.display());

            let kept = if settings.keep_pcm {
                Some(pcm_path)
            } else {
                if let Err(e) = fs::remove_file(&pcm_path) {
                    warn!("Could not remove {}: {}", pcm_path.display(), e);
                }
                None
            };
            report_for(output_path, kept)
        }
    }
}

fn pcm_path_for(output_path: &Path) -> PathBuf {
    let stem = output_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("mix");
    output_path.with_file_name(format!("{}.master.wav", stem))
}

fn report_for(output_path: PathBuf, pcm_path: Option<PathBuf>) -> Result<ExportReport> {
    let bytes = fs::metadata(&output_path)?.len();
    let sha256 = file_sha256(&output_path)?;
    Ok(ExportReport {
        output_path,
        pcm_path,
        sha256,
        bytes,
    })
}

/// Calculate the SHA-256 checksum of a file
pub fn file_sha256(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Make a user-supplied name safe to use as a generated file name
///
/// Keeps ASCII alphanumerics, `-`, `_` and `.`; everything else becomes
/// `_`. Leading `-` and `.` are stripped so the name can never be read as
/// an option or a hidden/relative path component.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = cleaned.trim_start_matches(['-', '.']);
    if trimmed.is_empty() {
        "mix".to_string()
    } else {
        trimmed.to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================
