//! Audio Engine Module
//!
//! Buffers, loading, synthetic signals and export:
//! - Audio buffer management and level measurement
//! - Windowed decoding at a target rate/layout
//! - PCM export and external transcoding

pub mod buffer;
pub mod export;
pub mod io;
pub mod signal;

pub use buffer::{AudioBuffer, ChannelLayout, ANALYSIS_SAMPLE_RATE, MIX_SAMPLE_RATE};
pub use export::{
    export_mix, sanitize_file_name, write_pcm, ExportFormat, ExportReport, ExportSettings,
    Transcoder,
};
pub use io::{is_audio_path, load_audio, resample, AudioSource, LoadOptions};
