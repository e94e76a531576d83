//! Error handling for SmartMix
//!
//! Per-track errors (`Decode`, `AnalysisFailure`, `EmptySelection`) are
//! isolated by the orchestrator; only `NoTracksProduced` ends a mix run.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for SmartMix operations
pub type Result<T> = std::result::Result<T, MixError>;

/// Main error type for SmartMix operations
#[derive(Error, Debug)]
pub enum MixError {
    // Source Errors
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Could not decode '{source_name}': {reason}")]
    Decode {
        source_name: String,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    // Analysis / Selection Errors
    #[error("Analysis inconclusive: {reason}")]
    AnalysisFailure { reason: String },

    #[error("Selection for '{track}' is empty (start {start_secs:.2}s, duration {duration_secs:.2}s)")]
    EmptySelection {
        track: String,
        start_secs: f64,
        duration_secs: f64,
    },

    // Export Errors
    #[error("Export failed: {reason} (PCM written to {})", pcm_path.display())]
    ExportFailure { reason: String, pcm_path: PathBuf },

    // Mix Errors
    #[error("No track produced any audio ({attempted} attempted)")]
    NoTracksProduced { attempted: usize },

    // Session Errors
    #[error("Unknown track: {id}")]
    UnknownTrack { id: String },

    #[error("Unknown drum loop: {name}")]
    UnknownDrum { name: String },

    #[error("Invalid track order: {reason}")]
    InvalidOrder { reason: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MixError {
    /// Build a `Decode` error from any decoder error
    pub fn decode<E>(source_name: impl Into<String>, reason: impl Into<String>, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        MixError::Decode {
            source_name: source_name.into(),
            reason: reason.into(),
            source: Some(Box::new(err)),
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            MixError::FileNotFound { .. } => "FILE_NOT_FOUND",
            MixError::Decode { .. } => "DECODE_ERROR",
            MixError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            MixError::AnalysisFailure { .. } => "ANALYSIS_FAILURE",
            MixError::EmptySelection { .. } => "EMPTY_SELECTION",
            MixError::ExportFailure { .. } => "EXPORT_FAILURE",
            MixError::NoTracksProduced { .. } => "NO_TRACKS_PRODUCED",
            MixError::UnknownTrack { .. } => "UNKNOWN_TRACK",
            MixError::UnknownDrum { .. } => "UNKNOWN_DRUM",
            MixError::InvalidOrder { .. } => "INVALID_ORDER",
            MixError::InvalidConfig { .. } => "INVALID_CONFIG",
            MixError::Io(_) => "IO_ERROR",
            MixError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error only affects a single track
    ///
    /// Recoverable errors are reported per track and the mix continues.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MixError::FileNotFound { .. }
                | MixError::Decode { .. }
                | MixError::UnsupportedFormat { .. }
                | MixError::AnalysisFailure { .. }
                | MixError::EmptySelection { .. }
                | MixError::UnknownDrum { .. }
        )
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            MixError::FileNotFound { .. } => vec![
                "Check the file path is correct",
                "Verify the file hasn't been moved or deleted",
            ],
            MixError::Decode { .. } | MixError::UnsupportedFormat { .. } => vec![
                "Check if the file plays in another application",
                "Try converting the file to WAV or MP3 first",
            ],
            MixError::AnalysisFailure { .. } => vec![
                "Set the start and duration for this track manually",
            ],
            MixError::EmptySelection { .. } => vec![
                "The start offset is past the end of the track",
                "Lower the start offset or clear the override",
            ],
            MixError::ExportFailure { .. } => vec![
                "The WAV master was still written",
                "Check that ffmpeg is installed and on PATH",
                "Export as WAV instead",
            ],
            MixError::NoTracksProduced { .. } => vec![
                "Check the per-track errors above",
                "Make sure at least one input is a readable audio file",
            ],
            MixError::InvalidConfig { .. } => {
                vec!["Run 'smartmix-cli config' to print a valid default configuration"]
            }
            _ => vec![],
        }
    }
}
