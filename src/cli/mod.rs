//! CLI Module
//!
//! Command-line front end for building mixes from audio files.

pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::engine::export::ExportFormat;
use crate::mix::config::MixOrder;

/// SmartMix - automated DJ-style mix assembly
#[derive(Parser, Debug)]
#[command(name = "smartmix")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Output format flag
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatArg {
    Wav,
    Mp3,
}

impl From<FormatArg> for ExportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Wav => ExportFormat::Wav,
            FormatArg::Mp3 => ExportFormat::Mp3,
        }
    }
}

/// Track order flag
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderArg {
    /// Order of the inputs on the command line
    Given,
    /// Slowest track first
    Bpm,
}

impl From<OrderArg> for MixOrder {
    fn from(arg: OrderArg) -> Self {
        match arg {
            OrderArg::Given => MixOrder::AsGiven,
            OrderArg::Bpm => MixOrder::AscendingBpm,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze tracks and print tempo and suggested start points
    #[command(name = "analyze")]
    Analyze {
        /// Audio files or directories
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print the analysis as JSON
        #[arg(long)]
        json: bool,
    },

    /// Analyze tracks and render the mix
    #[command(name = "mix")]
    Mix {
        /// Audio files or directories
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output file (extension follows the format)
        #[arg(short, long, default_value = "mix.wav")]
        output: PathBuf,

        /// Drum loop files or directories
        #[arg(long = "drums")]
        drums: Vec<PathBuf>,

        /// Assign a drum loop to a track: TRACK=DRUM (file names)
        #[arg(long = "drum-for", value_name = "TRACK=DRUM")]
        drum_for: Vec<String>,

        /// Give every track the drum loop closest in tempo
        #[arg(long)]
        auto_drums: bool,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<FormatArg>,

        /// Crossfade length in seconds
        #[arg(long)]
        crossfade: Option<f64>,

        /// Segment length in seconds for every track
        #[arg(short, long)]
        duration: Option<f64>,

        /// Track order
        #[arg(long, value_enum)]
        order: Option<OrderArg>,

        /// Retry tracks whose selection is empty from the start
        #[arg(long)]
        retry_from_start: bool,

        /// Write the mix report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Print the configuration as JSON
    #[command(name = "config")]
    Config {
        /// Configuration file to validate and print (defaults when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}
