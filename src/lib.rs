//! SmartMix - Automated DJ-Style Mix Assembly
//!
//! SmartMix turns a collection of independent tracks into one continuous
//! mix: it estimates each track's tempo, picks a start point, trims the
//! track to a tempo-dependent length, evens out loudness and joins the
//! segments with crossfades or drum-loop transitions.
//!
//! # Architecture
//!
//! - `engine`: decoding, sample buffers and export/transcode
//! - `analysis`: tempo, beat grid, voice onset and drop detection
//! - `dsp`: loudness normalization, fade curves and the segment stitcher
//! - `mix`: track registration, start-point selection and orchestration
//!
//! # Example
//! ```no_run
//! use smartmix::engine::AudioSource;
//! use smartmix::mix::{MixConfig, MixSession};
//!
//! let config = MixConfig::default();
//! let mut session = MixSession::new();
//! session.add_track("intro", AudioSource::file("intro.wav"));
//! session.add_track("peak", AudioSource::file("peak.mp3"));
//! session.analyze(&config);
//!
//! let mix = session.generate(&config)?;
//! println!("{:.1}s from {} tracks", mix.report.duration_secs, mix.report.included.len());
//! # Ok::<(), smartmix::MixError>(())
//! ```

pub mod analysis;
pub mod cli;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod mix;

pub use error::{MixError, Result};
