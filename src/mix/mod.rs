//! Mix assembly
//!
//! Track registration, start-point selection and the orchestrator that
//! turns an ordered track list into one mixed buffer.

pub mod config;
pub mod orchestrator;
pub mod selector;
pub mod session;
pub mod track;

pub use config::{FailurePolicy, MixConfig, MixOrder};
pub use orchestrator::{generate_mix, order_tracks, IncludedTrack, MixOutput, MixReport, TrackFailure};
pub use selector::{
    duration_for_tempo, select, Selection, SelectionOrigin, StartPolicy, FALLBACK_DURATION_SECS,
};
pub use session::MixSession;
pub use track::{analyze_tracks, DrumId, DrumLibrary, DrumLoop, Track, TrackId, TrackOverride};
