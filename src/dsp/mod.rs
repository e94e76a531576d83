//! Mix DSP
//!
//! Loudness normalization, crossfade curves and the segment stitcher that
//! joins normalized tracks into one output buffer.

pub mod fade;
pub mod normalize;
pub mod stitch;

pub use fade::FadeCurve;
pub use normalize::{Normalization, DEFAULT_PEAK_TARGET, DEFAULT_RMS_TARGET};
pub use stitch::{
    crossfade_join, crossfade_region, overlay_drum, stitch, ClipRange, DrumGlueConfig, Seam, SeamKind,
    StitchConfig, Stitcher,
};
