//! # Trackmix
//!
//! Preview one or many raw PCM tracks through an output device with
//! per-track routing, gain and panning, live seeking and a bus
//! volume/pan stage, plus an offline tempo (BPM) estimator used to help
//! align tracks.

pub mod error;
pub mod pcm;
pub mod playback;
pub mod settings;
pub mod sink;
pub mod tempo;

pub use error::PreviewError;
pub use playback::{OutputRouting, Previewer, TrackSpec};
pub use settings::{PreviewSettings, SessionConfig};
pub use tempo::{detect_tempo, TempoEstimate};

#[cfg(test)]
pub(crate) mod test_support;
