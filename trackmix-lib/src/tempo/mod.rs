//! Offline tempo (BPM) estimation from a WAV file.
//!
//! The signal is reduced to a ~200 Hz loudness envelope, smoothed with a
//! 50 ms moving average, and searched for the autocorrelation peak
//! between 60 and 200 BPM.

mod autocorr;
mod envelope;
mod error;

use std::path::Path;

use log::debug;
use serde::Serialize;

use crate::pcm::PcmSource;

pub use autocorr::{confidence, lag_bounds, search_lags, LagSearch, MAX_BPM, MIN_BPM};
pub use envelope::{build_envelope, smooth, Envelope};
pub use error::TempoError;

/// Tempo in beats per minute and a relative confidence in `[0.2, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TempoEstimate {
    pub bpm: f64,
    pub confidence: f64,
}

impl TempoEstimate {
    /// Reported whenever estimation is not possible.
    pub const FALLBACK: TempoEstimate = TempoEstimate {
        bpm: 120.0,
        confidence: 0.2,
    };

    pub fn is_fallback(&self) -> bool {
        *self == Self::FALLBACK
    }
}

impl Default for TempoEstimate {
    fn default() -> Self {
        Self::FALLBACK
    }
}

/// Estimate the tempo of `path`, falling back to
/// [`TempoEstimate::FALLBACK`] on any failure.
pub fn detect_tempo(path: impl AsRef<Path>) -> TempoEstimate {
    let path = path.as_ref();
    match estimate_tempo(path) {
        Ok(estimate) => estimate,
        Err(err) => {
            debug!("tempo fallback for {}: {}", path.display(), err);
            TempoEstimate::FALLBACK
        }
    }
}

pub fn estimate_tempo(path: impl AsRef<Path>) -> Result<TempoEstimate, TempoError> {
    let mut source = PcmSource::open(path)?;
    estimate_tempo_from_source(&mut source)
}

/// Consume `source` from its current position.
pub fn estimate_tempo_from_source(source: &mut PcmSource) -> Result<TempoEstimate, TempoError> {
    let envelope = build_envelope(source)?;
    estimate_from_envelope(&envelope)
}

/// Smooth `envelope` and pick the strongest lag in the tempo range.
pub fn estimate_from_envelope(envelope: &Envelope) -> Result<TempoEstimate, TempoError> {
    let smoothed = smooth(&envelope.values, envelope.smoothing_window());
    let (min_lag, max_lag) = lag_bounds(envelope.rate);
    let search = search_lags(&smoothed, min_lag, max_lag);
    if !search.has_variance {
        return Err(TempoError::Silent);
    }

    let estimate = TempoEstimate {
        bpm: 60.0 * envelope.rate / search.best_lag as f64,
        confidence: confidence(&search),
    };
    debug!(
        "tempo: lag {} of [{}, {}] at {:.2} Hz, corr {:.3} (mean {:.3}) -> {:.2} bpm",
        search.best_lag,
        min_lag,
        max_lag,
        envelope.rate,
        search.best_correlation,
        search.mean_correlation,
        estimate.bpm
    );
    Ok(estimate)
}
