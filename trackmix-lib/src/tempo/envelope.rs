//! Loudness envelope extraction and smoothing.

use dasp_ring_buffer::Bounded;

use crate::pcm::{is_normalizable, normalized_sample, PcmSource};

use super::error::TempoError;

/// Envelope sample rate the decimation aims for.
pub const TARGET_ENVELOPE_RATE: u32 = 200;
/// Length of the causal moving average applied to the envelope.
pub const SMOOTHING_WINDOW_SECONDS: f64 = 0.05;
/// Shortest input accepted.
pub const MIN_AUDIO_SECONDS: f64 = 1.0;
/// Shortest envelope the lag search runs on.
pub const MIN_ENVELOPE_SECONDS: f64 = 3.0;

const READ_FRAMES: usize = 4096;

/// Downsampled mean absolute amplitude of a signal.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub values: Vec<f32>,
    /// Envelope samples per second.
    pub rate: f64,
}

impl Envelope {
    pub fn duration_seconds(&self) -> f64 {
        if self.rate > 0.0 {
            self.values.len() as f64 / self.rate
        } else {
            0.0
        }
    }

    /// Moving-average window, in envelope samples.
    pub fn smoothing_window(&self) -> usize {
        ((SMOOTHING_WINDOW_SECONDS * self.rate).round() as usize).max(1)
    }
}

/// Read `source` from its current position to the end and reduce it to an
/// envelope at roughly [`TARGET_ENVELOPE_RATE`].
///
/// Each frame is averaged across channels, rectified, and every
/// `decimation` frames the mean is emitted. A trailing partial group is
/// dropped.
pub fn build_envelope(source: &mut PcmSource) -> Result<Envelope, TempoError> {
    let info = *source.info();
    if !is_normalizable(info.encoding, info.bits_per_sample) {
        return Err(TempoError::UnsupportedEncoding {
            encoding: info.encoding,
            bits_per_sample: info.bits_per_sample,
        });
    }

    let seconds = info.duration_seconds();
    if seconds < MIN_AUDIO_SECONDS {
        return Err(TempoError::TooShort {
            seconds,
            required: MIN_AUDIO_SECONDS,
        });
    }

    let decimation = (info.sample_rate / TARGET_ENVELOPE_RATE).max(1) as usize;
    let rate = info.sample_rate as f64 / decimation as f64;
    let channels = info.channels as usize;
    let sample_bytes = info.bytes_per_sample();
    let frame_bytes = info.frame_bytes();

    let mut values = Vec::with_capacity((info.total_frames() as usize / decimation) + 1);
    let mut buffer = vec![0u8; READ_FRAMES * frame_bytes];
    let mut sum = 0.0f64;
    let mut count = 0usize;

    loop {
        let bytes = source.read_bytes(&mut buffer)?;
        if bytes == 0 {
            break;
        }
        for frame in buffer[..bytes].chunks_exact(frame_bytes) {
            let mono: f32 = frame
                .chunks_exact(sample_bytes)
                .filter_map(|sample| normalized_sample(sample, info.encoding, info.bits_per_sample))
                .sum::<f32>()
                / channels as f32;
            sum += mono.abs() as f64;
            count += 1;
            if count == decimation {
                values.push((sum / decimation as f64) as f32);
                sum = 0.0;
                count = 0;
            }
        }
    }

    let envelope = Envelope { values, rate };
    let span = envelope.duration_seconds();
    if span < MIN_ENVELOPE_SECONDS {
        return Err(TempoError::TooShort {
            seconds: span,
            required: MIN_ENVELOPE_SECONDS,
        });
    }
    Ok(envelope)
}

/// Causal moving average over `window` samples. The first `window - 1`
/// outputs average over the samples seen so far.
pub fn smooth(values: &[f32], window: usize) -> Vec<f32> {
    let window = window.max(1);
    let mut ring = Bounded::from(vec![0.0f32; window]);
    let mut sum = 0.0f64;

    values
        .iter()
        .map(|&value| {
            if let Some(evicted) = ring.push(value) {
                sum -= evicted as f64;
            }
            sum += value as f64;
            (sum / ring.len() as f64) as f32
        })
        .collect()
}
