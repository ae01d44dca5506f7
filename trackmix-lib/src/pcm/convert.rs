//! Sample decoding helpers for little-endian WAV payloads.

use super::header::SampleEncoding;

fn convert_signed_16bit_to_f32(sample: i16) -> f32 {
    sample as f32 / 2f32.powi(15)
}

fn convert_signed_24bit_to_f32(sample: i32) -> f32 {
    let shifted_sample = sample << 8 >> 8;
    shifted_sample as f32 / 2f32.powi(23)
}

/// Decode interleaved 16-bit samples from `bytes` into `out`.
///
/// Returns the number of samples written, bounded by both buffers.
pub fn decode_i16_into(bytes: &[u8], out: &mut [i16]) -> usize {
    let count = (bytes.len() / 2).min(out.len());
    for (sample, pair) in out.iter_mut().zip(bytes.chunks_exact(2)).take(count) {
        *sample = i16::from_le_bytes([pair[0], pair[1]]);
    }
    count
}

/// Convert one encoded sample to a value scaled to roughly `[-1, 1]`.
///
/// Returns `None` for layouts other than 16/24-bit integer PCM and 32-bit float.
pub fn normalized_sample(
    bytes: &[u8],
    encoding: SampleEncoding,
    bits_per_sample: u16,
) -> Option<f32> {
    match (encoding, bits_per_sample) {
        (SampleEncoding::Pcm, 16) if bytes.len() >= 2 => Some(convert_signed_16bit_to_f32(
            i16::from_le_bytes([bytes[0], bytes[1]]),
        )),
        (SampleEncoding::Pcm, 24) if bytes.len() >= 3 => {
            let raw = (bytes[0] as i32) | ((bytes[1] as i32) << 8) | ((bytes[2] as i32) << 16);
            Some(convert_signed_24bit_to_f32(raw))
        }
        (SampleEncoding::Float, 32) if bytes.len() >= 4 => {
            let value = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            Some(if value.is_finite() { value } else { 0.0 })
        }
        _ => None,
    }
}

/// True when [`normalized_sample`] can decode this layout.
pub fn is_normalizable(encoding: SampleEncoding, bits_per_sample: u16) -> bool {
    matches!(
        (encoding, bits_per_sample),
        (SampleEncoding::Pcm, 16) | (SampleEncoding::Pcm, 24) | (SampleEncoding::Float, 32)
    )
}
