//! WAV fixture writers shared by unit tests.

use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

pub(crate) fn write_pcm16(path: &Path, channels: u16, sample_rate: u32, samples: &[i16]) {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).expect("create wav");
    for &sample in samples {
        writer.write_sample(sample).expect("write sample");
    }
    writer.finalize().expect("finalize wav");
}

pub(crate) fn write_pcm24(path: &Path, channels: u16, sample_rate: u32, samples: &[i32]) {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 24,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).expect("create wav");
    for &sample in samples {
        writer.write_sample(sample).expect("write sample");
    }
    writer.finalize().expect("finalize wav");
}

pub(crate) fn write_float(path: &Path, channels: u16, sample_rate: u32, samples: &[f32]) {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(path, spec).expect("create wav");
    for &sample in samples {
        writer.write_sample(sample).expect("write sample");
    }
    writer.finalize().expect("finalize wav");
}

/// Mono click track: a decaying 10 ms burst at every beat, silence between.
pub(crate) fn click_track(sample_rate: u32, bpm: f64, seconds: f64, amplitude: f32) -> Vec<f32> {
    let total = (sample_rate as f64 * seconds) as usize;
    let period = (sample_rate as f64 * 60.0 / bpm) as usize;
    let burst = (sample_rate as usize / 100).max(1);
    (0..total)
        .map(|i| {
            let offset = i % period;
            if offset < burst {
                let decay = 1.0 - offset as f32 / burst as f32;
                let phase =
                    offset as f32 * 2.0 * std::f32::consts::PI * 1_000.0 / sample_rate as f32;
                amplitude * decay * phase.sin().signum()
            } else {
                0.0
            }
        })
        .collect()
}
