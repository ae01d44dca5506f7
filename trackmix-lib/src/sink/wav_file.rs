//! Offline rendering of a preview mix into a 16-bit WAV file.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Duration;

use hound::{SampleFormat, WavSpec, WavWriter};
use log::{error, info};

use crate::error::PreviewError;

use super::{OutputDevice, OutputSink, SinkConfig};

/// Device that "plays" into a WAV file as fast as the mixer renders.
#[derive(Debug, Clone)]
pub struct WavFileDevice {
    path: PathBuf,
}

impl WavFileDevice {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl OutputDevice for WavFileDevice {
    fn open(&self, config: &SinkConfig) -> Result<Box<dyn OutputSink>, PreviewError> {
        let spec = WavSpec {
            channels: config.channels,
            sample_rate: config.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let writer = WavWriter::create(&self.path, spec)?;
        Ok(Box::new(WavFileSink {
            path: self.path.clone(),
            writer: Some(writer),
            channels: config.channels as usize,
            sample_rate: config.sample_rate,
        }))
    }
}

struct WavFileSink {
    path: PathBuf,
    writer: Option<WavWriter<BufWriter<File>>>,
    channels: usize,
    sample_rate: u32,
}

impl OutputSink for WavFileSink {
    fn channels(&self) -> usize {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn start(&mut self) -> Result<(), PreviewError> {
        Ok(())
    }

    fn write(&mut self, interleaved: &[i16], _timeout: Duration) -> Result<usize, PreviewError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| PreviewError::Device("render file already closed".to_string()))?;
        let frames = interleaved.len() / self.channels;
        for &sample in &interleaved[..frames * self.channels] {
            writer.write_sample(sample)?;
        }
        Ok(frames)
    }

    fn stop(&mut self) {}

    fn close(&mut self) {
        if let Some(writer) = self.writer.take() {
            match writer.finalize() {
                Ok(()) => info!("rendered mix to {}", self.path.display()),
                Err(err) => error!("failed to finalize {}: {}", self.path.display(), err),
            }
        }
    }
}
