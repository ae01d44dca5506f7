//! Device output through rodio.

use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};
use rodio::buffer::SamplesBuffer;
use rodio::cpal::traits::{DeviceTrait, HostTrait};
use rodio::{OutputStream, OutputStreamBuilder, Sink};

use crate::error::PreviewError;
use crate::settings::PreviewSettings;

use super::{DeviceSelector, OutputDevice, OutputSink, SinkConfig};

const QUEUE_POLL_MS: u64 = 1;

/// Names of the host's output devices, in [`DeviceSelector::Index`] order.
pub fn list_output_devices() -> Result<Vec<String>, PreviewError> {
    let host = rodio::cpal::default_host();
    let devices = host
        .output_devices()
        .map_err(|err| PreviewError::Device(err.to_string()))?;
    Ok(devices
        .enumerate()
        .map(|(index, device)| {
            device
                .name()
                .unwrap_or_else(|_| format!("output device {}", index + 1))
        })
        .collect())
}

fn output_device_at(index: usize) -> Result<rodio::cpal::Device, PreviewError> {
    let host = rodio::cpal::default_host();
    let mut devices = host
        .output_devices()
        .map_err(|err| PreviewError::Device(err.to_string()))?;
    devices
        .nth(index.saturating_sub(1))
        .ok_or_else(|| PreviewError::Device(format!("no output device at index {}", index)))
}

/// Opens streams on a system output device.
#[derive(Debug, Clone)]
pub struct RodioDevice {
    max_queued_blocks: usize,
}

impl Default for RodioDevice {
    fn default() -> Self {
        Self::from_settings(&PreviewSettings::default())
    }
}

impl RodioDevice {
    pub fn from_settings(settings: &PreviewSettings) -> Self {
        Self {
            max_queued_blocks: settings.max_queued_blocks.max(1),
        }
    }
}

impl OutputDevice for RodioDevice {
    fn open(&self, config: &SinkConfig) -> Result<Box<dyn OutputSink>, PreviewError> {
        let builder = match config.device {
            DeviceSelector::Default => OutputStreamBuilder::from_default_device(),
            DeviceSelector::Index(index) => {
                OutputStreamBuilder::from_device(output_device_at(index)?)
            }
        }
        .map_err(|err| PreviewError::Device(err.to_string()))?;

        let mut stream = builder
            .with_sample_rate(config.sample_rate)
            .with_channels(config.channels)
            .open_stream()
            .map_err(|err| PreviewError::Device(err.to_string()))?;
        stream.log_on_drop(false);

        let sink = Sink::connect_new(stream.mixer());
        sink.pause();
        info!(
            "opened output stream: {} Hz, {} channels, device {:?}",
            config.sample_rate, config.channels, config.device
        );

        Ok(Box::new(RodioSink {
            _stream: stream,
            sink,
            channels: config.channels as usize,
            sample_rate: config.sample_rate,
            max_queued_blocks: self.max_queued_blocks,
        }))
    }
}

struct RodioSink {
    _stream: OutputStream,
    sink: Sink,
    channels: usize,
    sample_rate: u32,
    max_queued_blocks: usize,
}

impl OutputSink for RodioSink {
    fn channels(&self) -> usize {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn start(&mut self) -> Result<(), PreviewError> {
        self.sink.play();
        Ok(())
    }

    fn write(&mut self, interleaved: &[i16], timeout: Duration) -> Result<usize, PreviewError> {
        let frames = interleaved.len() / self.channels;
        if frames == 0 {
            return Ok(0);
        }

        // Backpressure: hold the block until the queue has room.
        let deadline = Instant::now() + timeout;
        while self.sink.len() >= self.max_queued_blocks {
            if Instant::now() >= deadline {
                return Ok(0);
            }
            thread::sleep(Duration::from_millis(QUEUE_POLL_MS));
        }

        let samples: Vec<f32> = interleaved[..frames * self.channels]
            .iter()
            .map(|&sample| sample as f32 / 32_768.0)
            .collect();
        self.sink.append(SamplesBuffer::new(
            self.channels as u16,
            self.sample_rate,
            samples,
        ));
        Ok(frames)
    }

    fn drain(&mut self, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        while !self.sink.empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(QUEUE_POLL_MS * 5));
        }
    }

    fn stop(&mut self) {
        self.sink.stop();
    }

    fn close(&mut self) {
        self.sink.clear();
        debug!("closed output stream");
    }
}
