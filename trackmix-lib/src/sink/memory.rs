//! In-memory sink used for headless runs and engine tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::PreviewError;

use super::{OutputDevice, OutputSink, SinkConfig};

/// Everything written to a [`MemoryDevice`] sink.
#[derive(Debug, Default, Clone)]
pub struct MemoryCapture {
    pub config: Option<SinkConfig>,
    pub channels: usize,
    pub samples: Vec<i16>,
    pub writes: usize,
    pub started: bool,
    pub stopped: bool,
    pub closed: bool,
}

impl MemoryCapture {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }

    /// Samples of output channel `channel`, one per frame.
    pub fn channel(&self, channel: usize) -> Vec<i16> {
        self.samples
            .chunks_exact(self.channels.max(1))
            .map(|frame| frame[channel])
            .collect()
    }
}

/// Device whose sinks append every written frame to a shared capture.
///
/// Faults can be injected to exercise the mixer's write-retry policy.
#[derive(Debug, Clone, Default)]
pub struct MemoryDevice {
    capture: Arc<Mutex<MemoryCapture>>,
    channels_override: Option<u16>,
    max_frames_per_write: Option<usize>,
    failing_writes: usize,
    fail_open: bool,
    fail_start: bool,
    write_delay: Option<Duration>,
}

impl MemoryDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capture(&self) -> Arc<Mutex<MemoryCapture>> {
        self.capture.clone()
    }

    /// Report `channels` instead of the requested count.
    pub fn with_channels(mut self, channels: u16) -> Self {
        self.channels_override = Some(channels);
        self
    }

    /// Accept at most `frames` per write call, forcing short writes.
    pub fn with_max_frames_per_write(mut self, frames: usize) -> Self {
        self.max_frames_per_write = Some(frames.max(1));
        self
    }

    /// Fail the first `count` write calls.
    pub fn with_failing_writes(mut self, count: usize) -> Self {
        self.failing_writes = count;
        self
    }

    pub fn with_open_failure(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn with_start_failure(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Sleep for `delay` in every write, pacing the mixer like a device.
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }
}

impl OutputDevice for MemoryDevice {
    fn open(&self, config: &SinkConfig) -> Result<Box<dyn OutputSink>, PreviewError> {
        if self.fail_open {
            return Err(PreviewError::Device("memory device refused to open".to_string()));
        }
        let channels = self.channels_override.unwrap_or(config.channels) as usize;
        {
            let mut capture = self.capture.lock().unwrap();
            *capture = MemoryCapture {
                config: Some(*config),
                channels,
                ..MemoryCapture::default()
            };
        }
        Ok(Box::new(MemorySink {
            capture: self.capture.clone(),
            channels,
            sample_rate: config.sample_rate,
            max_frames_per_write: self.max_frames_per_write,
            failing_writes: self.failing_writes,
            fail_start: self.fail_start,
            write_delay: self.write_delay,
        }))
    }
}

struct MemorySink {
    capture: Arc<Mutex<MemoryCapture>>,
    channels: usize,
    sample_rate: u32,
    max_frames_per_write: Option<usize>,
    failing_writes: usize,
    fail_start: bool,
    write_delay: Option<Duration>,
}

impl OutputSink for MemorySink {
    fn channels(&self) -> usize {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn start(&mut self) -> Result<(), PreviewError> {
        if self.fail_start {
            return Err(PreviewError::Device("memory device refused to start".to_string()));
        }
        self.capture.lock().unwrap().started = true;
        Ok(())
    }

    fn write(&mut self, interleaved: &[i16], _timeout: Duration) -> Result<usize, PreviewError> {
        if let Some(delay) = self.write_delay {
            std::thread::sleep(delay);
        }
        let mut capture = self.capture.lock().unwrap();
        capture.writes += 1;
        if self.failing_writes > 0 {
            self.failing_writes -= 1;
            return Err(PreviewError::Device("injected write failure".to_string()));
        }
        let offered = interleaved.len() / self.channels;
        let frames = self
            .max_frames_per_write
            .map_or(offered, |max| max.min(offered));
        capture
            .samples
            .extend_from_slice(&interleaved[..frames * self.channels]);
        Ok(frames)
    }

    fn stop(&mut self) {
        self.capture.lock().unwrap().stopped = true;
    }

    fn close(&mut self) {
        self.capture.lock().unwrap().closed = true;
    }
}
