//! Output sinks: where rendered interleaved 16-bit blocks are written.
//!
//! A sink is created by an [`OutputDevice`] on the mixing thread and is
//! never shared, so implementations do not need to be `Send`.

mod memory;
mod rodio_out;
mod wav_file;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PreviewError;

pub use memory::{MemoryCapture, MemoryDevice};
pub use rodio_out::{list_output_devices, RodioDevice};
pub use wav_file::WavFileDevice;

/// Which physical output to open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceSelector {
    #[default]
    Default,
    /// 1-based position in [`list_output_devices`].
    Index(usize),
}

impl DeviceSelector {
    /// Map a numeric device id: values `<= 0` pick the default output.
    pub fn from_id(id: i32) -> Self {
        if id > 0 {
            Self::Index(id as usize)
        } else {
            Self::Default
        }
    }
}

/// Requested stream format. The sample format is always 16-bit integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub device: DeviceSelector,
}

/// An opened output stream accepting interleaved 16-bit frames.
pub trait OutputSink {
    /// Negotiated channel count.
    fn channels(&self) -> usize;

    fn sample_rate(&self) -> u32;

    fn start(&mut self) -> Result<(), PreviewError>;

    /// Write whole frames from `interleaved`, blocking for at most `timeout`.
    ///
    /// Returns the number of frames accepted, which may be fewer than
    /// offered (including zero on timeout).
    fn write(&mut self, interleaved: &[i16], timeout: Duration) -> Result<usize, PreviewError>;

    /// Wait for queued audio to finish playing, for at most `timeout`.
    fn drain(&mut self, _timeout: Duration) {}

    fn stop(&mut self);

    fn close(&mut self);
}

/// Factory for output sinks.
pub trait OutputDevice: Send + Sync {
    fn open(&self, config: &SinkConfig) -> Result<Box<dyn OutputSink>, PreviewError>;
}
