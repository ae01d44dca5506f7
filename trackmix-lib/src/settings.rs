//! Runtime tuning and JSON session descriptions.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PreviewError;
use crate::playback::{BusParams, OutputRequest, TrackSpec};
use crate::sink::DeviceSelector;

const DEFAULT_BLOCK_BYTES: usize = 4096;
const DEFAULT_WRITE_TIMEOUT_MS: u64 = 1_000;
const DEFAULT_JOIN_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_OPEN_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_MAX_QUEUED_BLOCKS: usize = 4;

/// Engine tuning shared by every preview session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PreviewSettings {
    /// Raw read budget per track and cycle, before the frame count is derived.
    pub block_bytes: usize,
    /// Longest a single sink write may block.
    pub write_timeout_ms: u64,
    /// Longest `stop` waits for the mixing thread before detaching it.
    pub join_timeout_ms: u64,
    /// Longest `start` waits for the device to open on the mixing thread.
    pub open_timeout_ms: u64,
    /// Blocks queued in the device backend before writes apply backpressure.
    pub max_queued_blocks: usize,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            block_bytes: DEFAULT_BLOCK_BYTES,
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT_MS,
            join_timeout_ms: DEFAULT_JOIN_TIMEOUT_MS,
            open_timeout_ms: DEFAULT_OPEN_TIMEOUT_MS,
            max_queued_blocks: DEFAULT_MAX_QUEUED_BLOCKS,
        }
    }
}

impl PreviewSettings {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }
}

fn default_device_channels() -> u16 {
    2
}

fn default_volume() -> f32 {
    1.0
}

/// A complete multi-track preview described as JSON.
///
/// ```json
/// {
///   "tracks": [
///     { "path": "drums.wav", "output": "left" },
///     { "path": "keys.wav", "output": "paired", "gain": 0.8, "pan": -0.3 }
///   ],
///   "device": { "index": 2 },
///   "device_channels": 4,
///   "volume": 0.9
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub tracks: Vec<TrackSpec>,
    #[serde(default)]
    pub device: DeviceSelector,
    #[serde(default = "default_device_channels")]
    pub device_channels: u16,
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(default)]
    pub pan: f32,
    #[serde(default)]
    pub settings: PreviewSettings,
}

impl SessionConfig {
    pub fn from_json_str(json: &str) -> Result<Self, PreviewError> {
        let config: SessionConfig = serde_json::from_str(json)?;
        if config.tracks.is_empty() {
            return Err(PreviewError::NoTracks);
        }
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PreviewError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&contents)
    }

    pub fn output_request(&self) -> OutputRequest {
        OutputRequest {
            device: self.device,
            channels: self.device_channels.max(2),
            bus: BusParams {
                volume: self.volume,
                pan: self.pan,
            },
        }
    }
}
