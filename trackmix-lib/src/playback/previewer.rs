//! Controller-side API: start, stop, seek and adjust one preview at a time.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{error, info, warn};

use crate::error::PreviewError;
use crate::settings::PreviewSettings;
use crate::sink::{DeviceSelector, OutputDevice, RodioDevice, SinkConfig};

use super::controls::{BusParams, LiveControls};
use super::routing::{OutputRouting, TrackSpec};
use super::session::MixSession;
use super::worker::MixWorker;

/// Where and how a preview is played.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputRequest {
    pub device: DeviceSelector,
    /// Requested output channel count; values below 2 are raised to 2.
    pub channels: u16,
    /// Bus values the new session starts from.
    pub bus: BusParams,
}

impl Default for OutputRequest {
    fn default() -> Self {
        Self {
            device: DeviceSelector::Default,
            channels: 2,
            bus: BusParams::default(),
        }
    }
}

impl OutputRequest {
    /// Build from the numeric device id / channel count of the control API.
    pub fn from_ids(device_id: i32, device_channels: i32) -> Self {
        Self {
            device: DeviceSelector::from_id(device_id),
            channels: device_channels.clamp(2, u16::MAX as i32) as u16,
            bus: BusParams::default(),
        }
    }
}

#[derive(Debug)]
struct ActiveSession {
    worker: MixWorker,
    controls: Arc<LiveControls>,
    sample_rate: u32,
    duration_seconds: f64,
    tracks: Vec<TrackSpec>,
}

/// Owns the output device and at most one running preview.
///
/// Starting a preview tears down the previous one first. Every control
/// call is lock-free with respect to the mixing thread and takes effect
/// at its next block.
pub struct Previewer {
    device: Arc<dyn OutputDevice>,
    settings: PreviewSettings,
    active: Option<ActiveSession>,
    /// Liveness of a mixing thread that was detached by a timed-out stop.
    lingering: Option<Arc<AtomicBool>>,
}

impl Default for Previewer {
    fn default() -> Self {
        Self::new()
    }
}

impl Previewer {
    /// Previewer playing through the system audio output.
    pub fn new() -> Self {
        let settings = PreviewSettings::default();
        let device = RodioDevice::from_settings(&settings);
        Self::with_device(Arc::new(device)).with_settings(settings)
    }

    pub fn with_device(device: Arc<dyn OutputDevice>) -> Self {
        Self {
            device,
            settings: PreviewSettings::default(),
            active: None,
            lingering: None,
        }
    }

    pub fn with_settings(mut self, settings: PreviewSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &PreviewSettings {
        &self.settings
    }

    /// Start a preview of `tracks`, replacing any running one.
    ///
    /// Nothing is left running when this fails. Fails with `Device` while
    /// a previously detached mixing thread still holds the output.
    pub fn start(
        &mut self,
        tracks: &[TrackSpec],
        request: OutputRequest,
    ) -> Result<(), PreviewError> {
        self.stop_preview();
        if self.output_held_by_detached_thread() {
            return Err(PreviewError::Device(
                "previous mixing thread has not released the output yet".to_string(),
            ));
        }

        let tracks: Vec<TrackSpec> = tracks
            .iter()
            .map(|spec| TrackSpec::new(spec.path.clone(), spec.routing, spec.gain, spec.pan))
            .collect();
        let session = MixSession::open(&tracks, &self.settings)?;

        let controls = Arc::new(LiveControls::new(
            &tracks
                .iter()
                .map(|spec| (spec.gain, spec.pan))
                .collect::<Vec<_>>(),
        ));
        controls.set_bus_volume(request.bus.volume);
        controls.set_bus_pan(request.bus.pan);

        let sample_rate = session.sample_rate();
        let duration_seconds = session.duration_seconds();
        let config = SinkConfig {
            sample_rate,
            channels: request.channels.max(2),
            device: request.device,
        };
        let worker = MixWorker::spawn(
            session,
            self.device.clone(),
            config,
            controls.clone(),
            &self.settings,
        )?;

        info!(
            "preview started: {} track(s), {:.2}s at {} Hz",
            tracks.len(),
            duration_seconds,
            sample_rate
        );
        self.active = Some(ActiveSession {
            worker,
            controls,
            sample_rate,
            duration_seconds,
            tracks,
        });
        Ok(())
    }

    /// Preview one file on the routing chosen by `selector`
    /// (`<= 0` left, `1` right, `>= 2` paired).
    pub fn start_single_preview(
        &mut self,
        path: impl AsRef<Path>,
        selector: i32,
        device_id: i32,
        device_channels: i32,
    ) -> bool {
        let track = TrackSpec::new(
            path.as_ref(),
            OutputRouting::from_selector(selector),
            1.0,
            0.0,
        );
        self.report_start(&[track], OutputRequest::from_ids(device_id, device_channels))
    }

    /// Preview several files at once. The four per-track lists must have
    /// the same length.
    pub fn start_multi_preview(
        &mut self,
        paths: &[PathBuf],
        selectors: &[i32],
        gains: &[f32],
        pans: &[f32],
        device_id: i32,
        device_channels: i32,
    ) -> bool {
        let count = paths.len();
        if selectors.len() != count || gains.len() != count || pans.len() != count {
            warn!(
                "preview rejected: {} paths, {} selectors, {} gains, {} pans",
                count,
                selectors.len(),
                gains.len(),
                pans.len()
            );
            self.stop_preview();
            return false;
        }

        let tracks: Vec<TrackSpec> = paths
            .iter()
            .zip(selectors)
            .zip(gains.iter().zip(pans))
            .map(|((path, &selector), (&gain, &pan))| {
                TrackSpec::new(path, OutputRouting::from_selector(selector), gain, pan)
            })
            .collect();
        self.report_start(&tracks, OutputRequest::from_ids(device_id, device_channels))
    }

    fn report_start(&mut self, tracks: &[TrackSpec], request: OutputRequest) -> bool {
        match self.start(tracks, request) {
            Ok(()) => true,
            Err(err) => {
                warn!("preview failed to start: {}", err);
                false
            }
        }
    }

    /// Stop the running preview, if any. Safe to call repeatedly.
    pub fn stop_preview(&mut self) {
        if let Some(mut active) = self.active.take() {
            if active.worker.shutdown() {
                info!("preview stopped");
            } else {
                self.lingering = Some(active.worker.liveness());
            }
        }
    }

    fn output_held_by_detached_thread(&mut self) -> bool {
        let held = self
            .lingering
            .as_ref()
            .is_some_and(|alive| alive.load(Ordering::SeqCst));
        if held {
            error!("output still held by a detached mixing thread");
        } else {
            self.lingering = None;
        }
        held
    }

    pub fn seek_preview(&self, seconds: f64) {
        if let Some(active) = &self.active {
            active.controls.request_seek(seconds);
        }
    }

    /// Bus volume, clamped to `[0, 1]`.
    pub fn set_preview_volume(&self, volume: f32) {
        if let Some(active) = &self.active {
            active.controls.set_bus_volume(volume);
        }
    }

    /// Bus pan, clamped to `[-1, 1]`.
    pub fn set_preview_pan(&self, pan: f32) {
        if let Some(active) = &self.active {
            active.controls.set_bus_pan(pan);
        }
    }

    /// Returns `false` without an active preview or for an unknown track.
    pub fn set_track_gain(&self, index: usize, gain: f32) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.controls.set_track_gain(index, gain))
    }

    pub fn set_track_pan(&self, index: usize, pan: f32) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.controls.set_track_pan(index, pan))
    }

    /// True while the mixing thread is alive. Turns false on its own when
    /// every track has played out.
    pub fn is_playing(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.worker.is_running())
    }

    pub fn position_seconds(&self) -> f64 {
        self.active.as_ref().map_or(0.0, |active| {
            active.controls.position_frames() as f64 / active.sample_rate as f64
        })
    }

    pub fn duration_seconds(&self) -> f64 {
        self.active
            .as_ref()
            .map_or(0.0, |active| active.duration_seconds)
    }

    /// Current bus values, defaults without an active preview.
    pub fn bus(&self) -> BusParams {
        self.active
            .as_ref()
            .map_or_else(BusParams::default, |active| active.controls.bus())
    }

    /// Tracks of the active preview with their current gain and pan.
    pub fn tracks(&self) -> Vec<TrackSpec> {
        let Some(active) = &self.active else {
            return Vec::new();
        };
        active
            .tracks
            .iter()
            .enumerate()
            .map(|(index, spec)| {
                let (gain, pan) = active
                    .controls
                    .track_mix(index)
                    .unwrap_or((spec.gain, spec.pan));
                TrackSpec {
                    gain,
                    pan,
                    ..spec.clone()
                }
            })
            .collect()
    }
}

impl Drop for Previewer {
    fn drop(&mut self) {
        self.stop_preview();
    }
}
