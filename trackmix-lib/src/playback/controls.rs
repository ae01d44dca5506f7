//! Cross-thread parameters shared between a controller and its mixing thread.
//!
//! Every field is a single atomic word so updates never block the mixer.
//! Values that must be observed together (bus volume + pan, per-track
//! gain + pan) are packed into one word, and the mixer reads them once per
//! cycle through [`LiveControls::snapshot`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::routing::{clamp_gain, clamp_pan};

/// Marker for "no seek pending". Real targets are finite, non-negative
/// seconds and can never have this bit pattern.
const NO_SEEK: u64 = u64::MAX;

fn pack(first: f32, second: f32) -> u64 {
    ((first.to_bits() as u64) << 32) | second.to_bits() as u64
}

fn unpack(bits: u64) -> (f32, f32) {
    (f32::from_bits((bits >> 32) as u32), f32::from_bits(bits as u32))
}

/// Session-wide gain/pan stage applied after per-track mixing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BusParams {
    pub volume: f32,
    pub pan: f32,
}

impl Default for BusParams {
    fn default() -> Self {
        Self {
            volume: 1.0,
            pan: 0.0,
        }
    }
}

/// Parameters the mixer acts on for one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlSnapshot {
    /// Latest seek target in seconds, consumed by the snapshot that saw it.
    pub seek: Option<f64>,
    pub bus: BusParams,
}

/// Live control surface of one preview session.
#[derive(Debug)]
pub struct LiveControls {
    stop: AtomicBool,
    seek: AtomicU64,
    bus: AtomicU64,
    tracks: Vec<AtomicU64>,
    position_frames: AtomicU64,
}

impl LiveControls {
    /// Fresh controls with default bus values and the given per-track
    /// `(gain, pan)` pairs.
    pub fn new(track_mix: &[(f32, f32)]) -> Self {
        let bus = BusParams::default();
        Self {
            stop: AtomicBool::new(false),
            seek: AtomicU64::new(NO_SEEK),
            bus: AtomicU64::new(pack(bus.volume, bus.pan)),
            tracks: track_mix
                .iter()
                .map(|&(gain, pan)| AtomicU64::new(pack(clamp_gain(gain), clamp_pan(pan))))
                .collect(),
            position_frames: AtomicU64::new(0),
        }
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Request a seek. Negative or non-finite targets seek to the start;
    /// a later request before the next cycle replaces this one.
    pub fn request_seek(&self, seconds: f64) {
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        self.seek.store(seconds.to_bits(), Ordering::Release);
    }

    pub fn set_bus_volume(&self, volume: f32) {
        let volume = if volume.is_finite() { volume.clamp(0.0, 1.0) } else { 1.0 };
        self.update_packed(&self.bus, |(_, pan)| (volume, pan));
    }

    pub fn set_bus_pan(&self, pan: f32) {
        let pan = clamp_pan(pan);
        self.update_packed(&self.bus, |(volume, _)| (volume, pan));
    }

    pub fn bus(&self) -> BusParams {
        let (volume, pan) = unpack(self.bus.load(Ordering::Acquire));
        BusParams { volume, pan }
    }

    /// Returns `false` when `index` is not a track of this session.
    pub fn set_track_gain(&self, index: usize, gain: f32) -> bool {
        let Some(slot) = self.tracks.get(index) else {
            return false;
        };
        let gain = clamp_gain(gain);
        self.update_packed(slot, |(_, pan)| (gain, pan));
        true
    }

    /// Returns `false` when `index` is not a track of this session.
    pub fn set_track_pan(&self, index: usize, pan: f32) -> bool {
        let Some(slot) = self.tracks.get(index) else {
            return false;
        };
        let pan = clamp_pan(pan);
        self.update_packed(slot, |(gain, _)| (gain, pan));
        true
    }

    /// Current `(gain, pan)` of track `index`.
    pub fn track_mix(&self, index: usize) -> Option<(f32, f32)> {
        self.tracks
            .get(index)
            .map(|slot| unpack(slot.load(Ordering::Acquire)))
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Take a consistent view of the cycle parameters, consuming any
    /// pending seek.
    pub fn snapshot(&self) -> ControlSnapshot {
        let seek_bits = self.seek.swap(NO_SEEK, Ordering::AcqRel);
        ControlSnapshot {
            seek: (seek_bits != NO_SEEK).then(|| f64::from_bits(seek_bits)),
            bus: self.bus(),
        }
    }

    /// Playback position, in frames of the session sample rate.
    pub fn position_frames(&self) -> u64 {
        self.position_frames.load(Ordering::Relaxed)
    }

    pub(crate) fn publish_position(&self, frames: u64) {
        self.position_frames.store(frames, Ordering::Relaxed);
    }

    fn update_packed(&self, slot: &AtomicU64, update: impl Fn((f32, f32)) -> (f32, f32)) {
        let _ = slot.fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
            let (first, second) = update(unpack(bits));
            Some(pack(first, second))
        });
    }
}
