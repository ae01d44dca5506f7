//! The mix session: a set of PCM tracks pulled block by block, mixed and
//! pushed to an output sink.

use std::time::Duration;

use log::{debug, info, warn};

use crate::error::PreviewError;
use crate::pcm::{decode_i16_into, PcmSource};
use crate::settings::PreviewSettings;
use crate::sink::OutputSink;

use super::controls::{BusParams, LiveControls};
use super::mix::{accumulate_track, render_output};
use super::routing::{OutputRouting, TrackSpec};

/// Why [`MixSession::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The stop flag was observed.
    Stopped,
    /// Every track ran out of audio.
    Drained,
}

#[derive(Debug)]
struct MixTrack {
    source: PcmSource,
    routing: OutputRouting,
    ended: bool,
    /// Frames decoded into `samples` during the current cycle.
    frames: usize,
    samples: Vec<i16>,
}

/// Tracks sharing one sample rate and bit depth, plus the scratch buffers
/// used to mix them. Buffers are sized once and reused every cycle.
#[derive(Debug)]
pub struct MixSession {
    tracks: Vec<MixTrack>,
    sample_rate: u32,
    block_frames: usize,
    output_channels: usize,
    raw: Vec<u8>,
    acc: Vec<i32>,
    out: Vec<i16>,
    position_frames: u64,
}

impl MixSession {
    /// Open and validate every track.
    ///
    /// Fails if `specs` is empty, a file cannot be parsed, a track is not
    /// 16-bit integer PCM, or sample rate / bit depth disagree with the
    /// first track.
    pub fn open(specs: &[TrackSpec], settings: &PreviewSettings) -> Result<Self, PreviewError> {
        if specs.is_empty() {
            return Err(PreviewError::NoTracks);
        }

        let mut sources = Vec::with_capacity(specs.len());
        for spec in specs {
            let source = PcmSource::open(&spec.path).map_err(|err| {
                warn!("cannot open track {}: {}", spec.path.display(), err);
                err
            })?;
            let info = *source.info();
            if !info.is_pcm16() {
                return Err(PreviewError::Unsupported(format!(
                    "{}: mixing needs 16-bit integer PCM, found {}-bit {:?}",
                    spec.path.display(),
                    info.bits_per_sample,
                    info.encoding
                )));
            }
            sources.push(source);
        }

        let first = *sources[0].info();
        for (spec, source) in specs.iter().zip(&sources).skip(1) {
            let info = source.info();
            if info.sample_rate != first.sample_rate
                || info.bits_per_sample != first.bits_per_sample
            {
                return Err(PreviewError::FormatMismatch(format!(
                    "{} is {} Hz / {}-bit, first track is {} Hz / {}-bit",
                    spec.path.display(),
                    info.sample_rate,
                    info.bits_per_sample,
                    first.sample_rate,
                    first.bits_per_sample
                )));
            }
        }

        let max_frame_bytes = sources
            .iter()
            .map(|source| source.info().frame_bytes())
            .max()
            .unwrap_or(1);
        let block_frames = (settings.block_bytes / max_frame_bytes).max(1);

        let tracks = specs
            .iter()
            .zip(sources)
            .map(|(spec, source)| {
                let channels = source.info().channels as usize;
                MixTrack {
                    source,
                    routing: spec.routing,
                    ended: false,
                    frames: 0,
                    samples: vec![0; block_frames * channels],
                }
            })
            .collect::<Vec<_>>();

        debug!(
            "mix session: {} tracks at {} Hz, {} frames per block",
            tracks.len(),
            first.sample_rate,
            block_frames
        );

        Ok(Self {
            tracks,
            sample_rate: first.sample_rate,
            block_frames,
            output_channels: 0,
            raw: vec![0; block_frames * max_frame_bytes],
            acc: Vec::new(),
            out: Vec::new(),
            position_frames: 0,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn block_frames(&self) -> usize {
        self.block_frames
    }

    /// Length of the longest track.
    pub fn duration_seconds(&self) -> f64 {
        self.tracks
            .iter()
            .map(|track| track.source.info().duration_seconds())
            .fold(0.0, f64::max)
    }

    /// Size the output buffers for a sink with `channels` channels.
    pub fn prepare_output(&mut self, channels: usize) -> Result<(), PreviewError> {
        if channels < 2 {
            return Err(PreviewError::Device(format!(
                "output has {} channel(s), at least 2 are required",
                channels
            )));
        }
        self.output_channels = channels;
        self.acc = vec![0; self.block_frames * channels];
        self.out = vec![0; self.block_frames * channels];
        Ok(())
    }

    /// Move every track to `seconds`. Tracks shorter than the target end
    /// and stay silent; the others resume.
    pub fn apply_seek(&mut self, seconds: f64) {
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        let target_frames = (seconds * self.sample_rate as f64).floor() as u64;

        for track in &mut self.tracks {
            let info = *track.source.info();
            let offset = target_frames.saturating_mul(info.frame_bytes() as u64);
            let past_end = offset >= info.data_len;
            let result = track
                .source
                .seek_to_byte_offset(offset.min(info.data_len));
            match result {
                Ok(()) => track.ended = past_end,
                Err(err) => {
                    warn!("seek failed, track ends: {}", err);
                    track.ended = true;
                }
            }
        }
        self.position_frames = target_frames;
        debug!("seek to {:.3}s (frame {})", seconds, target_frames);
    }

    /// Read the next block from every live track and return the number of
    /// frames to mix this cycle; `0` when no track produced audio.
    ///
    /// Tracks that delivered more than the shortest positive read are
    /// rewound by the excess, so nothing is skipped.
    pub fn pull_block(&mut self) -> usize {
        for track in &mut self.tracks {
            track.frames = 0;
            if track.ended {
                continue;
            }
            let frame_bytes = track.source.info().frame_bytes();
            let budget = &mut self.raw[..self.block_frames * frame_bytes];
            match track.source.read_bytes(budget) {
                Ok(0) => track.ended = true,
                Ok(bytes) => {
                    decode_i16_into(&budget[..bytes], &mut track.samples);
                    track.frames = bytes / frame_bytes;
                }
                Err(err) => {
                    warn!("read failed, track ends: {}", err);
                    track.ended = true;
                }
            }
        }

        let frames = self
            .tracks
            .iter()
            .map(|track| track.frames)
            .filter(|&frames| frames > 0)
            .min()
            .unwrap_or(0);

        for track in &mut self.tracks {
            if track.frames > frames {
                let excess = (track.frames - frames) as u64;
                if let Err(err) = track.source.rewind_frames(excess) {
                    warn!("rewind failed, track ends: {}", err);
                    track.ended = true;
                }
            }
        }
        frames
    }

    /// Mix `frames` frames of the current block into the output buffer and
    /// return the interleaved result.
    pub fn mix_block(&mut self, frames: usize, bus: BusParams, controls: &LiveControls) -> &[i16] {
        let channels = self.output_channels;
        let len = frames * channels;
        let acc = &mut self.acc[..len];
        acc.fill(0);

        for (index, track) in self.tracks.iter().enumerate() {
            if track.frames == 0 {
                continue;
            }
            let (gain, pan) = controls.track_mix(index).unwrap_or((1.0, 0.0));
            accumulate_track(
                acc,
                channels,
                &track.samples,
                track.source.info().channels as usize,
                frames,
                track.routing,
                gain,
                pan,
            );
        }

        render_output(acc, &mut self.out[..len], channels, bus);
        &self.out[..len]
    }

    /// Run the mixing loop until stopped or drained.
    pub fn run(
        &mut self,
        sink: &mut dyn OutputSink,
        controls: &LiveControls,
        write_timeout: Duration,
    ) -> SessionEnd {
        loop {
            if controls.is_stopped() {
                return SessionEnd::Stopped;
            }

            let snapshot = controls.snapshot();
            if let Some(seconds) = snapshot.seek {
                self.apply_seek(seconds);
                controls.publish_position(self.position_frames);
            }

            let frames = self.pull_block();
            if frames == 0 {
                info!("all tracks finished");
                return SessionEnd::Drained;
            }

            self.mix_block(frames, snapshot.bus, controls);
            if !self.write_block(sink, frames, controls, write_timeout) {
                return SessionEnd::Stopped;
            }

            self.position_frames += frames as u64;
            controls.publish_position(self.position_frames);
        }
    }

    /// Push the mixed block, retrying short writes. Returns `false` when
    /// the stop flag interrupted the write. A sink error drops the rest of
    /// the block and playback carries on.
    fn write_block(
        &self,
        sink: &mut dyn OutputSink,
        frames: usize,
        controls: &LiveControls,
        timeout: Duration,
    ) -> bool {
        let channels = self.output_channels;
        let mut written = 0;
        while written < frames {
            if controls.is_stopped() {
                return false;
            }
            match sink.write(&self.out[written * channels..frames * channels], timeout) {
                Ok(count) => written += count.min(frames - written),
                Err(err) => {
                    warn!(
                        "sink write failed, dropping {} frames: {}",
                        frames - written,
                        err
                    );
                    break;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{DeviceSelector, MemoryCapture, MemoryDevice, OutputDevice, SinkConfig};
    use crate::test_support::{write_float, write_pcm16};
    use std::path::PathBuf;
    use std::sync::Arc;

    fn settings(block_bytes: usize) -> PreviewSettings {
        PreviewSettings {
            block_bytes,
            ..PreviewSettings::default()
        }
    }

    fn track(
        dir: &tempfile::TempDir,
        name: &str,
        channels: u16,
        rate: u32,
        samples: &[i16],
    ) -> PathBuf {
        let path = dir.path().join(name);
        write_pcm16(&path, channels, rate, samples);
        path
    }

    fn run_to_end(
        specs: &[TrackSpec],
        device: MemoryDevice,
        block_bytes: usize,
    ) -> (SessionEnd, MemoryCapture) {
        let capture = device.capture();
        let mut session = MixSession::open(specs, &settings(block_bytes)).unwrap();
        let mut sink = device
            .open(&SinkConfig {
                sample_rate: session.sample_rate(),
                channels: 2,
                device: DeviceSelector::Default,
            })
            .unwrap();
        session.prepare_output(sink.channels()).unwrap();
        let controls = LiveControls::new(
            &specs.iter().map(|spec| (spec.gain, spec.pan)).collect::<Vec<_>>(),
        );
        let end = session.run(sink.as_mut(), &controls, Duration::from_millis(50));
        let captured = capture.lock().unwrap().clone();
        (end, captured)
    }

    fn ramp(len: usize) -> Vec<i16> {
        (0..len).map(|i| ((i * 37) % 20_000) as i16 - 10_000).collect()
    }

    #[test]
    fn open_rejects_empty_and_mismatched_tracks() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            MixSession::open(&[], &PreviewSettings::default()),
            Err(PreviewError::NoTracks)
        ));

        let a = track(&dir, "a.wav", 1, 44_100, &[1, 2, 3]);
        let b = track(&dir, "b.wav", 1, 48_000, &[1, 2, 3]);
        let specs = [
            TrackSpec::new(&a, OutputRouting::Left, 1.0, 0.0),
            TrackSpec::new(&b, OutputRouting::Right, 1.0, 0.0),
        ];
        assert!(matches!(
            MixSession::open(&specs, &PreviewSettings::default()),
            Err(PreviewError::FormatMismatch(_))
        ));

        let float = dir.path().join("f.wav");
        write_float(&float, 1, 44_100, &[0.1, 0.2]);
        let specs = [TrackSpec::new(&float, OutputRouting::Left, 1.0, 0.0)];
        assert!(matches!(
            MixSession::open(&specs, &PreviewSettings::default()),
            Err(PreviewError::Unsupported(_))
        ));

        let missing = [TrackSpec::new(
            dir.path().join("nope.wav"),
            OutputRouting::Left,
            1.0,
            0.0,
        )];
        assert!(matches!(
            MixSession::open(&missing, &PreviewSettings::default()),
            Err(PreviewError::Io(_))
        ));
    }

    #[test]
    fn block_frames_follow_the_widest_track() {
        let dir = tempfile::tempdir().unwrap();
        let mono = track(&dir, "m.wav", 1, 8_000, &[0; 16]);
        let stereo = track(&dir, "s.wav", 2, 8_000, &[0; 16]);
        let specs = [
            TrackSpec::new(&mono, OutputRouting::Left, 1.0, 0.0),
            TrackSpec::new(&stereo, OutputRouting::Paired, 1.0, 0.0),
        ];
        let session = MixSession::open(&specs, &settings(4096)).unwrap();
        assert_eq!(session.block_frames(), 1024);
    }

    #[test]
    fn half_gain_left_and_right_reproduce_each_track() {
        let dir = tempfile::tempdir().unwrap();
        let samples = ramp(700);
        let path = track(&dir, "t.wav", 1, 8_000, &samples);
        let specs = [
            TrackSpec::new(&path, OutputRouting::Left, 0.5, 0.0),
            TrackSpec::new(&path, OutputRouting::Right, 0.5, 0.0),
        ];
        let (end, capture) = run_to_end(&specs, MemoryDevice::new(), 256);
        assert_eq!(end, SessionEnd::Drained);

        let expected: Vec<i16> = samples
            .iter()
            .map(|&s| (s as f32 * 0.5).round() as i16)
            .collect();
        assert_eq!(capture.channel(0), expected);
        assert_eq!(capture.channel(1), expected);
    }

    #[test]
    fn shorter_track_ends_without_stopping_the_mix() {
        let dir = tempfile::tempdir().unwrap();
        let long = ramp(1000);
        let short: Vec<i16> = vec![500; 333];
        let long_path = track(&dir, "long.wav", 1, 8_000, &long);
        let short_path = track(&dir, "short.wav", 1, 8_000, &short);
        let specs = [
            TrackSpec::new(&long_path, OutputRouting::Left, 1.0, 0.0),
            TrackSpec::new(&short_path, OutputRouting::Right, 1.0, 0.0),
        ];
        let (end, capture) = run_to_end(&specs, MemoryDevice::new(), 200);
        assert_eq!(end, SessionEnd::Drained);

        assert_eq!(capture.frames(), 1000);
        assert_eq!(capture.channel(0), long);
        let right = capture.channel(1);
        assert!(right[..333].iter().all(|&s| s == 500));
        assert!(right[333..].iter().all(|&s| s == 0));
    }

    #[test]
    fn short_writes_are_retried_until_complete() {
        let dir = tempfile::tempdir().unwrap();
        let samples = ramp(600);
        let path = track(&dir, "t.wav", 1, 8_000, &samples);
        let specs = [TrackSpec::new(&path, OutputRouting::Left, 1.0, 0.0)];
        let device = MemoryDevice::new().with_max_frames_per_write(7);
        let (_, capture) = run_to_end(&specs, device, 512);
        assert_eq!(capture.channel(0), samples);
        assert!(capture.writes > 600 / 7);
    }

    #[test]
    fn write_errors_drop_the_block_and_keep_playing() {
        let dir = tempfile::tempdir().unwrap();
        let samples = ramp(400);
        let path = track(&dir, "t.wav", 1, 8_000, &samples);
        let specs = [TrackSpec::new(&path, OutputRouting::Left, 1.0, 0.0)];
        let device = MemoryDevice::new().with_failing_writes(1);
        let (end, capture) = run_to_end(&specs, device, 200);
        assert_eq!(end, SessionEnd::Drained);
        assert_eq!(capture.channel(0), samples[100..].to_vec());
    }

    #[test]
    fn seek_past_end_silences_that_track() {
        let dir = tempfile::tempdir().unwrap();
        let long = vec![1000i16; 8_000];
        let short = vec![-700i16; 2_000];
        let long_path = track(&dir, "long.wav", 1, 8_000, &long);
        let short_path = track(&dir, "short.wav", 1, 8_000, &short);
        let specs = [
            TrackSpec::new(&long_path, OutputRouting::Left, 1.0, 0.0),
            TrackSpec::new(&short_path, OutputRouting::Right, 1.0, 0.0),
        ];
        let mut session = MixSession::open(&specs, &settings(1024)).unwrap();
        session.prepare_output(2).unwrap();
        let controls = LiveControls::new(&[(1.0, 0.0), (1.0, 0.0)]);

        session.apply_seek(0.5);
        let frames = session.pull_block();
        assert_eq!(frames, 512);
        let out = session.mix_block(frames, BusParams::default(), &controls).to_vec();
        assert!(out.chunks_exact(2).all(|frame| frame == [1000, 0]));

        session.apply_seek(0.0);
        let frames = session.pull_block();
        let out = session.mix_block(frames, BusParams::default(), &controls).to_vec();
        assert!(out.chunks_exact(2).all(|frame| frame == [1000, -700]));

        session.apply_seek(5.0);
        assert_eq!(session.pull_block(), 0);
    }

    #[test]
    fn stop_flag_ends_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = track(&dir, "t.wav", 1, 8_000, &[1; 4000]);
        let specs = [TrackSpec::new(&path, OutputRouting::Left, 1.0, 0.0)];
        let mut session = MixSession::open(&specs, &settings(256)).unwrap();
        let mut sink = MemoryDevice::new()
            .open(&SinkConfig {
                sample_rate: 8_000,
                channels: 2,
                device: DeviceSelector::Default,
            })
            .unwrap();
        session.prepare_output(2).unwrap();
        let controls = LiveControls::new(&[(1.0, 0.0)]);
        controls.request_stop();
        let end = session.run(sink.as_mut(), &controls, Duration::from_millis(10));
        assert_eq!(end, SessionEnd::Stopped);
        assert_eq!(controls.position_frames(), 0);
    }

    /// Accepts nothing and raises stop after `stall_after` attempts.
    struct StallingSink {
        controls: Arc<LiveControls>,
        stall_after: usize,
        attempts: usize,
    }

    impl OutputSink for StallingSink {
        fn channels(&self) -> usize {
            2
        }

        fn sample_rate(&self) -> u32 {
            8_000
        }

        fn start(&mut self) -> Result<(), PreviewError> {
            Ok(())
        }

        fn write(
            &mut self,
            _interleaved: &[i16],
            _timeout: Duration,
        ) -> Result<usize, PreviewError> {
            self.attempts += 1;
            if self.attempts == self.stall_after {
                self.controls.request_stop();
            }
            Ok(0)
        }

        fn stop(&mut self) {}

        fn close(&mut self) {}
    }

    #[test]
    fn stop_interrupts_a_stalled_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = track(&dir, "t.wav", 1, 8_000, &[1; 4000]);
        let specs = [TrackSpec::new(&path, OutputRouting::Left, 1.0, 0.0)];
        let mut session = MixSession::open(&specs, &settings(256)).unwrap();
        session.prepare_output(2).unwrap();

        let controls = Arc::new(LiveControls::new(&[(1.0, 0.0)]));
        let mut sink = StallingSink {
            controls: controls.clone(),
            stall_after: 5,
            attempts: 0,
        };
        let end = session.run(&mut sink, &controls, Duration::from_millis(1));
        assert_eq!(end, SessionEnd::Stopped);
        assert_eq!(sink.attempts, 5);
        assert_eq!(controls.position_frames(), 0);
    }

    #[test]
    fn mono_output_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = track(&dir, "t.wav", 1, 8_000, &[1; 10]);
        let specs = [TrackSpec::new(&path, OutputRouting::Left, 1.0, 0.0)];
        let mut session = MixSession::open(&specs, &PreviewSettings::default()).unwrap();
        assert!(matches!(session.prepare_output(1), Err(PreviewError::Device(_))));
    }
}
