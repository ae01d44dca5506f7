//! Per-block mixing arithmetic.
//!
//! Track contributions accumulate in `i32` so intermediate sums never
//! clip; the bus stage then scales and saturates into `i16`.

use super::controls::BusParams;
use super::routing::{balance_gains, equal_power_gains, OutputRouting};

/// Add one track's block into the accumulator.
///
/// `samples` holds `frames` interleaved frames of `source_channels`
/// (1 or 2). Mono sources feed the same sample to both sides of a pair;
/// stereo sources keep their left/right identity.
pub(crate) fn accumulate_track(
    acc: &mut [i32],
    output_channels: usize,
    samples: &[i16],
    source_channels: usize,
    frames: usize,
    routing: OutputRouting,
    gain: f32,
    pan: f32,
) {
    let (left_gain, right_gain) = match routing {
        OutputRouting::Left => (gain, 0.0),
        OutputRouting::Right => (0.0, gain),
        OutputRouting::Paired => {
            let (left, right) = equal_power_gains(pan);
            (left * gain, right * gain)
        }
    };

    for (frame, out) in acc
        .chunks_exact_mut(output_channels)
        .take(frames)
        .enumerate()
    {
        let (left, right) = if source_channels >= 2 {
            (samples[frame * 2], samples[frame * 2 + 1])
        } else {
            (samples[frame], samples[frame])
        };
        if routing != OutputRouting::Right {
            out[0] += scale(left, left_gain);
        }
        if routing != OutputRouting::Left {
            out[1] += scale(right, right_gain);
        }
    }
}

fn scale(sample: i16, gain: f32) -> i32 {
    (sample as f32 * gain).round() as i32
}

/// Apply bus volume and balance to `acc` and saturate into `out`.
///
/// Balance only touches output channels 0 and 1.
pub(crate) fn render_output(acc: &[i32], out: &mut [i16], output_channels: usize, bus: BusParams) {
    let (left_balance, right_balance) = balance_gains(bus.pan);
    for (acc_frame, out_frame) in acc
        .chunks_exact(output_channels)
        .zip(out.chunks_exact_mut(output_channels))
    {
        for (channel, (&sum, sample)) in acc_frame.iter().zip(out_frame.iter_mut()).enumerate() {
            let balance = match channel {
                0 => left_balance,
                1 => right_balance,
                _ => 1.0,
            };
            *sample = saturate(sum as f32 * bus.volume * balance);
        }
    }
}

fn saturate(value: f32) -> i16 {
    value.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}
