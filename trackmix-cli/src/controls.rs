use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use trackmix_lib::playback::BusParams;
use trackmix_lib::{OutputRouting, Previewer, TrackSpec};

const SEEK_STEP_SECONDS: f64 = 5.0;
const VOLUME_STEP: f32 = 0.05;
const PAN_STEP: f32 = 0.1;

pub struct StatusSnapshot {
    pub text: String,
}

pub struct StatusArgs<'a> {
    pub time: f64,
    pub duration: f64,
    pub playing: bool,
    pub bus: BusParams,
    pub tracks: &'a [TrackSpec],
}

pub fn status_text(args: StatusArgs) -> StatusSnapshot {
    let state = if args.playing { "▶ Playing" } else { "■ Finished" };
    let current = format_time(args.time * 1000.0);
    let total = format_time(args.duration * 1000.0);
    let percent = if args.duration > 0.0 {
        (args.time / args.duration * 100.0).min(100.0)
    } else {
        0.0
    };

    let mut text = format!(
        "{}   {} / {}   ({:>5.1}%)\nBus volume: {:.2} | pan: {:+.2}",
        state, current, total, percent, args.bus.volume, args.bus.pan
    );
    for (index, track) in args.tracks.iter().enumerate() {
        let name = track
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| track.path.display().to_string());
        let routing = match track.routing {
            OutputRouting::Left => "left".to_string(),
            OutputRouting::Right => "right".to_string(),
            OutputRouting::Paired => format!("paired {:+.2}", track.pan),
        };
        text.push_str(&format!(
            "\n{:>2}. {}  [{}]  gain {:.2}",
            index + 1,
            name,
            routing,
            track.gain
        ));
    }

    StatusSnapshot { text }
}

/// Poll one key press and apply it. Returns `false` when the user quits.
pub fn handle_key_event(previewer: &mut Previewer) -> bool {
    if event::poll(Duration::from_millis(100)).unwrap_or(false) {
        if let Ok(Event::Key(key)) = event::read() {
            if key.kind != KeyEventKind::Press {
                return true;
            }
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => {
                    previewer.stop_preview();
                    return false;
                }
                KeyCode::Left => {
                    let target = (previewer.position_seconds() - SEEK_STEP_SECONDS).max(0.0);
                    previewer.seek_preview(target);
                }
                KeyCode::Right => {
                    let target = (previewer.position_seconds() + SEEK_STEP_SECONDS)
                        .min(previewer.duration_seconds());
                    previewer.seek_preview(target);
                }
                KeyCode::Up => {
                    let bus = previewer.bus();
                    previewer.set_preview_volume(bus.volume + VOLUME_STEP);
                }
                KeyCode::Down => {
                    let bus = previewer.bus();
                    previewer.set_preview_volume(bus.volume - VOLUME_STEP);
                }
                KeyCode::Char('[') => {
                    let bus = previewer.bus();
                    previewer.set_preview_pan(bus.pan - PAN_STEP);
                }
                KeyCode::Char(']') => {
                    let bus = previewer.bus();
                    previewer.set_preview_pan(bus.pan + PAN_STEP);
                }
                _ => {}
            }
        }
    }

    true
}

fn format_time(time: f64) -> String {
    let seconds = (time / 1000.0).ceil() as u32;
    let minutes = seconds / 60;
    let seconds = seconds % 60;
    let hours = minutes / 60;
    let minutes = minutes % 60;

    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}
