use std::{
    io,
    path::PathBuf,
    sync::Arc,
    thread::sleep,
    time::Duration,
};

use clap::ArgMatches;
use crossterm::{
    cursor, execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::{error, info, warn};
use ratatui::{backend::CrosstermBackend, Terminal};
use serde::Serialize;
use trackmix_lib::playback::OutputRequest;
use trackmix_lib::sink::{list_output_devices, DeviceSelector, RodioDevice, WavFileDevice};
use trackmix_lib::{
    detect_tempo, PreviewError, PreviewSettings, Previewer, SessionConfig, TrackSpec,
};

use crate::cli::tracks;
use crate::logging::{self, LogBuffer};
use crate::{controls, ui};

const RENDER_POLL_MS: u64 = 5;

/// Commands that take over the terminal.
pub fn is_interactive(args: &ArgMatches) -> bool {
    match args.subcommand() {
        Some(("play", sub)) | Some(("session", sub)) => !sub.get_flag("quiet"),
        _ => false,
    }
}

pub fn run(args: &ArgMatches, log_buffer: LogBuffer) -> Result<i32, PreviewError> {
    match args.subcommand() {
        Some(("play", sub)) => run_play(sub, log_buffer),
        Some(("session", sub)) => run_session(sub, log_buffer),
        Some(("render", sub)) => run_render(sub),
        Some(("tempo", sub)) => run_tempo(sub),
        Some(("devices", sub)) => run_devices(sub),
        _ => Ok(-1),
    }
}

fn run_play(args: &ArgMatches, log_buffer: LogBuffer) -> Result<i32, PreviewError> {
    let tracks = tracks::track_specs(args)?;
    let device_id = args
        .get_one::<String>("device")
        .map(|value| tracks::parse_number::<i32>("device", value))
        .transpose()?
        .unwrap_or(0);
    let request = OutputRequest {
        device: DeviceSelector::from_id(device_id),
        channels: tracks::channels(args)?,
        bus: tracks::bus_params(args)?,
    };
    let settings = tracks::settings(args)?;
    play(&tracks, request, settings, args.get_flag("quiet"), log_buffer)
}

fn run_session(args: &ArgMatches, log_buffer: LogBuffer) -> Result<i32, PreviewError> {
    let path = args
        .get_one::<String>("CONFIG")
        .ok_or_else(|| PreviewError::InvalidArgument("missing session file".to_string()))?;
    let config = SessionConfig::from_json_file(path)?;
    info!("loaded session {} with {} tracks", path, config.tracks.len());
    play(
        &config.tracks,
        config.output_request(),
        config.settings.clone(),
        args.get_flag("quiet"),
        log_buffer,
    )
}

fn play(
    tracks: &[TrackSpec],
    request: OutputRequest,
    settings: PreviewSettings,
    quiet: bool,
    log_buffer: LogBuffer,
) -> Result<i32, PreviewError> {
    info!("Starting trackmix preview");
    let device = RodioDevice::from_settings(&settings);
    let mut previewer = Previewer::with_device(Arc::new(device)).with_settings(settings);

    let _stderr_capture = if quiet {
        None
    } else {
        logging::capture_stderr(log_buffer.clone())
    };
    previewer.start(tracks, request)?;

    if quiet {
        while previewer.is_playing() {
            sleep(Duration::from_millis(100));
        }
        previewer.stop_preview();
        return Ok(0);
    }

    let _raw_mode = RawModeGuard::enable().ok();
    let mut terminal = {
        let mut stdout = io::stdout();
        let _ = execute!(stdout, EnterAlternateScreen, cursor::Hide);
        let backend = CrosstermBackend::new(stdout);
        Terminal::new(backend).ok()
    };

    while previewer.is_playing() {
        if let Some(term) = terminal.as_mut() {
            let tracks = previewer.tracks();
            let status = controls::status_text(controls::StatusArgs {
                time: previewer.position_seconds(),
                duration: previewer.duration_seconds(),
                playing: previewer.is_playing(),
                bus: previewer.bus(),
                tracks: &tracks,
            });
            let log_lines = log_buffer.lines();
            ui::draw_status(term, &status, &log_lines);
        }

        if !controls::handle_key_event(&mut previewer) {
            break;
        }

        sleep(Duration::from_millis(50));
    }
    previewer.stop_preview();

    if let Some(mut term) = terminal {
        let _ = term.show_cursor();
        let stdout = term.backend_mut();
        let _ = execute!(stdout, LeaveAlternateScreen, cursor::Show);
    }

    Ok(0)
}

fn run_render(args: &ArgMatches) -> Result<i32, PreviewError> {
    let tracks = tracks::track_specs(args)?;
    let out = args
        .get_one::<String>("out")
        .map(PathBuf::from)
        .ok_or_else(|| PreviewError::InvalidArgument("--out is required".to_string()))?;
    let request = OutputRequest {
        device: DeviceSelector::Default,
        channels: tracks::channels(args)?,
        bus: tracks::bus_params(args)?,
    };
    let settings = tracks::settings(args)?;

    let mut previewer =
        Previewer::with_device(Arc::new(WavFileDevice::new(&out))).with_settings(settings);
    previewer.start(&tracks, request)?;
    while previewer.is_playing() {
        sleep(Duration::from_millis(RENDER_POLL_MS));
    }
    let seconds = previewer.position_seconds();
    previewer.stop_preview();

    println!("{}", out.display());
    info!("rendered {:.2}s of audio", seconds);
    Ok(0)
}

fn run_tempo(args: &ArgMatches) -> Result<i32, PreviewError> {
    let input = args
        .get_one::<String>("INPUT")
        .ok_or_else(|| PreviewError::InvalidArgument("missing input".to_string()))?;
    let estimate = detect_tempo(input);
    if estimate.is_fallback() {
        warn!("no reliable tempo found in {}", input);
    }
    println!("{}", serde_json::to_string(&estimate)?);
    Ok(0)
}

#[derive(Serialize)]
struct DeviceEntry {
    index: usize,
    name: String,
}

fn run_devices(args: &ArgMatches) -> Result<i32, PreviewError> {
    let names = match list_output_devices() {
        Ok(names) => names,
        Err(err) => {
            error!("cannot list output devices: {}", err);
            return Ok(1);
        }
    };
    let entries: Vec<DeviceEntry> = names
        .into_iter()
        .enumerate()
        .map(|(index, name)| DeviceEntry {
            index: index + 1,
            name,
        })
        .collect();

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for entry in &entries {
            println!("{:>3}  {}", entry.index, entry.name);
        }
    }
    Ok(0)
}

struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}
