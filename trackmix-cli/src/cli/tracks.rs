//! Turn per-track command line values into track specs.

use std::path::PathBuf;

use clap::ArgMatches;
use trackmix_lib::playback::BusParams;
use trackmix_lib::{OutputRouting, PreviewError, PreviewSettings, TrackSpec};

/// Parse a routing selector by name or number.
pub fn parse_routing(value: &str) -> Result<OutputRouting, PreviewError> {
    match value.to_lowercase().as_str() {
        "left" | "l" => Ok(OutputRouting::Left),
        "right" | "r" => Ok(OutputRouting::Right),
        "paired" | "stereo" | "both" => Ok(OutputRouting::Paired),
        other => other
            .parse::<i32>()
            .map(OutputRouting::from_selector)
            .map_err(|_| PreviewError::InvalidArgument(format!("unknown output '{}'", value))),
    }
}

pub fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, PreviewError> {
    value.trim().parse::<T>().map_err(|_| {
        PreviewError::InvalidArgument(format!("--{} expects a number, got '{}'", name, value))
    })
}

/// Expand a per-track option: none gives `default` for every track, one
/// value applies to all, otherwise there must be one value per track.
pub fn per_track<T: Clone>(
    name: &str,
    values: Vec<T>,
    count: usize,
    default: T,
) -> Result<Vec<T>, PreviewError> {
    match values.len() {
        0 => Ok(vec![default; count]),
        1 => Ok(vec![values[0].clone(); count]),
        n if n == count => Ok(values),
        n => Err(PreviewError::InvalidArgument(format!(
            "--{} given {} times for {} tracks",
            name, n, count
        ))),
    }
}

fn values<'a>(args: &'a ArgMatches, name: &str) -> Vec<&'a String> {
    args.get_many::<String>(name)
        .map(|values| values.collect())
        .unwrap_or_default()
}

fn one(args: &ArgMatches, name: &str) -> Option<String> {
    args.get_one::<String>(name).cloned()
}

/// Build the track list from `FILES`, `--output`, `--gain` and `--pan`.
pub fn track_specs(args: &ArgMatches) -> Result<Vec<TrackSpec>, PreviewError> {
    let paths: Vec<PathBuf> = values(args, "FILES").into_iter().map(PathBuf::from).collect();
    if paths.is_empty() {
        return Err(PreviewError::NoTracks);
    }
    let count = paths.len();

    let routings = values(args, "output")
        .into_iter()
        .map(|value| parse_routing(value))
        .collect::<Result<Vec<_>, _>>()?;
    let gains = values(args, "gain")
        .into_iter()
        .map(|value| parse_number::<f32>("gain", value))
        .collect::<Result<Vec<_>, _>>()?;
    let pans = values(args, "pan")
        .into_iter()
        .map(|value| parse_number::<f32>("pan", value))
        .collect::<Result<Vec<_>, _>>()?;

    let routings = per_track("output", routings, count, OutputRouting::Paired)?;
    let gains = per_track("gain", gains, count, 1.0)?;
    let pans = per_track("pan", pans, count, 0.0)?;

    Ok(paths
        .into_iter()
        .zip(routings)
        .zip(gains.into_iter().zip(pans))
        .map(|((path, routing), (gain, pan))| TrackSpec::new(path, routing, gain, pan))
        .collect())
}

pub fn bus_params(args: &ArgMatches) -> Result<BusParams, PreviewError> {
    let volume = one(args, "volume").unwrap_or_else(|| "1.0".to_string());
    let pan = one(args, "bus-pan").unwrap_or_else(|| "0.0".to_string());
    Ok(BusParams {
        volume: parse_number("volume", &volume)?,
        pan: parse_number("bus-pan", &pan)?,
    })
}

pub fn channels(args: &ArgMatches) -> Result<u16, PreviewError> {
    let channels = one(args, "channels").unwrap_or_else(|| "2".to_string());
    Ok(parse_number::<u16>("channels", &channels)?.max(2))
}

pub fn settings(args: &ArgMatches) -> Result<PreviewSettings, PreviewError> {
    let mut settings = PreviewSettings::default();
    if let Some(block_bytes) = one(args, "block-bytes") {
        settings.block_bytes = parse_number::<usize>("block-bytes", &block_bytes)?.max(1);
    }
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::build_cli;

    fn play_matches(argv: &[&str]) -> ArgMatches {
        let mut full = vec!["trackmix", "play"];
        full.extend_from_slice(argv);
        let matches = build_cli().try_get_matches_from(full).unwrap();
        matches.subcommand_matches("play").unwrap().clone()
    }

    #[test]
    fn routing_accepts_names_and_selectors() {
        assert_eq!(parse_routing("LEFT").unwrap(), OutputRouting::Left);
        assert_eq!(parse_routing("1").unwrap(), OutputRouting::Right);
        assert_eq!(parse_routing("5").unwrap(), OutputRouting::Paired);
        assert_eq!(parse_routing("-1").unwrap(), OutputRouting::Left);
        assert!(parse_routing("middle").is_err());
    }

    #[test]
    fn single_values_apply_to_every_track() {
        let args = play_matches(&["a.wav", "b.wav", "--output", "left", "--pan", "-0.5"]);
        let specs = track_specs(&args).unwrap();
        assert_eq!(specs.len(), 2);
        assert!(specs.iter().all(|spec| spec.routing == OutputRouting::Left));
        assert!(specs.iter().all(|spec| spec.pan == -0.5 && spec.gain == 1.0));
    }

    #[test]
    fn per_track_values_are_matched_by_position() {
        let args = play_matches(&[
            "a.wav", "b.wav", "-o", "0", "-o", "2", "-g", "0.5", "-g", "3",
        ]);
        let specs = track_specs(&args).unwrap();
        assert_eq!(specs[0].routing, OutputRouting::Left);
        assert_eq!(specs[1].routing, OutputRouting::Paired);
        assert_eq!(specs[0].gain, 0.5);
        assert_eq!(specs[1].gain, 1.0);
    }

    #[test]
    fn mismatched_counts_are_rejected() {
        let args = play_matches(&["a.wav", "b.wav", "c.wav", "-g", "0.5", "-g", "0.4"]);
        assert!(matches!(
            track_specs(&args),
            Err(PreviewError::InvalidArgument(_))
        ));
    }

    #[test]
    fn bus_and_output_options() {
        let args = play_matches(&[
            "a.wav",
            "--volume",
            "0.7",
            "--bus-pan",
            "-1",
            "--channels",
            "1",
        ]);
        assert_eq!(bus_params(&args).unwrap(), BusParams { volume: 0.7, pan: -1.0 });
        assert_eq!(channels(&args).unwrap(), 2);
        assert_eq!(settings(&args).unwrap(), PreviewSettings::default());
    }
}
