//! CLI argument definitions for `trackmix`.

use clap::{Arg, ArgAction, Command};

fn track_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("FILES")
                .help("16-bit PCM WAV files to mix")
                .required(true)
                .num_args(1..),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .value_name("SEL")
                .action(ArgAction::Append)
                .help("Routing per track: left|right|paired or 0|1|2 (one value applies to all)"),
        )
        .arg(
            Arg::new("gain")
                .long("gain")
                .short('g')
                .value_name("GAIN")
                .action(ArgAction::Append)
                .help("Gain per track, 0.0-1.0 (one value applies to all)"),
        )
        .arg(
            Arg::new("pan")
                .long("pan")
                .short('p')
                .value_name("PAN")
                .action(ArgAction::Append)
                .allow_negative_numbers(true)
                .help("Pan per paired track, -1.0-1.0 (one value applies to all)"),
        )
        .arg(
            Arg::new("channels")
                .long("channels")
                .short('c')
                .value_name("COUNT")
                .default_value("2")
                .help("Output channel count (at least 2)"),
        )
        .arg(
            Arg::new("volume")
                .long("volume")
                .value_name("VOLUME")
                .default_value("1.0")
                .help("Bus volume, 0.0-1.0"),
        )
        .arg(
            Arg::new("bus-pan")
                .long("bus-pan")
                .value_name("PAN")
                .default_value("0.0")
                .allow_negative_numbers(true)
                .help("Bus balance, -1.0-1.0"),
        )
        .arg(
            Arg::new("block-bytes")
                .long("block-bytes")
                .value_name("BYTES")
                .help("Raw bytes read per track and mix cycle"),
        )
}

/// Build the CLI argument parser and command definitions.
pub fn build_cli() -> Command {
    Command::new("trackmix")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Preview, render and analyse multitrack WAV sessions")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            track_args(Command::new("play").about("Play tracks through an output device"))
                .arg(
                    Arg::new("device")
                        .long("device")
                        .short('d')
                        .value_name("INDEX")
                        .default_value("0")
                        .help("1-based index from `trackmix devices`, 0 for the default output"),
                )
                .arg(
                    Arg::new("quiet")
                        .long("quiet")
                        .short('q')
                        .action(ArgAction::SetTrue)
                        .help("Play without the terminal UI"),
                ),
        )
        .subcommand(
            Command::new("session")
                .about("Play a session described by a JSON file")
                .arg(
                    Arg::new("CONFIG")
                        .help("Path to the session JSON")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("quiet")
                        .long("quiet")
                        .short('q')
                        .action(ArgAction::SetTrue)
                        .help("Play without the terminal UI"),
                ),
        )
        .subcommand(
            track_args(Command::new("render").about("Mix tracks offline into a WAV file")).arg(
                Arg::new("out")
                    .long("out")
                    .value_name("PATH")
                    .required(true)
                    .help("Destination WAV file"),
            ),
        )
        .subcommand(
            Command::new("tempo")
                .about("Estimate the tempo of a WAV file and print it as JSON")
                .arg(
                    Arg::new("INPUT")
                        .help("16/24-bit PCM or 32-bit float WAV file")
                        .required(true)
                        .index(1),
                ),
        )
        .subcommand(
            Command::new("devices")
                .about("List output devices")
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the list as JSON"),
                ),
        )
}
