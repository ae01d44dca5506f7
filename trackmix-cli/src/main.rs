//! # Trackmix
//!
//! Preview, render and analyse multitrack WAV sessions from the terminal.

use log::error;

mod cli;
mod controls;
mod logging;
mod runner;
mod ui;

fn main() {
    let args = cli::args::build_cli().get_matches();
    let interactive = runner::is_interactive(&args);
    let log_buffer = logging::init(!interactive);

    let code = match runner::run(&args, log_buffer) {
        Ok(code) => code,
        Err(err) => {
            error!("{}", err.to_string().to_lowercase());
            -1
        }
    };

    std::process::exit(code)
}
