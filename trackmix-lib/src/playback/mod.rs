//! Multitrack preview engine.

mod controls;
mod mix;
mod previewer;
mod routing;
mod session;
mod worker;

pub use controls::{BusParams, ControlSnapshot, LiveControls};
pub use previewer::{OutputRequest, Previewer};
pub use routing::{
    balance_gains, clamp_gain, clamp_pan, equal_power_gains, OutputRouting, TrackSpec,
};
pub use session::{MixSession, SessionEnd};
