pub mod args;
pub mod tracks;
