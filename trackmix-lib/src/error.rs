use std::fmt::{Display, Formatter};

/// Error type for opening sources, validating sessions and driving output.
#[derive(Debug)]
pub enum PreviewError {
    Io(std::io::Error),
    InvalidFormat(String),
    Unsupported(String),
    NoTracks,
    FormatMismatch(String),
    InvalidArgument(String),
    Device(String),
    Config(String),
}

impl Display for PreviewError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io error: {}", err),
            Self::InvalidFormat(err) => write!(f, "invalid wav: {}", err),
            Self::Unsupported(err) => write!(f, "unsupported format: {}", err),
            Self::NoTracks => write!(f, "no tracks to preview"),
            Self::FormatMismatch(err) => write!(f, "track format mismatch: {}", err),
            Self::InvalidArgument(err) => write!(f, "invalid argument: {}", err),
            Self::Device(err) => write!(f, "output device error: {}", err),
            Self::Config(err) => write!(f, "config error: {}", err),
        }
    }
}

impl std::error::Error for PreviewError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PreviewError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for PreviewError {
    fn from(value: serde_json::Error) -> Self {
        Self::Config(value.to_string())
    }
}

impl From<hound::Error> for PreviewError {
    fn from(value: hound::Error) -> Self {
        match value {
            hound::Error::IoError(err) => Self::Io(err),
            other => Self::Device(other.to_string()),
        }
    }
}
