use std::fmt::{Display, Formatter};

use crate::error::PreviewError;
use crate::pcm::SampleEncoding;

/// Why a tempo could not be estimated.
#[derive(Debug)]
pub enum TempoError {
    Source(PreviewError),
    UnsupportedEncoding {
        encoding: SampleEncoding,
        bits_per_sample: u16,
    },
    TooShort {
        seconds: f64,
        required: f64,
    },
    Silent,
}

impl Display for TempoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Source(err) => write!(f, "cannot read audio: {}", err),
            Self::UnsupportedEncoding {
                encoding,
                bits_per_sample,
            } => write!(f, "unsupported sample layout: {}-bit {:?}", bits_per_sample, encoding),
            Self::TooShort { seconds, required } => {
                write!(f, "audio too short: {:.2}s, need {:.2}s", seconds, required)
            }
            Self::Silent => write!(f, "envelope has no variation"),
        }
    }
}

impl std::error::Error for TempoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Source(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PreviewError> for TempoError {
    fn from(value: PreviewError) -> Self {
        Self::Source(value)
    }
}
