use std::path::PathBuf;

use thiserror::Error;

/// Failures at the codec boundary. Decode variants leave the file untouched;
/// encode variants never leave a partially written file behind.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to open {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: symphonia::core::errors::Error,
    },
    #[error("no decodable audio track in {path:?}")]
    NoTrack { path: PathBuf },
    #[error("unsupported samples in {path:?}: {reason}")]
    UnsupportedSamples { path: PathBuf, reason: String },
    #[error("failed to encode {path:?}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },
    #[error("failed to replace {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode {path:?} as mp3: {reason}")]
    Mp3 { path: PathBuf, reason: String },
}

impl CodecError {
    /// True when the failure happened while reading, before any write was attempted.
    pub fn is_decode(&self) -> bool {
        matches!(
            self,
            Self::Open { .. }
                | Self::Decode { .. }
                | Self::NoTrack { .. }
                | Self::UnsupportedSamples { .. }
        )
    }
}
