use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::DomainError;

/// Container formats a batch run picks up, matched case-insensitively on the extension.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
    Mp3,
}

impl AudioFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "wav" => Some(Self::Wav),
            "mp3" => Some(Self::Mp3),
            _ => None,
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Whether a path names a file the normalizer and the backup should consider.
pub fn is_candidate<P: AsRef<Path>>(path: P) -> bool {
    AudioFormat::from_path(path).is_some()
}

/// Width and encoding of decoded samples.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    U8,
    S16,
    S24,
    S32,
    F32,
}

impl SampleFormat {
    pub fn from_int_bits(bits: u32) -> Result<Self, DomainError> {
        match bits {
            8 => Ok(Self::U8),
            16 => Ok(Self::S16),
            24 => Ok(Self::S24),
            32 => Ok(Self::S32),
            other => Err(DomainError::UnsupportedFormat(format!(
                "{other}-bit integer samples"
            ))),
        }
    }

    pub fn bits_per_sample(self) -> u16 {
        match self {
            Self::U8 => 8,
            Self::S16 => 16,
            Self::S24 => 24,
            Self::S32 | Self::F32 => 32,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::F32)
    }

    /// Magnitude of full scale: `2^(bits - 1)` for integer formats, 1.0 for float.
    pub fn max_amplitude(self) -> f64 {
        match self {
            Self::F32 => 1.0,
            other => f64::from(1u32 << (other.bits_per_sample() - 1)),
        }
    }
}
