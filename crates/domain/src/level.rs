use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::DomainError;

/// Converts a gain in decibels into the factor applied to each sample.
pub fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

/// Converts an amplitude ratio into decibels. A ratio of zero is negative infinity.
pub fn linear_to_db(ratio: f64) -> f64 {
    if ratio <= 0.0 {
        f64::NEG_INFINITY
    } else {
        20.0 * ratio.log10()
    }
}

/// Peak level a batch run normalizes every file to, in dBFS.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, PartialOrd)]
pub struct TargetLevel {
    dbfs: f64,
}

impl TargetLevel {
    pub fn new(dbfs: f64) -> Result<Self, DomainError> {
        if !dbfs.is_finite() {
            return Err(DomainError::validation("target level must be a finite number"));
        }
        Ok(Self { dbfs })
    }

    pub fn dbfs(&self) -> f64 {
        self.dbfs
    }

    /// Gain that moves `peak_dbfs` onto the target. `None` for silent (non-finite) peaks.
    pub fn required_gain(&self, peak_dbfs: f64) -> Option<f64> {
        peak_dbfs.is_finite().then(|| self.dbfs - peak_dbfs)
    }

    /// Integer sample formats clip when the target is above full scale.
    pub fn exceeds_full_scale(&self) -> bool {
        self.dbfs > 0.0
    }
}

impl FromStr for TargetLevel {
    type Err = DomainError;

    /// Accepts `-3dB` as well as a bare `-3`.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = || DomainError::InvalidLevel {
            input: input.to_string(),
        };
        let number = input.replace("dB", "");
        let dbfs: f64 = number.trim().parse().map_err(|_| invalid())?;
        Self::new(dbfs).map_err(|_| invalid())
    }
}

impl fmt::Display for TargetLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}dB", self.dbfs)
    }
}
