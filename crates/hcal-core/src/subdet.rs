//! HCAL subdetectors.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One of the HCAL partitions with digis in nanoAOD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Subdetector {
    /// Barrel
    HB,
    /// Endcap
    HE,
    /// Forward
    HF,
}

impl Subdetector {
    pub const ALL: [Self; 3] = [Self::HB, Self::HE, Self::HF];

    /// Number of time slices read out per digi.
    pub const fn n_ts(self) -> usize {
        match self {
            Self::HB | Self::HE => 8,
            Self::HF => 3,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HB => "HB",
            Self::HE => "HE",
            Self::HF => "HF",
        }
    }
}

impl fmt::Display for Subdetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Subdetector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "HB" => Ok(Self::HB),
            "HE" => Ok(Self::HE),
            "HF" => Ok(Self::HF),
            other => Err(Error::Validation(format!("unknown subdetector '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_slices_per_subdetector() {
        assert_eq!(Subdetector::HB.n_ts(), 8);
        assert_eq!(Subdetector::HE.n_ts(), 8);
        assert_eq!(Subdetector::HF.n_ts(), 3);
    }

    #[test]
    fn parse_and_display() {
        assert_eq!("hf".parse::<Subdetector>().unwrap(), Subdetector::HF);
        assert_eq!(Subdetector::HE.to_string(), "HE");
        assert!("HO".parse::<Subdetector>().is_err());
    }
}
