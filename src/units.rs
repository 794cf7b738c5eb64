//! Human-readable scaling of counts and rates.

use std::{fmt, str::FromStr};

use compact_str::{CompactString, format_compact};

use crate::error::Error;

/// How counts are abbreviated on screen.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum UnitScale {
    /// Plain integers.
    #[default]
    None,
    /// Decimal thousands: `K`, `M`, `B`, `T`.
    Kmg,
    /// Binary multiples for bytes: `KiB`, `MiB`, `GiB`, ...
    Binary,
}

const KMG: (f64, &[&str]) = (1000.0, &["", "K", "M", "B", "T"]);
const BINARY: (f64, &[&str]) = (1024.0, &["", "KiB", "MiB", "GiB", "TiB", "PiB"]);

impl UnitScale {
    /// Formats a count, e.g. `1.5K` or `12.0MiB`.
    #[must_use]
    pub fn format_count(self, n: f64) -> CompactString {
        let (base, suffixes) = match self {
            Self::None => return format_compact!("{n:.0}"),
            Self::Kmg => KMG,
            Self::Binary => BINARY,
        };

        let mut n = n;
        let mut idx = 0;
        while n.abs() >= base && idx + 1 < suffixes.len() {
            n /= base;
            idx += 1;
        }
        if idx == 0 {
            format_compact!("{n:.0}")
        } else {
            format_compact!("{n:.1}{}", suffixes[idx])
        }
    }

    /// Formats a per-second rate. Unscaled rates keep one decimal.
    #[must_use]
    pub fn format_rate(self, rate: f64) -> CompactString {
        match self {
            Self::None => format_compact!("{rate:.1}"),
            _ => self.format_count(rate),
        }
    }
}

impl FromStr for UnitScale {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "kmg" => Ok(Self::Kmg),
            "binary" => Ok(Self::Binary),
            other => Err(Error::UnknownUnitScale(other.into())),
        }
    }
}

impl fmt::Display for UnitScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Kmg => "kmg",
            Self::Binary => "binary",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::UnitScale;

    /// Unscaled
    /// Counts print as integers and rates with one decimal.
    #[test]
    fn test_none() {
        assert_eq!(UnitScale::None.format_count(1234.0), "1234");
        assert_eq!(UnitScale::None.format_rate(12.345), "12.3");
    }

    /// Decimal Suffixes
    #[test]
    fn test_kmg() {
        assert_eq!(UnitScale::Kmg.format_count(999.0), "999");
        assert_eq!(UnitScale::Kmg.format_count(1500.0), "1.5K");
        assert_eq!(UnitScale::Kmg.format_count(2_500_000.0), "2.5M");
        assert_eq!(UnitScale::Kmg.format_count(3e9), "3.0B");
        assert_eq!(UnitScale::Kmg.format_count(5e15), "5000.0T");
    }

    /// Binary Suffixes
    #[test]
    fn test_binary() {
        assert_eq!(UnitScale::Binary.format_count(1023.0), "1023");
        assert_eq!(UnitScale::Binary.format_count(1536.0), "1.5KiB");
        assert_eq!(UnitScale::Binary.format_count(1024.0 * 1024.0 * 12.0), "12.0MiB");
    }

    /// Parsing
    #[test]
    fn test_parse() {
        assert_eq!("binary".parse::<UnitScale>().unwrap(), UnitScale::Binary);
        assert!("metric".parse::<UnitScale>().is_err());
    }
}
