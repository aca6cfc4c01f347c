//! Storage quantity parsing and representation.
//!
//! Supports Kubernetes-style storage quantities:
//! - Binary: "128Ki", "512Mi", "1Gi", "2Ti"
//! - Decimal: "128k", "500M", "1G", "2T"
//! - Plain byte counts: "1048576"

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{PalisadeError, PalisadeResult};

const KI: u64 = 1024;
const MI: u64 = 1024 * KI;
const GI: u64 = 1024 * MI;
const TI: u64 = 1024 * GI;

/// A storage quantity in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ResourceQuantity {
    bytes: u64,
}

impl ResourceQuantity {
    /// Create a quantity from bytes.
    #[must_use]
    pub const fn from_bytes(bytes: u64) -> Self {
        Self { bytes }
    }

    /// Create a quantity from mebibytes (MiB).
    #[must_use]
    pub const fn from_mebibytes(mib: u64) -> Self {
        Self { bytes: mib * MI }
    }

    /// Create a quantity from gibibytes (GiB).
    #[must_use]
    pub const fn from_gibibytes(gib: u64) -> Self {
        Self { bytes: gib * GI }
    }

    /// The value in bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> u64 {
        self.bytes
    }

    /// Parse a quantity string.
    pub fn parse(s: &str) -> PalisadeResult<Self> {
        let s = s.trim();
        let invalid = || PalisadeError::InvalidResourceQuantity {
            value: s.to_string(),
        };

        let suffixes = [
            ("Ki", KI),
            ("Mi", MI),
            ("Gi", GI),
            ("Ti", TI),
            ("k", 1000u64),
            ("M", 1000 * 1000),
            ("G", 1000 * 1000 * 1000),
            ("T", 1000 * 1000 * 1000 * 1000),
        ];

        for (suffix, multiplier) in suffixes {
            if let Some(stripped) = s.strip_suffix(suffix) {
                let value: u64 = stripped.parse().map_err(|_| invalid())?;
                let bytes = value.checked_mul(multiplier).ok_or_else(invalid)?;
                return Ok(Self::from_bytes(bytes));
            }
        }

        let bytes: u64 = s.parse().map_err(|_| invalid())?;
        Ok(Self::from_bytes(bytes))
    }
}

impl fmt::Display for ResourceQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.bytes;
        if v >= TI && v % TI == 0 {
            write!(f, "{}Ti", v / TI)
        } else if v >= GI && v % GI == 0 {
            write!(f, "{}Gi", v / GI)
        } else if v >= MI && v % MI == 0 {
            write!(f, "{}Mi", v / MI)
        } else if v >= KI && v % KI == 0 {
            write!(f, "{}Ki", v / KI)
        } else {
            write!(f, "{v}")
        }
    }
}

impl FromStr for ResourceQuantity {
    type Err = PalisadeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ResourceQuantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ResourceQuantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
