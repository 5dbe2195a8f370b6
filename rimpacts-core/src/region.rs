//! Region identifiers
//!
//! Regions are keyed by fixed-width codes (for example 5-digit county FIPS codes).
//! Codes read from external tables frequently lose their leading zeros, so
//! [`RegionId::canonical`] restores the padding before any lookup.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Width of a county code
pub const COUNTY_CODE_WIDTH: usize = 5;

/// Opaque, canonical key identifying a region
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(String);

impl RegionId {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Left-pad a numeric code with zeros to `width` characters
    ///
    /// Non-numeric codes are kept unchanged.
    ///
    /// ```rust
    /// use rimpacts_core::region::RegionId;
    ///
    /// assert_eq!(RegionId::canonical("1001", 5).as_str(), "01001");
    /// assert_eq!(RegionId::canonical("national", 5).as_str(), "national");
    /// ```
    pub fn canonical(code: &str, width: usize) -> Self {
        let code = code.trim();
        if !code.is_empty() && code.len() < width && code.bytes().all(|b| b.is_ascii_digit()) {
            Self(format!("{:0>width$}", code, width = width))
        } else {
            Self(code.to_string())
        }
    }

    /// Canonical county code
    pub fn county(code: &str) -> Self {
        Self::canonical(code, COUNTY_CODE_WIDTH)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The first `n` characters of the code
    pub fn prefix(&self, n: usize) -> Option<RegionId> {
        self.0.get(..n).map(RegionId::new)
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RegionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RegionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for RegionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for RegionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
