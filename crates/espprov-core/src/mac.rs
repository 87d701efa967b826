//! Device MAC address handling
//!
//! The licensing service identifies a device by its network MAC address,
//! normalized to 12 lowercase hex characters with no separators. esptool
//! prints MACs as `AA:BB:CC:DD:EE:FF`, so parsing strips separators and
//! lowercases before validating.

use crate::error::{Error, Result};
use core::fmt;
use core::str::FromStr;

/// A normalized device MAC address (12 lowercase hex characters)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MacAddr(String);

impl MacAddr {
    /// Parse a MAC address from text, accepting `:`/`-`/space separators
    /// and mixed case.
    ///
    /// Returns [`Error::InvalidMac`] if the input does not normalize to
    /// exactly 12 hex digits.
    pub fn parse(input: &str) -> Result<Self> {
        let normalized: String = input
            .trim()
            .chars()
            .filter(|c| !matches!(c, ':' | '-' | ' '))
            .map(|c| c.to_ascii_lowercase())
            .collect();

        if normalized.len() != 12 || !normalized.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::InvalidMac(input.to_string()));
        }

        Ok(Self(normalized))
    }

    /// The normalized form, e.g. `cc8da20bf278`
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MacAddr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
