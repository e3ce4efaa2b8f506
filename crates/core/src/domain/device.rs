// Device identifiers and the pattern that extracts them from scan output

use regex::Regex;
use serde::Deserialize;
use std::fmt;

/// Identifier of a discoverable device, as printed by the control shell
/// (canonically a colon-separated address such as `AA:BB:CC:DD:EE:01`).
///
/// Opaque: nothing beyond the pattern match is validated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Compiled device-identifier pattern.
///
/// Deserialises from the raw pattern string, so an invalid expression is
/// rejected while the settings are loaded rather than at first scan.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "String")]
pub struct DevicePattern(Regex);

impl DevicePattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self)
    }

    /// Extract every identifier from `text`, in order of first appearance.
    ///
    /// Duplicates are kept. When the pattern has capture groups the first
    /// group is the identifier (an unmatched group yields an empty string);
    /// otherwise the whole match is.
    pub fn extract(&self, text: &str) -> Vec<DeviceId> {
        if self.0.captures_len() > 1 {
            self.0
                .captures_iter(text)
                .map(|caps| DeviceId::new(caps.get(1).map_or("", |m| m.as_str())))
                .collect()
        } else {
            self.0
                .find_iter(text)
                .map(|m| DeviceId::new(m.as_str()))
                .collect()
        }
    }
}

impl TryFrom<String> for DevicePattern {
    type Error = regex::Error;

    fn try_from(pattern: String) -> Result<Self, Self::Error> {
        Self::new(&pattern)
    }
}
