// SPDX-License-Identifier: GPL-3.0-only

//! Validated inputs for snapshot creation
//!
//! Both types only exist in a form that is safe to hand to `lvcreate` as a
//! discrete argument.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::units::parse_scaled;

/// Create-size choices offered by default.
pub const SIZE_PRESETS: [&str; 5] = ["100M", "500M", "1G", "5G", "10G"];

const MAX_NAME_LEN: usize = 127;
const RESERVED_PREFIXES: [&str; 2] = ["snapshot", "pvmove"];
const RESERVED_INFIXES: [&str; 11] = [
    "_cdata", "_cmeta", "_corig", "_mlog", "_mimage", "_pmspare", "_rimage", "_rmeta", "_tdata",
    "_tmeta", "_vorigin",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("snapshot name is empty")]
    Empty,

    #[error("snapshot name is longer than 127 characters")]
    TooLong,

    #[error("snapshot name must not contain a path separator")]
    PathSeparator,

    #[error("snapshot name must not start with '-'")]
    LeadingDash,

    #[error("snapshot name contains invalid character {0:?}")]
    InvalidChar(char),

    #[error("snapshot name {0:?} is reserved by LVM")]
    Reserved(String),
}

/// A logical volume name acceptable to `lvcreate -n`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SnapshotName(String);

impl SnapshotName {
    pub fn parse(value: &str) -> Result<Self, NameError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(NameError::Empty);
        }
        if value.len() > MAX_NAME_LEN {
            return Err(NameError::TooLong);
        }
        if value.contains('/') || value.contains('\\') {
            return Err(NameError::PathSeparator);
        }
        if value.starts_with('-') {
            return Err(NameError::LeadingDash);
        }
        if let Some(c) = value
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '+' | '_' | '.' | '-')))
        {
            return Err(NameError::InvalidChar(c));
        }
        if value == "." || value == ".." {
            return Err(NameError::Reserved(value.to_string()));
        }
        if RESERVED_PREFIXES.iter().any(|p| value.starts_with(p))
            || RESERVED_INFIXES.iter().any(|s| value.contains(s))
        {
            return Err(NameError::Reserved(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SnapshotName {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SnapshotName> for String {
    fn from(value: SnapshotName) -> Self {
        value.0
    }
}

impl fmt::Display for SnapshotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SizeError {
    #[error("snapshot size is empty")]
    Empty,

    #[error("snapshot size {0:?} has no unit (use K, M, G, T, P or E)")]
    MissingUnit(String),

    #[error("snapshot size {0:?} has an unrecognized unit")]
    UnknownUnit(String),

    #[error("snapshot size {0:?} is not a number")]
    NotNumeric(String),

    #[error("snapshot size {0:?} has more than six significant decimal places")]
    TooPrecise(String),

    #[error("snapshot size must be greater than zero")]
    Zero,
}

/// Binary size units accepted by `lvcreate -L`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SizeUnit {
    Kibi,
    Mebi,
    Gibi,
    Tebi,
    Pebi,
    Exbi,
}

impl SizeUnit {
    fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'K' => Some(Self::Kibi),
            'M' => Some(Self::Mebi),
            'G' => Some(Self::Gibi),
            'T' => Some(Self::Tebi),
            'P' => Some(Self::Pebi),
            'E' => Some(Self::Exbi),
            _ => None,
        }
    }

    pub fn suffix(self) -> char {
        match self {
            Self::Kibi => 'K',
            Self::Mebi => 'M',
            Self::Gibi => 'G',
            Self::Tebi => 'T',
            Self::Pebi => 'P',
            Self::Exbi => 'E',
        }
    }

    pub fn multiplier(self) -> u128 {
        let exponent = match self {
            Self::Kibi => 1,
            Self::Mebi => 2,
            Self::Gibi => 3,
            Self::Tebi => 4,
            Self::Pebi => 5,
            Self::Exbi => 6,
        };
        1024u128.pow(exponent)
    }
}

/// Decimal places kept from a size amount.
const SIZE_DECIMALS: u32 = 6;

/// A positive size with an explicit binary unit, e.g. `500M` or `1.5G`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SnapshotSize {
    /// Number as written, without unit
    amount: String,
    unit: SizeUnit,
}

impl SnapshotSize {
    pub fn parse(value: &str) -> Result<Self, SizeError> {
        let value = value.trim();
        let Some(last) = value.chars().last() else {
            return Err(SizeError::Empty);
        };

        if last.is_ascii_digit() {
            return Err(SizeError::MissingUnit(value.to_string()));
        }
        let unit =
            SizeUnit::from_char(last).ok_or_else(|| SizeError::UnknownUnit(value.to_string()))?;

        let amount = &value[..value.len() - last.len_utf8()];
        if amount.is_empty() || amount.contains(',') || amount.matches('.').count() > 1 {
            return Err(SizeError::NotNumeric(value.to_string()));
        }
        let scaled = parse_scaled(amount, SIZE_DECIMALS)
            .ok_or_else(|| SizeError::NotNumeric(value.to_string()))?;
        let dropped = amount
            .split_once('.')
            .map(|(_, fraction)| fraction.get(SIZE_DECIMALS as usize..).unwrap_or(""))
            .unwrap_or("");
        if dropped.bytes().any(|b| b != b'0') {
            return Err(SizeError::TooPrecise(value.to_string()));
        }
        if scaled == 0 {
            return Err(SizeError::Zero);
        }

        Ok(Self {
            amount: amount.to_string(),
            unit,
        })
    }

    pub fn unit(&self) -> SizeUnit {
        self.unit
    }

    /// Requested size in bytes, truncated.
    pub fn bytes(&self) -> u64 {
        let scaled = parse_scaled(&self.amount, SIZE_DECIMALS).unwrap_or(0);
        let bytes = scaled.saturating_mul(self.unit.multiplier()) / 1_000_000;
        u64::try_from(bytes).unwrap_or(u64::MAX)
    }

    /// Argument for `lvcreate -L`.
    pub fn as_arg(&self) -> String {
        format!("{}{}", self.amount, self.unit.suffix())
    }
}

impl FromStr for SnapshotSize {
    type Err = SizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SnapshotSize {
    type Error = SizeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SnapshotSize> for String {
    fn from(value: SnapshotSize) -> Self {
        value.as_arg()
    }
}

impl fmt::Display for SnapshotSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_arg())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_lvm_names() {
        for name in ["backup", "root_snap.1", "a+b-c", "home-2024"] {
            assert!(SnapshotName::parse(name).is_ok(), "{name}");
        }
        assert_eq!(SnapshotName::parse("  daily ").unwrap().as_str(), "daily");
    }

    #[test]
    fn rejects_unsafe_names() {
        assert_eq!(SnapshotName::parse(""), Err(NameError::Empty));
        assert_eq!(SnapshotName::parse("   "), Err(NameError::Empty));
        assert_eq!(SnapshotName::parse("vg/snap"), Err(NameError::PathSeparator));
        assert_eq!(SnapshotName::parse("--force"), Err(NameError::LeadingDash));
        assert_eq!(
            SnapshotName::parse("snap shot"),
            Err(NameError::InvalidChar(' '))
        );
        assert_eq!(
            SnapshotName::parse("a;rm"),
            Err(NameError::InvalidChar(';'))
        );
        assert!(matches!(
            SnapshotName::parse(".."),
            Err(NameError::Reserved(_))
        ));
        assert!(matches!(
            SnapshotName::parse("snapshot1"),
            Err(NameError::Reserved(_))
        ));
        assert!(matches!(
            SnapshotName::parse("data_tmeta"),
            Err(NameError::Reserved(_))
        ));
        assert_eq!(
            SnapshotName::parse(&"x".repeat(128)),
            Err(NameError::TooLong)
        );
    }

    #[test]
    fn presets_are_valid_sizes() {
        for preset in SIZE_PRESETS {
            let size = SnapshotSize::parse(preset).expect("preset parses");
            assert_eq!(size.as_arg(), preset);
        }
    }

    #[test]
    fn size_conversions() {
        assert_eq!(SnapshotSize::parse("100M").unwrap().bytes(), 100 * 1024 * 1024);
        assert_eq!(
            SnapshotSize::parse("1.5g").unwrap().bytes(),
            1536 * 1024 * 1024
        );
        assert_eq!(SnapshotSize::parse("1.5g").unwrap().as_arg(), "1.5G");
        assert_eq!(SnapshotSize::parse(".5K").unwrap().bytes(), 512);
    }

    #[test]
    fn size_rejects_bad_input() {
        assert_eq!(SnapshotSize::parse(""), Err(SizeError::Empty));
        assert!(matches!(
            SnapshotSize::parse("100"),
            Err(SizeError::MissingUnit(_))
        ));
        assert!(matches!(
            SnapshotSize::parse("100X"),
            Err(SizeError::UnknownUnit(_))
        ));
        assert!(matches!(
            SnapshotSize::parse("-5G"),
            Err(SizeError::NotNumeric(_))
        ));
        assert!(matches!(
            SnapshotSize::parse("1.2.3G"),
            Err(SizeError::NotNumeric(_))
        ));
        assert!(matches!(
            SnapshotSize::parse("0.0000001G"),
            Err(SizeError::TooPrecise(_))
        ));
        assert!(matches!(
            SnapshotSize::parse("1.0000005M"),
            Err(SizeError::TooPrecise(_))
        ));
        assert_eq!(SnapshotSize::parse("0.0000000G"), Err(SizeError::Zero));
        assert_eq!(
            SnapshotSize::parse("0.5000000G").unwrap().bytes(),
            512 * 1024 * 1024
        );
        assert!(matches!(
            SnapshotSize::parse("1MG"),
            Err(SizeError::NotNumeric(_))
        ));
        assert!(matches!(
            SnapshotSize::parse("G"),
            Err(SizeError::NotNumeric(_))
        ));
        assert_eq!(SnapshotSize::parse("0M"), Err(SizeError::Zero));
        assert_eq!(SnapshotSize::parse("0.0G"), Err(SizeError::Zero));
    }

    #[test]
    fn serde_revalidates() {
        let size: SnapshotSize = serde_json::from_str("\"5G\"").unwrap();
        assert_eq!(size.as_arg(), "5G");
        assert!(serde_json::from_str::<SnapshotSize>("\"5\"").is_err());
        assert!(serde_json::from_str::<SnapshotName>("\"a/b\"").is_err());
    }
}
