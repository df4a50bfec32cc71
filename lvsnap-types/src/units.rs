// SPDX-License-Identifier: GPL-3.0-only

//! Fixed-point quantities shared across the stack
//!
//! LVM reports percentages with two decimals and sizes in binary units. Both are
//! kept as integer hundredths so repeated calculations on the same input always
//! produce the same output.

use std::fmt;
use std::str::FromStr;

use num_format::{Locale, ToFormattedString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One MiB, the binary megabyte the LVM tools use.
pub const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("not a decimal number: {0:?}")]
    NotDecimal(String),

    #[error("percentage out of range: {0:?}")]
    OutOfRange(String),
}

/// Parse a non-negative decimal into an integer scaled by `10^decimals`.
///
/// Digits beyond `decimals` are truncated. A comma is accepted as the decimal
/// separator since some locales print it.
pub(crate) fn parse_scaled(text: &str, decimals: u32) -> Option<u128> {
    let text = text.trim();
    let (whole, fraction) = match text.split_once(['.', ',']) {
        Some((whole, fraction)) => (whole, fraction),
        None => (text, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }

    let scale = 10u128.checked_pow(decimals)?;
    let whole_value: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().ok()?
    };

    let mut fraction_value: u128 = 0;
    let mut place = scale;
    for digit in fraction.bytes().take(decimals as usize) {
        place /= 10;
        fraction_value += u128::from(digit - b'0') * place;
    }

    whole_value.checked_mul(scale)?.checked_add(fraction_value)
}

/// A percentage in hundredths (`4500` is 45.00%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Percent(u32);

impl Percent {
    pub const ZERO: Percent = Percent(0);
    pub const FULL: Percent = Percent(10_000);

    pub fn from_hundredths(hundredths: u32) -> Self {
        Self(hundredths)
    }

    pub fn hundredths(self) -> u32 {
        self.0
    }
}

impl FromStr for Percent {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_end_matches('%');
        let scaled =
            parse_scaled(trimmed, 2).ok_or_else(|| ValueError::NotDecimal(s.to_string()))?;
        if scaled > u128::from(Self::FULL.0) {
            return Err(ValueError::OutOfRange(s.to_string()));
        }
        Ok(Self(scaled as u32))
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

/// A quantity of MiB in hundredths, truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mebibytes(u64);

impl Mebibytes {
    pub fn from_hundredths(hundredths: u64) -> Self {
        Self(hundredths)
    }

    pub fn from_bytes(bytes: u64) -> Self {
        Self(((bytes as u128 * 100) / MIB as u128) as u64)
    }

    /// `percent` of `bytes`, converted to MiB with a single truncation.
    pub fn share_of(bytes: u64, percent: Percent) -> Self {
        let hundredths = (bytes as u128 * u128::from(percent.hundredths())) / (100 * MIB as u128);
        Self(hundredths as u64)
    }

    pub fn hundredths(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Mebibytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// Convert bytes to human-readable format (e.g., "1.50 GB")
pub fn bytes_to_pretty(bytes: u64, add_bytes: bool) -> String {
    let mut steps = 0;
    let mut val = bytes as f64;

    while val >= 1024. && steps < 6 {
        val /= 1024.;
        steps += 1;
    }

    let unit = match steps {
        0 => "B",
        1 => "KB",
        2 => "MB",
        3 => "GB",
        4 => "TB",
        5 => "PB",
        _ => "EB",
    };

    if add_bytes {
        format!(
            "{:.2} {} ({} bytes)",
            val,
            unit,
            bytes.to_formatted_string(&Locale::en)
        )
    } else {
        format!("{:.2} {}", val, unit)
    }
}
