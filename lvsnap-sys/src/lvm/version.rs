// SPDX-License-Identifier: GPL-3.0-only

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Newest LVM release this tool has been exercised against.
pub const TESTED_LVM_VERSION: &str = "2.3.30";

/// Dotted LVM release number, compared component-wise.
///
/// `2.03.16(2)` parses to `[2, 3, 16]`; non-numeric components keep their
/// digits or become 0.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LvmVersion(Vec<u32>);

impl LvmVersion {
    pub fn parse(text: &str) -> Self {
        let release = text.split('(').next().unwrap_or_default().trim();
        let parts = release
            .split('.')
            .map(|part| {
                part.parse::<u32>().unwrap_or_else(|_| {
                    let digits: String = part.chars().filter(char::is_ascii_digit).collect();
                    digits.parse().unwrap_or(0)
                })
            })
            .collect();
        Self(parts)
    }

    pub fn components(&self) -> &[u32] {
        &self.0
    }
}

impl PartialOrd for LvmVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LvmVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl FromStr for LvmVersion {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for LvmVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(u32::to_string).collect();
        f.write_str(&parts.join("."))
    }
}

/// Extract the release from `lvm version` output.
pub fn parse_version_output(output: &str) -> Option<LvmVersion> {
    output.lines().find_map(|line| {
        let value = line.trim_start().strip_prefix("LVM version:")?;
        let release = value.split_whitespace().next()?;
        Some(LvmVersion::parse(release))
    })
}
