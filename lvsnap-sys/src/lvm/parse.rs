// SPDX-License-Identifier: GPL-3.0-only

//! Typed parsing of `lvs`/`vgs` report output
//!
//! Reports are requested with `--noheadings --units b --separator <TAB>` and a
//! fixed field list, so each non-empty line is one record with a known column
//! count. A row that cannot be resolved is skipped and reported; only output
//! in which no row has the expected shape fails the whole parse.

use lvsnap_types::{LogicalVolume, Percent, VolumeGroup};
use tracing::warn;

use crate::error::{Result, SysError};

/// Fields requested from `lvs`, in column order.
pub const LV_FIELDS: [&str; 6] = [
    "vg_name",
    "lv_name",
    "lv_size",
    "origin",
    "data_percent",
    "lv_attr",
];

/// Fields requested from `vgs`, in column order.
pub const VG_FIELDS: [&str; 3] = ["vg_name", "vg_size", "vg_free"];

pub const SEPARATOR: &str = "\t";

/// A report row that was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRow {
    /// 1-based line number in the tool output
    pub line: usize,
    pub content: String,
    pub reason: String,
}

/// Records parsed from one report plus the rows that were skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parsed<T> {
    pub records: Vec<T>,
    pub malformed: Vec<MalformedRow>,
}

/// Parse `lvs` output, dropping malformed rows.
pub fn parse_lv_output(text: &str) -> Result<Vec<LogicalVolume>> {
    Ok(parse_lv_rows(text)?.records)
}

/// Parse `vgs` output, dropping malformed rows.
pub fn parse_vg_output(text: &str) -> Result<Vec<VolumeGroup>> {
    Ok(parse_vg_rows(text)?.records)
}

pub fn parse_lv_rows(text: &str) -> Result<Parsed<LogicalVolume>> {
    parse_rows("lvs", text, LV_FIELDS.len(), lv_from_columns)
}

pub fn parse_vg_rows(text: &str) -> Result<Parsed<VolumeGroup>> {
    parse_rows("vgs", text, VG_FIELDS.len(), vg_from_columns)
}

fn split_row(line: &str) -> Vec<&str> {
    // Only strip the report indent; trailing empty columns are significant.
    line.trim_matches(|c| c == ' ' || c == '\r')
        .split(SEPARATOR)
        .map(str::trim)
        .collect()
}

fn parse_rows<T>(
    report: &str,
    text: &str,
    columns: usize,
    build: impl Fn(&[&str]) -> std::result::Result<T, String>,
) -> Result<Parsed<T>> {
    let mut records = Vec::new();
    let mut malformed = Vec::new();
    let mut seen_rows = false;
    let mut well_formed = false;

    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        seen_rows = true;

        let cols = split_row(line);
        let outcome = if cols.len() == columns {
            well_formed = true;
            build(&cols)
        } else {
            Err(format!("expected {columns} fields, found {}", cols.len()))
        };

        match outcome {
            Ok(record) => records.push(record),
            Err(reason) => {
                warn!(report, line = index + 1, %reason, "skipping malformed row");
                malformed.push(MalformedRow {
                    line: index + 1,
                    content: line.to_string(),
                    reason,
                });
            }
        }
    }

    if seen_rows && !well_formed {
        return Err(SysError::Parse(format!(
            "{report}: no row has the expected {columns} fields"
        )));
    }

    Ok(Parsed { records, malformed })
}

/// Byte count as printed with `--units b`: digits with an optional `B` suffix.
fn parse_bytes(field: &str) -> Option<u64> {
    let digits = field.strip_suffix('B').unwrap_or(field);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn lv_from_columns(cols: &[&str]) -> std::result::Result<LogicalVolume, String> {
    let (vg_name, lv_name, size, origin, percent, attr) =
        (cols[0], cols[1], cols[2], cols[3], cols[4], cols[5]);

    if vg_name.is_empty() {
        return Err("empty volume group name".to_string());
    }
    if lv_name.is_empty() {
        return Err("empty logical volume name".to_string());
    }
    let size = parse_bytes(size).ok_or_else(|| format!("unparseable lv_size {size:?}"))?;

    let origin = (!origin.is_empty()).then(|| origin.to_string());
    if origin.as_deref() == Some(lv_name) {
        return Err(format!("{lv_name} names itself as origin"));
    }

    // data_percent on an ordinary volume belongs to thin pools and is not a fill level.
    let snap_percent = match (&origin, percent) {
        (Some(_), "") => None,
        (Some(_), value) => Some(
            value
                .parse::<Percent>()
                .map_err(|e| format!("data_percent: {e}"))?,
        ),
        (None, _) => None,
    };

    Ok(LogicalVolume {
        name: lv_name.to_string(),
        vg_name: vg_name.to_string(),
        size,
        origin,
        snap_percent,
        active: attr.chars().nth(4) == Some('a'),
    })
}

fn vg_from_columns(cols: &[&str]) -> std::result::Result<VolumeGroup, String> {
    let (name, size, free) = (cols[0], cols[1], cols[2]);

    if name.is_empty() {
        return Err("empty volume group name".to_string());
    }
    let size = parse_bytes(size).ok_or_else(|| format!("unparseable vg_size {size:?}"))?;
    let free = parse_bytes(free).ok_or_else(|| format!("unparseable vg_free {free:?}"))?;
    if free > size {
        return Err(format!("vg_free {free} exceeds vg_size {size}"));
    }

    Ok(VolumeGroup {
        name: name.to_string(),
        size,
        free,
    })
}
