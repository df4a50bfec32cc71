// SPDX-License-Identifier: GPL-3.0-only

//! Derived capacity figures
//!
//! Computed on request from a [`StateSnapshot`]; nothing here is cached.

use std::fmt;

use lvsnap_types::{LogicalVolume, Mebibytes, Percent, StateSnapshot, VolumeGroup};
use serde::Serialize;

/// Fill level of a snapshot's copy-on-write area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SnapshotUsage {
    /// `None` when the tool reports no value
    pub percent: Option<Percent>,
    pub used_mb: Option<Mebibytes>,
    pub size_mb: Mebibytes,
}

impl SnapshotUsage {
    pub fn is_known(&self) -> bool {
        self.percent.is_some()
    }
}

/// Capacity of the volume group backing an ordinary volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupUsage {
    pub vg_name: String,
    pub used_mb: Mebibytes,
    pub free_mb: Mebibytes,
    pub size_mb: Mebibytes,
    pub percent: Percent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VolumeUsage {
    Snapshot(SnapshotUsage),
    Group(GroupUsage),
    /// Ordinary volume whose group is absent from the listing.
    Unknown,
}

/// Usage of a snapshot, or `None` for an ordinary volume.
pub fn snapshot_usage(volume: &LogicalVolume) -> Option<SnapshotUsage> {
    if !volume.is_snapshot() {
        return None;
    }
    let percent = volume.snap_percent;
    Some(SnapshotUsage {
        percent,
        used_mb: percent.map(|p| Mebibytes::share_of(volume.size, p)),
        size_mb: volume.size_mb(),
    })
}

pub fn group_usage(group: &VolumeGroup) -> GroupUsage {
    GroupUsage {
        vg_name: group.name.clone(),
        used_mb: group.used_mb(),
        free_mb: group.free_mb(),
        size_mb: group.size_mb(),
        percent: group.usage_percent(),
    }
}

/// Snapshots report their own fill level; ordinary volumes fall back to their group.
pub fn volume_usage(state: &StateSnapshot, volume: &LogicalVolume) -> VolumeUsage {
    if let Some(usage) = snapshot_usage(volume) {
        return VolumeUsage::Snapshot(usage);
    }
    state
        .group_of(volume)
        .map(|group| VolumeUsage::Group(group_usage(group)))
        .unwrap_or(VolumeUsage::Unknown)
}

impl fmt::Display for VolumeUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Snapshot(SnapshotUsage {
                percent: Some(percent),
                used_mb: Some(used),
                size_mb,
            }) => write!(f, "Snapshot Usage: {percent} ({used} MB / {size_mb} MB)"),
            Self::Snapshot(_) => f.write_str("Snapshot Usage: Unknown"),
            Self::Group(group) => write!(
                f,
                "VG Usage: {} ({} MB used / {} MB free / {} MB total)",
                group.percent, group.used_mb, group.free_mb, group.size_mb
            ),
            Self::Unknown => f.write_str("VG Free Space: Unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lvsnap_types::MIB;

    fn snapshot(percent: Option<u32>) -> LogicalVolume {
        LogicalVolume {
            name: "home_snap".to_string(),
            vg_name: "vg0".to_string(),
            size: 1024 * MIB,
            origin: Some("home".to_string()),
            snap_percent: percent.map(Percent::from_hundredths),
            active: true,
        }
    }

    fn ordinary(vg: &str) -> LogicalVolume {
        LogicalVolume {
            name: "home".to_string(),
            vg_name: vg.to_string(),
            size: 512 * MIB,
            origin: None,
            snap_percent: None,
            active: true,
        }
    }

    #[test]
    fn snapshot_usage_is_deterministic() {
        let volume = snapshot(Some(4500));
        let first = snapshot_usage(&volume).unwrap();
        assert_eq!(first.used_mb.unwrap().to_string(), "460.80");
        assert_eq!(first.size_mb.to_string(), "1024.00");
        for _ in 0..10 {
            assert_eq!(snapshot_usage(&volume).unwrap(), first);
        }
    }

    #[test]
    fn unknown_percent_is_not_zero() {
        let usage = snapshot_usage(&snapshot(None)).unwrap();
        assert!(!usage.is_known());
        assert_eq!(usage.used_mb, None);

        let zero = snapshot_usage(&snapshot(Some(0))).unwrap();
        assert!(zero.is_known());
        assert_ne!(usage, zero);
    }

    #[test]
    fn ordinary_volume_falls_back_to_group() {
        let state = StateSnapshot::new(
            vec![VolumeGroup {
                name: "vg0".to_string(),
                size: 1024 * MIB,
                free: 256 * MIB,
            }],
            vec![ordinary("vg0"), ordinary("vg9")],
            0,
        );
        assert_eq!(snapshot_usage(&state.logical_volumes[0]), None);

        let usage = volume_usage(&state, &state.logical_volumes[0]);
        assert_eq!(
            usage.to_string(),
            "VG Usage: 75.00% (768.00 MB used / 256.00 MB free / 1024.00 MB total)"
        );
        assert_eq!(
            volume_usage(&state, &state.logical_volumes[1]),
            VolumeUsage::Unknown
        );
    }

    #[test]
    fn snapshot_labels() {
        let state = StateSnapshot::empty();
        assert_eq!(
            volume_usage(&state, &snapshot(Some(4500))).to_string(),
            "Snapshot Usage: 45.00% (460.80 MB / 1024.00 MB)"
        );
        assert_eq!(
            volume_usage(&state, &snapshot(None)).to_string(),
            "Snapshot Usage: Unknown"
        );
    }

    #[test]
    fn usage_serializes_with_kind_tag() {
        let json = serde_json::to_value(VolumeUsage::Snapshot(
            snapshot_usage(&snapshot(Some(4500))).unwrap(),
        ))
        .unwrap();
        assert_eq!(json["kind"], "snapshot");
        assert_eq!(json["percent"], 4500);
        assert_eq!(json["used_mb"], 46080);
    }
}
