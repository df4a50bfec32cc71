// SPDX-License-Identifier: GPL-3.0-only

//! One immutable result of querying LVM

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lvm::{LogicalVolume, VolumeGroup, VolumeRef};

/// Resolution of a snapshot's origin against the snapshot it was read in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginLookup<'a> {
    /// The volume is not a snapshot.
    NotSnapshot,
    Found(&'a LogicalVolume),
    /// The origin is named but absent from this listing.
    Missing(&'a str),
}

/// Volume groups and logical volumes read in one refresh cycle.
///
/// Never mutated after construction; a refresh builds a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub volume_groups: Vec<VolumeGroup>,
    pub logical_volumes: Vec<LogicalVolume>,
    /// Rows skipped because a field could not be resolved
    pub malformed_rows: usize,
    pub captured_at: DateTime<Utc>,
}

impl StateSnapshot {
    pub fn new(
        volume_groups: Vec<VolumeGroup>,
        logical_volumes: Vec<LogicalVolume>,
        malformed_rows: usize,
    ) -> Self {
        Self {
            volume_groups,
            logical_volumes,
            malformed_rows,
            captured_at: Utc::now(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new(), 0)
    }

    pub fn volume(&self, target: &VolumeRef) -> Option<&LogicalVolume> {
        self.logical_volumes
            .iter()
            .find(|lv| lv.vg_name == target.vg_name && lv.name == target.lv_name)
    }

    pub fn group(&self, name: &str) -> Option<&VolumeGroup> {
        self.volume_groups.iter().find(|vg| vg.name == name)
    }

    pub fn group_of(&self, volume: &LogicalVolume) -> Option<&VolumeGroup> {
        self.group(&volume.vg_name)
    }

    pub fn origin_of<'a>(&'a self, volume: &'a LogicalVolume) -> OriginLookup<'a> {
        match volume.origin_ref() {
            None => OriginLookup::NotSnapshot,
            Some(origin) => match self.volume(&origin) {
                Some(found) => OriginLookup::Found(found),
                None => OriginLookup::Missing(volume.origin.as_deref().unwrap_or_default()),
            },
        }
    }

    /// Snapshots whose origin is `origin`.
    pub fn snapshots_of<'a>(
        &'a self,
        origin: &'a VolumeRef,
    ) -> impl Iterator<Item = &'a LogicalVolume> + 'a {
        self.logical_volumes.iter().filter(move |lv| {
            lv.vg_name == origin.vg_name && lv.origin.as_deref() == Some(origin.lv_name.as_str())
        })
    }

    pub fn snapshot_count(&self) -> usize {
        self.logical_volumes
            .iter()
            .filter(|lv| lv.is_snapshot())
            .count()
    }

    /// List label, e.g. `vg0/home [snapshot]`.
    pub fn display_label(&self, volume: &LogicalVolume) -> String {
        match self.origin_of(volume) {
            OriginLookup::NotSnapshot => volume.display_name(),
            OriginLookup::Found(_) => format!("{} [snapshot]", volume.display_name()),
            OriginLookup::Missing(_) => {
                format!("{} [snapshot, origin missing]", volume.display_name())
            }
        }
    }
}

impl Default for StateSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lv(name: &str, origin: Option<&str>) -> LogicalVolume {
        LogicalVolume {
            name: name.to_string(),
            vg_name: "vg0".to_string(),
            size: 1024,
            origin: origin.map(str::to_string),
            snap_percent: None,
            active: true,
        }
    }

    fn state() -> StateSnapshot {
        StateSnapshot::new(
            vec![VolumeGroup {
                name: "vg0".to_string(),
                size: 4096,
                free: 1024,
            }],
            vec![
                lv("root", None),
                lv("root_snap", Some("root")),
                lv("orphan", Some("gone")),
            ],
            0,
        )
    }

    #[test]
    fn resolves_origins() {
        let state = state();
        let snap = state.volume(&VolumeRef::new("vg0", "root_snap")).unwrap();
        assert!(matches!(state.origin_of(snap), OriginLookup::Found(o) if o.name == "root"));

        let orphan = state.volume(&VolumeRef::new("vg0", "orphan")).unwrap();
        assert_eq!(state.origin_of(orphan), OriginLookup::Missing("gone"));

        let root = state.volume(&VolumeRef::new("vg0", "root")).unwrap();
        assert_eq!(state.origin_of(root), OriginLookup::NotSnapshot);
    }

    #[test]
    fn labels_follow_origin_state() {
        let state = state();
        let labels: Vec<String> = state
            .logical_volumes
            .iter()
            .map(|lv| state.display_label(lv))
            .collect();
        assert_eq!(
            labels,
            vec![
                "vg0/root",
                "vg0/root_snap [snapshot]",
                "vg0/orphan [snapshot, origin missing]",
            ]
        );
    }

    #[test]
    fn counts_snapshots_per_origin() {
        let state = state();
        let root = VolumeRef::new("vg0", "root");
        assert_eq!(state.snapshots_of(&root).count(), 1);
        assert_eq!(state.snapshot_count(), 2);
        assert!(state.group("vg0").is_some());
        assert!(state.volume(&VolumeRef::new("vg1", "root")).is_none());
    }
}
