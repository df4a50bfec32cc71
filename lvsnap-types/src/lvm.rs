// SPDX-License-Identifier: GPL-3.0-only

//! LVM (Logical Volume Manager) types
//!
//! Types for volume groups and logical volumes as reported by `vgs`/`lvs`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::units::{Mebibytes, Percent};

/// Volume group information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeGroup {
    /// Volume group name
    pub name: String,

    /// Total size in bytes
    pub size: u64,

    /// Free space in bytes
    pub free: u64,
}

impl VolumeGroup {
    /// Get used space in bytes
    pub fn used(&self) -> u64 {
        self.size.saturating_sub(self.free)
    }

    /// Used fraction of the group, truncated to hundredths of a percent.
    pub fn usage_percent(&self) -> Percent {
        if self.size == 0 {
            return Percent::ZERO;
        }
        let hundredths = (self.used() as u128 * 10_000) / self.size as u128;
        Percent::from_hundredths(hundredths as u32)
    }

    pub fn used_mb(&self) -> Mebibytes {
        Mebibytes::from_bytes(self.used())
    }

    pub fn free_mb(&self) -> Mebibytes {
        Mebibytes::from_bytes(self.free)
    }

    pub fn size_mb(&self) -> Mebibytes {
        Mebibytes::from_bytes(self.size)
    }
}

/// Identifies a logical volume by `(volume group, volume name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VolumeRef {
    pub vg_name: String,
    pub lv_name: String,
}

impl VolumeRef {
    pub fn new(vg_name: impl Into<String>, lv_name: impl Into<String>) -> Self {
        Self {
            vg_name: vg_name.into(),
            lv_name: lv_name.into(),
        }
    }

    /// Parse the `vg/lv` short form.
    pub fn parse(value: &str) -> Option<Self> {
        let (vg, lv) = value.trim().split_once('/')?;
        if vg.is_empty() || lv.is_empty() || lv.contains('/') {
            return None;
        }
        Some(Self::new(vg, lv))
    }

    /// Device node path used on the LVM command line (`/dev/vg/lv`).
    pub fn device_path(&self) -> String {
        format!("/dev/{}/{}", self.vg_name, self.lv_name)
    }
}

impl fmt::Display for VolumeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.vg_name, self.lv_name)
    }
}

/// Logical volume information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalVolume {
    /// Logical volume name
    pub name: String,

    /// Parent volume group name
    pub vg_name: String,

    /// Allocated size in bytes
    pub size: u64,

    /// Origin volume name in the same group; present only for snapshots
    pub origin: Option<String>,

    /// Snapshot data usage; `None` for ordinary volumes and for snapshots
    /// that report no value (inactive, just created)
    pub snap_percent: Option<Percent>,

    /// Whether the logical volume is active
    pub active: bool,
}

impl LogicalVolume {
    pub fn is_snapshot(&self) -> bool {
        self.origin.is_some()
    }

    pub fn volume_ref(&self) -> VolumeRef {
        VolumeRef::new(self.vg_name.clone(), self.name.clone())
    }

    pub fn origin_ref(&self) -> Option<VolumeRef> {
        self.origin
            .as_ref()
            .map(|origin| VolumeRef::new(self.vg_name.clone(), origin.clone()))
    }

    /// Get a display name for this logical volume
    pub fn display_name(&self) -> String {
        self.volume_ref().to_string()
    }

    pub fn size_mb(&self) -> Mebibytes {
        Mebibytes::from_bytes(self.size)
    }
}
