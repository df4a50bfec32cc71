// SPDX-License-Identifier: GPL-3.0-only

//! Preconditions for snapshot operations
//!
//! Pure checks against a [`StateSnapshot`]; none of them run a tool.

use lvsnap_types::{LogicalVolume, SnapshotName, SnapshotSize, StateSnapshot, VolumeRef};
use serde::Serialize;

use crate::error::{EngineError, Result};

/// Which operations a volume currently allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Actions {
    pub can_create: bool,
    pub can_delete: bool,
}

impl Actions {
    pub fn for_volume(volume: &LogicalVolume) -> Self {
        Self {
            can_create: !volume.is_snapshot(),
            can_delete: volume.is_snapshot(),
        }
    }
}

fn require_volume<'a>(state: &'a StateSnapshot, target: &VolumeRef) -> Result<&'a LogicalVolume> {
    state
        .volume(target)
        .ok_or_else(|| EngineError::VolumeNotFound(target.clone()))
}

/// The origin must exist and must not itself be a snapshot.
pub fn require_snapshot_origin<'a>(
    state: &'a StateSnapshot,
    target: &VolumeRef,
) -> Result<&'a LogicalVolume> {
    let volume = require_volume(state, target)?;
    if volume.is_snapshot() {
        return Err(EngineError::InvalidTarget {
            volume: target.clone(),
            reason: "snapshots of snapshots are not supported",
        });
    }
    Ok(volume)
}

/// The target must exist and be a snapshot.
pub fn require_snapshot<'a>(
    state: &'a StateSnapshot,
    target: &VolumeRef,
) -> Result<&'a LogicalVolume> {
    let volume = require_volume(state, target)?;
    if !volume.is_snapshot() {
        return Err(EngineError::InvalidTarget {
            volume: target.clone(),
            reason: "only snapshot volumes can be deleted",
        });
    }
    Ok(volume)
}

/// Validate a new snapshot name, including uniqueness within the origin's group.
pub fn validate_name(
    state: &StateSnapshot,
    origin: &LogicalVolume,
    name: &str,
) -> Result<SnapshotName> {
    let name = SnapshotName::parse(name)?;
    let taken = VolumeRef::new(origin.vg_name.clone(), name.as_str());
    if state.volume(&taken).is_some() {
        return Err(EngineError::InvalidInput(format!(
            "a logical volume named {name} already exists in {}",
            origin.vg_name
        )));
    }
    Ok(name)
}

pub fn validate_size(size: &str) -> Result<SnapshotSize> {
    Ok(SnapshotSize::parse(size)?)
}

pub fn require_confirmation(target: &VolumeRef, confirmed: bool) -> Result<()> {
    if confirmed {
        Ok(())
    } else {
        Err(EngineError::NotConfirmed(target.clone()))
    }
}
