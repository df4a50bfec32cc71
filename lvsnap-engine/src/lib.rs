// SPDX-License-Identifier: GPL-3.0-only

//! LVM state and snapshot operations engine
//!
//! Queries LVM through an injected [`lvsnap_sys::CommandExecutor`], keeps the
//! resulting [`lvsnap_types::StateSnapshot`] as the live view, derives usage
//! figures from it and mediates snapshot creation and deletion.

pub mod engine;
pub mod error;
pub mod policy;
pub mod usage;

pub use engine::{
    LvmEngine, OperationKind, OperationOutcome, OperationPhase, OperationTrace, VersionCheck,
};
pub use error::{EngineError, ErrorKind, Result};
pub use policy::Actions;
pub use usage::{GroupUsage, SnapshotUsage, VolumeUsage, group_usage, snapshot_usage, volume_usage};
