// SPDX-License-Identifier: GPL-3.0-only

//! Domain models for the LVM snapshot manager
//!
//! These types are shared by every layer of the stack:
//!
//! - **lvsnap-sys**: parses `lvs`/`vgs` output into them
//! - **lvsnap-engine**: holds them as the live state and derives usage
//! - **lvsnap-cli**: renders and serializes them

pub mod lvm;
pub mod request;
pub mod state;
pub mod units;

pub use lvm::{LogicalVolume, VolumeGroup, VolumeRef};
pub use request::{NameError, SIZE_PRESETS, SizeError, SizeUnit, SnapshotName, SnapshotSize};
pub use state::{OriginLookup, StateSnapshot};
pub use units::{MIB, Mebibytes, Percent, ValueError, bytes_to_pretty};
