// SPDX-License-Identifier: GPL-3.0-only

//! LVM tool invocations
//!
//! Argument vectors for every call the stack makes, plus the read path that
//! turns one `vgs` + `lvs` pass into a [`StateSnapshot`].

pub mod parse;
pub mod version;

use lvsnap_types::{SnapshotName, SnapshotSize, StateSnapshot, VolumeRef};
use tracing::{debug, warn};

use crate::Result;
use crate::executor::{CommandExecutor, LvmTool};
use parse::{LV_FIELDS, SEPARATOR, VG_FIELDS};
use version::LvmVersion;

fn report_args(fields: &[&str]) -> Vec<String> {
    vec![
        "--noheadings".to_string(),
        "--units".to_string(),
        "b".to_string(),
        "--separator".to_string(),
        SEPARATOR.to_string(),
        "-o".to_string(),
        fields.join(","),
    ]
}

pub fn lv_report_args() -> Vec<String> {
    report_args(&LV_FIELDS)
}

pub fn vg_report_args() -> Vec<String> {
    report_args(&VG_FIELDS)
}

/// `lvcreate -L <size> -s -n <name> /dev/<vg>/<origin>`
pub fn create_snapshot_args(
    origin: &VolumeRef,
    name: &SnapshotName,
    size: &SnapshotSize,
) -> Vec<String> {
    vec![
        "-L".to_string(),
        size.as_arg(),
        "-s".to_string(),
        "-n".to_string(),
        name.as_str().to_string(),
        origin.device_path(),
    ]
}

/// `lvremove -f /dev/<vg>/<snapshot>`
pub fn remove_snapshot_args(snapshot: &VolumeRef) -> Vec<String> {
    vec!["-f".to_string(), snapshot.device_path()]
}

/// Query volume groups and logical volumes and build a fresh state.
pub fn read_state<E: CommandExecutor + ?Sized>(executor: &E) -> Result<StateSnapshot> {
    let vgs = executor.run(LvmTool::Vgs, &vg_report_args())?;
    let lvs = executor.run(LvmTool::Lvs, &lv_report_args())?;

    let groups = parse::parse_vg_rows(&vgs.stdout)?;
    let volumes = parse::parse_lv_rows(&lvs.stdout)?;
    let malformed = groups.malformed.len() + volumes.malformed.len();

    let state = StateSnapshot::new(groups.records, volumes.records, malformed);
    for volume in &state.logical_volumes {
        if state.group_of(volume).is_none() {
            warn!(volume = %volume.display_name(), "volume group missing from vgs report");
        }
    }
    debug!(
        groups = state.volume_groups.len(),
        volumes = state.logical_volumes.len(),
        malformed,
        "read LVM state"
    );
    Ok(state)
}

/// Installed LVM release, if `lvm version` reports one.
pub fn query_version<E: CommandExecutor + ?Sized>(executor: &E) -> Result<Option<LvmVersion>> {
    let output = executor.run(LvmTool::Lvm, &["version".to_string()])?;
    Ok(version::parse_version_output(&output.stdout))
}
