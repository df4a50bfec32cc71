// SPDX-License-Identifier: GPL-3.0-only

//! Low-level LVM tool access
//!
//! This crate owns everything that touches the LVM command-line tools:
//! - The allow-listed [`CommandExecutor`] boundary with its timeout
//! - Argument vectors for `lvs`, `vgs`, `lvcreate`, `lvremove` and `lvm`
//! - Typed parsing of their report output
//!
//! The tools need root; callers should expect
//! [`SysError::PermissionDenied`] otherwise.

pub mod error;
pub mod executor;
pub mod lvm;

pub use error::{Result, SysError};
pub use executor::{
    CommandExecutor, CommandOutput, DEFAULT_TIMEOUT, LvmTool, SystemExecutor, is_privileged,
};
pub use lvm::parse::{MalformedRow, Parsed, parse_lv_output, parse_vg_output};
pub use lvm::version::{LvmVersion, TESTED_LVM_VERSION};
pub use lvm::{query_version, read_state};
