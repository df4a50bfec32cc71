// SPDX-License-Identifier: GPL-3.0-only

use std::time::Duration;

use thiserror::Error;

use crate::executor::LvmTool;

/// Error types for LVM tool invocation and output parsing
#[derive(Error, Debug)]
pub enum SysError {
    #[error("{tool} is not installed or not on the search path")]
    Unavailable { tool: LvmTool },

    #[error("Permission denied running {tool}: {detail}")]
    PermissionDenied { tool: LvmTool, detail: String },

    #[error("{tool} did not finish within {}s and was killed", timeout.as_secs_f32())]
    Timeout { tool: LvmTool, timeout: Duration },

    #[error("{tool} failed ({}): {stderr}", exit_label(*exit_code))]
    ToolFailure {
        tool: LvmTool,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Unrecognized tool output: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_label(exit_code: Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

/// Result type alias for system operations
pub type Result<T> = std::result::Result<T, SysError>;
