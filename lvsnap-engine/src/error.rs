// SPDX-License-Identifier: GPL-3.0-only

use std::time::Duration;

use lvsnap_sys::{LvmTool, SysError};
use lvsnap_types::{NameError, SizeError, VolumeRef};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Category of an [`EngineError`], stable for callers that branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unavailable,
    PermissionDenied,
    Timeout,
    ToolFailure,
    ParseError,
    InvalidTarget,
    NotConfirmed,
    InvalidInput,
    NotFound,
    Internal,
}

/// Engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{tool} is not installed; the LVM tools (lvm2) are required")]
    Unavailable { tool: LvmTool },

    #[error("Permission denied running {tool}; LVM operations require root: {detail}")]
    PermissionDenied { tool: LvmTool, detail: String },

    #[error("{tool} timed out after {}s", timeout.as_secs_f32())]
    Timeout { tool: LvmTool, timeout: Duration },

    #[error("{tool} failed: {stderr}")]
    ToolFailure {
        tool: LvmTool,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Unrecognized LVM output: {0}")]
    Parse(String),

    #[error("Invalid target {volume}: {reason}")]
    InvalidTarget {
        volume: VolumeRef,
        reason: &'static str,
    },

    #[error("Deletion of {0} was not confirmed")]
    NotConfirmed(VolumeRef),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No logical volume selected")]
    NothingSelected,

    #[error("Logical volume {0} not found")]
    VolumeNotFound(VolumeRef),

    #[error("I/O error: {0}")]
    Io(#[source] std::io::Error),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unavailable { .. } => ErrorKind::Unavailable,
            Self::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::ToolFailure { .. } => ErrorKind::ToolFailure,
            Self::Parse(_) => ErrorKind::ParseError,
            Self::InvalidTarget { .. } => ErrorKind::InvalidTarget,
            Self::NotConfirmed(_) => ErrorKind::NotConfirmed,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::NothingSelected | Self::VolumeNotFound(_) => ErrorKind::NotFound,
            Self::Io(_) => ErrorKind::Internal,
        }
    }
}

impl From<SysError> for EngineError {
    fn from(err: SysError) -> Self {
        match err {
            SysError::Unavailable { tool } => Self::Unavailable { tool },
            SysError::PermissionDenied { tool, detail } => Self::PermissionDenied { tool, detail },
            SysError::Timeout { tool, timeout } => Self::Timeout { tool, timeout },
            SysError::ToolFailure {
                tool,
                exit_code,
                stderr,
            } => Self::ToolFailure {
                tool,
                exit_code,
                stderr,
            },
            SysError::Parse(msg) => Self::Parse(msg),
            SysError::Io(e) => Self::Io(e),
        }
    }
}

impl From<NameError> for EngineError {
    fn from(err: NameError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

impl From<SizeError> for EngineError {
    fn from(err: SizeError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
