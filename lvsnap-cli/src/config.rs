// SPDX-License-Identifier: GPL-3.0-only

use std::path::{Path, PathBuf};
use std::time::Duration;

use lvsnap_sys::{LvmVersion, SystemExecutor, TESTED_LVM_VERSION};
use lvsnap_types::{SIZE_PRESETS, SizeError, SnapshotSize};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const CONFIG_ENV: &str = "LVSNAP_CONFIG";
const SYSTEM_CONFIG: &str = "/etc/lvsnap/config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid configuration in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("size preset {preset:?}: {source}")]
    Preset { preset: String, source: SizeError },

    #[error("command_timeout_secs must be greater than zero")]
    ZeroTimeout,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LoggingLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LoggingLevel {
    pub fn as_directive(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub command_timeout_secs: u64,
    /// Directory holding the LVM binaries; `PATH` and the sbin dirs when unset
    pub lvm_bin_dir: Option<PathBuf>,
    pub tested_lvm_version: String,
    pub size_presets: Vec<String>,
    pub log_level: LoggingLevel,
    pub log_to_disk: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            command_timeout_secs: lvsnap_sys::DEFAULT_TIMEOUT.as_secs(),
            lvm_bin_dir: None,
            tested_lvm_version: TESTED_LVM_VERSION.to_string(),
            size_presets: SIZE_PRESETS.iter().map(|p| p.to_string()).collect(),
            log_level: LoggingLevel::Info,
            log_to_disk: false,
        }
    }
}

impl Config {
    /// Load from `explicit`, then `$LVSNAP_CONFIG`, then the system file.
    ///
    /// Falls back to defaults when none of them is present.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => std::env::var_os(CONFIG_ENV)
                .map(PathBuf::from)
                .or_else(|| Some(PathBuf::from(SYSTEM_CONFIG)).filter(|p| p.exists())),
        };

        let Some(path) = path else {
            return Ok(Self::default());
        };

        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config: Self =
            toml::from_str(&text).map_err(|source| ConfigError::Parse { path, source })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.command_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        for preset in &self.size_presets {
            SnapshotSize::parse(preset).map_err(|source| ConfigError::Preset {
                preset: preset.clone(),
                source,
            })?;
        }
        Ok(())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn tested_version(&self) -> LvmVersion {
        LvmVersion::parse(&self.tested_lvm_version)
    }

    pub fn executor(&self) -> SystemExecutor {
        let executor = SystemExecutor::new(self.command_timeout());
        match &self.lvm_bin_dir {
            Some(dir) => executor.with_bin_dir(dir),
            None => executor,
        }
    }

    /// Size used when the caller does not pick one.
    pub fn default_size(&self) -> &str {
        self.size_presets
            .first()
            .map(String::as_str)
            .unwrap_or(SIZE_PRESETS[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_presets() {
        let config = Config::default();
        assert_eq!(config.size_presets, vec!["100M", "500M", "1G", "5G", "10G"]);
        assert_eq!(config.default_size(), "100M");
        assert_eq!(config.command_timeout(), Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "command_timeout_secs = 30\nlog_level = \"debug\"").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.command_timeout_secs, 30);
        assert_eq!(config.log_level, LoggingLevel::Debug);
        assert_eq!(config.tested_lvm_version, "2.3.30");
        assert_eq!(config.lvm_bin_dir, None);
    }

    #[test]
    fn rejects_unknown_keys_and_bad_presets() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "timeout = 3").unwrap();
        assert!(matches!(
            Config::load(Some(file.path())),
            Err(ConfigError::Parse { .. })
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "size_presets = [\"1G\", \"10\"]").unwrap();
        assert!(matches!(
            Config::load(Some(file.path())),
            Err(ConfigError::Preset { .. })
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "command_timeout_secs = 0").unwrap();
        assert!(matches!(
            Config::load(Some(file.path())),
            Err(ConfigError::ZeroTimeout)
        ));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
