//! Configuration module for installer settings and plan validation.
//!
//! # Module Structure
//!
//! - `loader`: Loads and persists `InstallerSettings` (TOML)
//! - `validator`: Field-level validation for plan input and settings
//! - `answers`: Answer files describing an InstallPlan for unattended runs
//!
//! Settings describe *how* the installer runs (mount point, timeouts, log
//! locations). They never carry operator choices or secrets; those live in
//! the `InstallPlan`.

pub mod answers;
pub mod loader;
pub mod validator;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default packages bootstrapped into the target.
pub const DEFAULT_BASE_PACKAGES: [&str; 3] = ["base", "linux", "linux-firmware"];

/// Runtime settings for the installer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerSettings {
    /// Where the new root is mounted during installation
    pub mount_point: PathBuf,

    /// Device-mapper name used for the opened LUKS volume
    pub mapper_name: String,

    /// Packages passed to pacstrap
    pub base_packages: Vec<String>,

    /// Time budget per step; 0 disables the timeout
    pub step_timeout_secs: u64,

    /// Directory for full and parsed install logs
    pub log_dir: PathBuf,

    /// JSON checkpoint of the install state
    pub state_file: PathBuf,

    /// Log invocations instead of running them
    pub dry_run: bool,
}

impl Default for InstallerSettings {
    fn default() -> Self {
        InstallerSettings {
            mount_point: PathBuf::from("/mnt"),
            mapper_name: "cryptroot".to_string(),
            base_packages: DEFAULT_BASE_PACKAGES.iter().map(|p| p.to_string()).collect(),
            step_timeout_secs: 3600,
            log_dir: PathBuf::from("logs"),
            state_file: PathBuf::from("install-state.json"),
            dry_run: false,
        }
    }
}

impl InstallerSettings {
    /// Step timeout, or None when disabled.
    pub fn step_timeout(&self) -> Option<Duration> {
        if self.step_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.step_timeout_secs))
        }
    }

    /// Path of the opened LUKS mapping.
    pub fn mapper_path(&self) -> String {
        format!("/dev/mapper/{}", self.mapper_name)
    }

    /// Mount point rendered as a string argument.
    pub fn mount_point_arg(&self) -> String {
        self.mount_point.to_string_lossy().into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = InstallerSettings::default();
        assert_eq!(settings.mount_point_arg(), "/mnt");
        assert_eq!(settings.mapper_path(), "/dev/mapper/cryptroot");
        assert_eq!(settings.base_packages, vec!["base", "linux", "linux-firmware"]);
        assert_eq!(settings.step_timeout(), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn test_zero_timeout_disables() {
        let settings = InstallerSettings {
            step_timeout_secs: 0,
            ..Default::default()
        };
        assert!(settings.step_timeout().is_none());
    }
}
