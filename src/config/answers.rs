//! Answer files: an InstallPlan written down for unattended runs.
//!
//! ```toml
//! username = "alice"
//! password = "..."
//! target_disk = "/dev/sda"
//! filesystem = "ext4"
//! use_swap = true
//! swap_size = "2G"
//! timezone = "Europe/Moscow"
//! locale = "ru_RU.UTF-8"
//! use_encryption = false
//! bootloader = "GRUB"
//! ```
//!
//! Answers go through the same `PlanBuilder` as interactive input, so an
//! answer file can never produce a plan the prompts would have rejected.

use crate::collector::PlanBuilder;
use crate::error::CollectionError;
use crate::models::{Bootloader, Filesystem, Locale, Secret, Timezone};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Raw answers as written by the operator.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnswerFile {
    pub username: Option<String>,
    pub password: Option<Secret>,
    pub target_disk: Option<String>,
    pub filesystem: Option<Filesystem>,
    #[serde(default)]
    pub use_swap: bool,
    pub swap_size: Option<String>,
    pub timezone: Option<Timezone>,
    pub locale: Option<Locale>,
    #[serde(default)]
    pub use_encryption: bool,
    pub encryption_password: Option<Secret>,
    pub bootloader: Option<Bootloader>,
}

impl AnswerFile {
    /// Parse answers from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, CollectionError> {
        // toml's error text quotes the offending line, which may hold a secret
        toml::from_str(content).map_err(|e| {
            CollectionError::AnswerFile(e.message().to_string())
        })
    }

    /// Feed every answer into a fresh builder.
    pub fn into_builder(self) -> PlanBuilder {
        let mut builder = PlanBuilder::new()
            .swap(self.use_swap, self.swap_size)
            .encryption(self.use_encryption, self.encryption_password);

        if let Some(username) = self.username {
            builder = builder.username(username);
        }
        if let Some(password) = self.password {
            builder = builder.password(password);
        }
        if let Some(disk) = self.target_disk {
            builder = builder.target_disk(disk);
        }
        if let Some(fs) = self.filesystem {
            builder = builder.filesystem(fs);
        }
        if let Some(tz) = self.timezone {
            builder = builder.timezone(tz);
        }
        if let Some(locale) = self.locale {
            builder = builder.locale(locale);
        }
        if let Some(bootloader) = self.bootloader {
            builder = builder.bootloader(bootloader);
        }
        builder
    }
}

/// Load an answer file from disk.
pub fn load_answer_file(path: &Path) -> Result<AnswerFile, CollectionError> {
    let content = fs::read_to_string(path).map_err(|e| {
        CollectionError::AnswerFile(format!("cannot read {}: {}", path.display(), e))
    })?;
    AnswerFile::from_toml(&content)
}
