//! Request-scoped InstallPlan builder.
//!
//! Every front-end (interactive prompts, answer files) funnels its raw input
//! through `PlanBuilder::build`, which is the only constructor of `InstallPlan`.

use crate::config::validator::{validate_disk, validate_swap_size, validate_username};
use crate::error::CollectionError;
use crate::models::{Bootloader, Filesystem, InstallPlan, Locale, Secret, Timezone};

#[derive(Debug, Default, Clone)]
pub struct PlanBuilder {
    username: Option<String>,
    password: Option<Secret>,
    target_disk: Option<String>,
    filesystem: Option<Filesystem>,
    use_swap: bool,
    swap_size: Option<String>,
    timezone: Option<Timezone>,
    locale: Option<Locale>,
    use_encryption: bool,
    encryption_password: Option<Secret>,
    bootloader: Option<Bootloader>,
}

impl PlanBuilder {
    pub fn new() -> Self {
        PlanBuilder::default()
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: Secret) -> Self {
        self.password = Some(password);
        self
    }

    pub fn target_disk(mut self, disk: impl Into<String>) -> Self {
        self.target_disk = Some(disk.into());
        self
    }

    pub fn filesystem(mut self, filesystem: Filesystem) -> Self {
        self.filesystem = Some(filesystem);
        self
    }

    pub fn swap(mut self, enabled: bool, size: Option<String>) -> Self {
        self.use_swap = enabled;
        self.swap_size = size;
        self
    }

    pub fn timezone(mut self, timezone: Timezone) -> Self {
        self.timezone = Some(timezone);
        self
    }

    pub fn locale(mut self, locale: Locale) -> Self {
        self.locale = Some(locale);
        self
    }

    pub fn encryption(mut self, enabled: bool, passphrase: Option<Secret>) -> Self {
        self.use_encryption = enabled;
        self.encryption_password = passphrase;
        self
    }

    pub fn bootloader(mut self, bootloader: Bootloader) -> Self {
        self.bootloader = Some(bootloader);
        self
    }

    /// Validate every field and produce the immutable plan.
    ///
    /// `available_disks` is the DeviceProbe enumeration taken for this run.
    pub fn build(self, available_disks: &[String]) -> Result<InstallPlan, CollectionError> {
        let username = self.username.ok_or(CollectionError::MissingField("username"))?;
        validate_username(&username)?;

        let password = self.password.ok_or(CollectionError::MissingField("password"))?;
        if password.is_empty() {
            return Err(CollectionError::EmptyPassword);
        }
        // chpasswd reads one user:password record per line
        if password.expose().contains(['\n', '\r']) {
            return Err(CollectionError::InvalidPassword);
        }

        let target_disk = self
            .target_disk
            .ok_or(CollectionError::MissingField("target_disk"))?;
        validate_disk(&target_disk, available_disks)?;

        let filesystem = self
            .filesystem
            .ok_or(CollectionError::MissingField("filesystem"))?;

        // swap_size is meaningful only when swap is requested
        let swap_size = if self.use_swap {
            let raw = self.swap_size.ok_or(CollectionError::MissingSwapSize)?;
            Some(validate_swap_size(&raw)?)
        } else {
            None
        };

        let timezone = self.timezone.ok_or(CollectionError::MissingField("timezone"))?;
        let locale = self.locale.ok_or(CollectionError::MissingField("locale"))?;

        let encryption_password = if self.use_encryption {
            match self.encryption_password {
                Some(secret) if !secret.is_empty() => Some(secret),
                _ => return Err(CollectionError::MissingEncryptionPassword),
            }
        } else {
            None
        };

        let bootloader = self
            .bootloader
            .ok_or(CollectionError::MissingField("bootloader"))?;

        Ok(InstallPlan {
            username,
            password,
            target_disk,
            filesystem,
            swap_size,
            timezone,
            locale,
            encryption_password,
            bootloader,
        })
    }
}
