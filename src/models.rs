//! Core data types for GOATd Installer.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Operator secret (account password, LUKS passphrase).
///
/// Never printed and never serialized; `expose()` is the only way to read it.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Secret(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([hidden])")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[hidden]")
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Secret)
    }
}

/// Root filesystem type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filesystem {
    Ext4,
    Btrfs,
    Xfs,
    F2fs,
}

impl Filesystem {
    pub const ALL: [Filesystem; 4] = [
        Filesystem::Ext4,
        Filesystem::Btrfs,
        Filesystem::Xfs,
        Filesystem::F2fs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Filesystem::Ext4 => "ext4",
            Filesystem::Btrfs => "btrfs",
            Filesystem::Xfs => "xfs",
            Filesystem::F2fs => "f2fs",
        }
    }

    /// Formatter binary, e.g. `mkfs.ext4`.
    pub fn mkfs_program(&self) -> String {
        format!("mkfs.{}", self.as_str())
    }

    /// Flag that lets the formatter overwrite an existing signature.
    pub fn force_flag(&self) -> &'static str {
        match self {
            Filesystem::Ext4 => "-F",
            Filesystem::Btrfs | Filesystem::Xfs | Filesystem::F2fs => "-f",
        }
    }
}

impl fmt::Display for Filesystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Filesystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Filesystem::ALL
            .iter()
            .copied()
            .find(|fs| fs.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown filesystem: {}", s))
    }
}

/// Bootloader installed into the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bootloader {
    #[serde(rename = "GRUB")]
    Grub,
    #[serde(rename = "systemd-boot")]
    SystemdBoot,
}

impl Bootloader {
    pub const ALL: [Bootloader; 2] = [Bootloader::Grub, Bootloader::SystemdBoot];

    pub fn as_str(&self) -> &'static str {
        match self {
            Bootloader::Grub => "GRUB",
            Bootloader::SystemdBoot => "systemd-boot",
        }
    }
}

impl fmt::Display for Bootloader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Bootloader {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Bootloader::ALL
            .iter()
            .copied()
            .find(|b| b.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown bootloader: {}", s))
    }
}

/// Supported timezones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timezone {
    #[serde(rename = "Europe/Moscow")]
    EuropeMoscow,
    #[serde(rename = "America/New_York")]
    AmericaNewYork,
    #[serde(rename = "Asia/Tokyo")]
    AsiaTokyo,
}

impl Timezone {
    pub const ALL: [Timezone; 3] = [
        Timezone::EuropeMoscow,
        Timezone::AmericaNewYork,
        Timezone::AsiaTokyo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Timezone::EuropeMoscow => "Europe/Moscow",
            Timezone::AmericaNewYork => "America/New_York",
            Timezone::AsiaTokyo => "Asia/Tokyo",
        }
    }

    /// Path of the zoneinfo file inside the target root.
    pub fn zoneinfo_path(&self) -> String {
        format!("/usr/share/zoneinfo/{}", self.as_str())
    }
}

impl fmt::Display for Timezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timezone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timezone::ALL
            .iter()
            .copied()
            .find(|tz| tz.as_str() == s.trim())
            .ok_or_else(|| format!("Unknown timezone: {}", s))
    }
}

/// Supported system locales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Locale {
    #[serde(rename = "ru_RU.UTF-8")]
    RuRu,
    #[serde(rename = "en_US.UTF-8")]
    EnUs,
    #[serde(rename = "ja_JP.UTF-8")]
    JaJp,
}

impl Locale {
    pub const ALL: [Locale; 3] = [Locale::RuRu, Locale::EnUs, Locale::JaJp];

    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::RuRu => "ru_RU.UTF-8",
            Locale::EnUs => "en_US.UTF-8",
            Locale::JaJp => "ja_JP.UTF-8",
        }
    }

    /// Line appended to /etc/locale.gen.
    pub fn locale_gen_entry(&self) -> String {
        format!("{} UTF-8\n", self.as_str())
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Locale::ALL
            .iter()
            .copied()
            .find(|l| l.as_str() == s.trim())
            .ok_or_else(|| format!("Unknown locale: {}", s))
    }
}

/// Validated swap partition size, e.g. `2G` or `512MiB`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapSize {
    amount: u64,
    unit: char,
}

impl SwapSize {
    pub(crate) fn new(amount: u64, unit: char) -> Self {
        SwapSize { amount, unit }
    }

    /// Size expressed in parted's binary units (`2GiB`).
    pub fn as_parted_unit(&self) -> String {
        format!("{}{}iB", self.amount, self.unit)
    }
}

impl fmt::Display for SwapSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.unit)
    }
}

/// Fully validated operator choices for one installation run.
///
/// Only `PlanBuilder::build` constructs this type; it is never mutated afterwards.
#[derive(Debug, Clone)]
pub struct InstallPlan {
    pub(crate) username: String,
    pub(crate) password: Secret,
    pub(crate) target_disk: String,
    pub(crate) filesystem: Filesystem,
    pub(crate) swap_size: Option<SwapSize>,
    pub(crate) timezone: Timezone,
    pub(crate) locale: Locale,
    pub(crate) encryption_password: Option<Secret>,
    pub(crate) bootloader: Bootloader,
}

impl InstallPlan {
    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &Secret {
        &self.password
    }

    pub fn target_disk(&self) -> &str {
        &self.target_disk
    }

    pub fn filesystem(&self) -> Filesystem {
        self.filesystem
    }

    pub fn use_swap(&self) -> bool {
        self.swap_size.is_some()
    }

    pub fn swap_size(&self) -> Option<&SwapSize> {
        self.swap_size.as_ref()
    }

    pub fn timezone(&self) -> Timezone {
        self.timezone
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn use_encryption(&self) -> bool {
        self.encryption_password.is_some()
    }

    pub fn encryption_password(&self) -> Option<&Secret> {
        self.encryption_password.as_ref()
    }

    pub fn bootloader(&self) -> Bootloader {
        self.bootloader
    }

    /// All secret values carried by the plan, for log redaction.
    pub fn secrets(&self) -> Vec<&Secret> {
        let mut secrets = vec![&self.password];
        if let Some(ref luks) = self.encryption_password {
            secrets.push(luks);
        }
        secrets
    }

    /// Human-readable summary shown to the operator before confirmation.
    pub fn summary(&self) -> String {
        let swap = self
            .swap_size
            .as_ref()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "no".to_string());
        let encryption = if self.use_encryption() { "yes" } else { "no" };
        format!(
            "Username:    {}\n\
             Password:    {}\n\
             Disk:        {}\n\
             Filesystem:  {}\n\
             Swap:        {}\n\
             Timezone:    {}\n\
             Locale:      {}\n\
             Encryption:  {}\n\
             Bootloader:  {}",
            self.username,
            self.password,
            self.target_disk,
            self.filesystem,
            swap,
            self.timezone,
            self.locale,
            encryption,
            self.bootloader
        )
    }
}

/// Identity of a provisioning step, numbered in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StepId {
    Partition = 1,
    Encrypt = 2,
    Format = 3,
    Swap = 4,
    Bootstrap = 5,
    Fstab = 6,
    EnterTarget = 7,
    Localize = 8,
    CreateUser = 9,
    Bootloader = 10,
}

impl StepId {
    pub const ALL: [StepId; 10] = [
        StepId::Partition,
        StepId::Encrypt,
        StepId::Format,
        StepId::Swap,
        StepId::Bootstrap,
        StepId::Fstab,
        StepId::EnterTarget,
        StepId::Localize,
        StepId::CreateUser,
        StepId::Bootloader,
    ];

    pub fn number(&self) -> u8 {
        *self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StepId::Partition => "partition",
            StepId::Encrypt => "encrypt",
            StepId::Format => "format",
            StepId::Swap => "swap",
            StepId::Bootstrap => "bootstrap",
            StepId::Fstab => "fstab",
            StepId::EnterTarget => "enter-target",
            StepId::Localize => "localize",
            StepId::CreateUser => "create-user",
            StepId::Bootloader => "bootloader",
        }
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.number(), self.as_str())
    }
}

/// Logical role of a path resolved while the installation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PathRole {
    RootPartition,
    SwapPartition,
    MappedRoot,
    MountedRoot,
    TargetRoot,
}

impl PathRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PathRole::RootPartition => "root-partition",
            PathRole::SwapPartition => "swap-partition",
            PathRole::MappedRoot => "mapped-root",
            PathRole::MountedRoot => "mounted-root",
            PathRole::TargetRoot => "target-root",
        }
    }

    /// Whether the role names a block device rather than a directory.
    pub fn is_device(&self) -> bool {
        matches!(
            self,
            PathRole::RootPartition | PathRole::SwapPartition | PathRole::MappedRoot
        )
    }
}

impl fmt::Display for PathRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived paths keyed by role.
pub type DerivedPaths = BTreeMap<PathRole, String>;

/// Exactly what a successful step changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDelta {
    pub paths: Vec<(PathRole, String)>,
}

impl StateDelta {
    pub fn none() -> Self {
        StateDelta::default()
    }

    pub fn with_path(mut self, role: PathRole, path: impl Into<String>) -> Self {
        self.paths.push((role, path.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl fmt::Display for StateDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.paths.is_empty() {
            return f.write_str("no path changes");
        }
        let parts: Vec<String> = self
            .paths
            .iter()
            .map(|(role, path)| format!("{} resolved to {}", role, path))
            .collect();
        f.write_str(&parts.join(", "))
    }
}
