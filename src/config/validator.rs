//! Input and settings validation.

use super::InstallerSettings;
use crate::error::{CollectionError, ConfigError};
use crate::models::{Secret, SwapSize};
use once_cell::sync::Lazy;
use regex::Regex;

// Portable account name accepted by useradd without --badname
static USERNAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z_][a-z0-9_-]{0,31}$").expect("Invalid username regex"));

static SWAP_SIZE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([1-9][0-9]*)([KMGT])(?:iB)?$").expect("Invalid swap size regex"));

/// Validate an account name: non-empty, no whitespace, useradd-compatible.
pub fn validate_username(username: &str) -> Result<(), CollectionError> {
    if username.is_empty() {
        return Err(CollectionError::EmptyUsername);
    }

    if username.chars().any(char::is_whitespace) {
        return Err(CollectionError::UsernameWhitespace);
    }

    if !USERNAME_REGEX.is_match(username) {
        return Err(CollectionError::InvalidUsername(username.to_string()));
    }

    Ok(())
}

/// Validate a password entered twice.
pub fn validate_password_pair(first: Secret, second: &Secret) -> Result<Secret, CollectionError> {
    if first.is_empty() {
        return Err(CollectionError::EmptyPassword);
    }

    if &first != second {
        return Err(CollectionError::PasswordMismatch);
    }

    Ok(first)
}

/// Parse a swap size such as `2G`, `512M` or `4GiB`.
pub fn validate_swap_size(raw: &str) -> Result<SwapSize, CollectionError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CollectionError::MissingSwapSize);
    }

    let caps = SWAP_SIZE_REGEX
        .captures(trimmed)
        .ok_or_else(|| CollectionError::InvalidSwapSize(trimmed.to_string()))?;

    let amount = caps[1]
        .parse::<u64>()
        .map_err(|_| CollectionError::InvalidSwapSize(trimmed.to_string()))?;
    let unit = caps[2]
        .chars()
        .next()
        .ok_or_else(|| CollectionError::InvalidSwapSize(trimmed.to_string()))?;

    Ok(SwapSize::new(amount, unit))
}

/// Check that the chosen disk was enumerated by the device probe.
pub fn validate_disk(disk: &str, available: &[String]) -> Result<(), CollectionError> {
    if available.is_empty() {
        return Err(CollectionError::NoDisks);
    }

    if !available.iter().any(|d| d == disk) {
        return Err(CollectionError::DiskNotEnumerated(disk.to_string()));
    }

    Ok(())
}

/// Validate runtime settings.
pub fn validate_settings(settings: &InstallerSettings) -> Result<(), ConfigError> {
    if !settings.mount_point.is_absolute() {
        return Err(ConfigError::ValidationFailed(format!(
            "mount_point must be an absolute path, got: {}",
            settings.mount_point.display()
        )));
    }

    if settings.mount_point == std::path::Path::new("/") {
        return Err(ConfigError::ValidationFailed(
            "mount_point cannot be the host root".to_string(),
        ));
    }

    if settings.mapper_name.is_empty()
        || settings.mapper_name.contains('/')
        || settings.mapper_name.chars().any(char::is_whitespace)
    {
        return Err(ConfigError::ValidationFailed(format!(
            "mapper_name is not a valid device-mapper name: '{}'",
            settings.mapper_name
        )));
    }

    if settings.base_packages.is_empty() {
        return Err(ConfigError::ValidationFailed(
            "base_packages cannot be empty".to_string(),
        ));
    }

    if let Some(pkg) = settings
        .base_packages
        .iter()
        .find(|p| p.is_empty() || p.starts_with('-') || p.chars().any(char::is_whitespace))
    {
        return Err(ConfigError::ValidationFailed(format!(
            "Invalid package name in base_packages: '{}'",
            pkg
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_rules() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("_svc-01").is_ok());
        assert!(matches!(validate_username(""), Err(CollectionError::EmptyUsername)));
        assert!(matches!(
            validate_username("john doe"),
            Err(CollectionError::UsernameWhitespace)
        ));
        assert!(matches!(
            validate_username("Root"),
            Err(CollectionError::InvalidUsername(_))
        ));
        assert!(validate_username(&"a".repeat(33)).is_err());
    }

    #[test]
    fn test_password_pair() {
        let ok = validate_password_pair(Secret::new("pw"), &Secret::new("pw"));
        assert_eq!(ok.unwrap().expose(), "pw");

        assert!(matches!(
            validate_password_pair(Secret::new("pw"), &Secret::new("other")),
            Err(CollectionError::PasswordMismatch)
        ));
        assert!(matches!(
            validate_password_pair(Secret::new(""), &Secret::new("")),
            Err(CollectionError::EmptyPassword)
        ));
    }

    #[test]
    fn test_swap_size_parsing() {
        assert_eq!(validate_swap_size("2G").unwrap().as_parted_unit(), "2GiB");
        assert_eq!(validate_swap_size(" 512M ").unwrap().as_parted_unit(), "512MiB");
        assert_eq!(validate_swap_size("4GiB").unwrap().to_string(), "4G");
        assert!(matches!(validate_swap_size(""), Err(CollectionError::MissingSwapSize)));
        assert!(validate_swap_size("0G").is_err());
        assert!(validate_swap_size("2 G").is_err());
        assert!(validate_swap_size("lots").is_err());
    }

    #[test]
    fn test_disk_membership() {
        let disks = vec!["/dev/sda".to_string(), "/dev/nvme0n1".to_string()];
        assert!(validate_disk("/dev/sda", &disks).is_ok());
        assert!(matches!(
            validate_disk("/dev/sdb", &disks),
            Err(CollectionError::DiskNotEnumerated(_))
        ));
        assert!(matches!(validate_disk("/dev/sda", &[]), Err(CollectionError::NoDisks)));
    }

    #[test]
    fn test_settings_validation() {
        assert!(validate_settings(&InstallerSettings::default()).is_ok());

        let relative = InstallerSettings {
            mount_point: "mnt".into(),
            ..Default::default()
        };
        assert!(validate_settings(&relative).is_err());

        let host_root = InstallerSettings {
            mount_point: "/".into(),
            ..Default::default()
        };
        assert!(validate_settings(&host_root).is_err());

        let bad_pkg = InstallerSettings {
            base_packages: vec!["base".to_string(), "--overwrite".to_string()],
            ..Default::default()
        };
        assert!(validate_settings(&bad_pkg).is_err());
    }
}
