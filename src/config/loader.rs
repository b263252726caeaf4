//! Settings file loader and serialization.

use super::validator::validate_settings;
use super::InstallerSettings;
use crate::error::ConfigError;
use std::fs;
use std::path::{Path, PathBuf};

/// Get the global settings path: ~/.config/goatd-installer/settings.toml
pub fn get_global_settings_path() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or_else(|| {
        ConfigError::ValidationFailed("Cannot determine home directory".to_string())
    })?;

    Ok(home.join(".config/goatd-installer").join("settings.toml"))
}

/// Load settings from a TOML file.
pub fn load_settings_from_file(path: &Path) -> Result<InstallerSettings, ConfigError> {
    validate_settings_path(path)?;

    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::FileNotFound(format!(
                "Settings file not found at: {}",
                path.display()
            ))
        } else {
            ConfigError::IoError(e)
        }
    })?;

    let settings: InstallerSettings = toml::from_str(&content)?;
    validate_settings(&settings)?;

    Ok(settings)
}

/// Save settings to a TOML file.
pub fn save_settings_to_file(settings: &InstallerSettings, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let content = toml::to_string_pretty(settings)?;
    fs::write(path, content)?;

    Ok(())
}

/// Resolve settings for a run.
///
/// An explicit path must exist. Without one, the global settings file is used
/// when present and built-in defaults otherwise.
pub fn resolve_settings(explicit: Option<&Path>) -> Result<InstallerSettings, ConfigError> {
    if let Some(path) = explicit {
        return load_settings_from_file(path);
    }

    match get_global_settings_path() {
        Ok(path) if path.exists() => {
            log::info!("Loading settings from {}", path.display());
            load_settings_from_file(&path)
        }
        _ => {
            log::info!("No settings file found, using defaults");
            Ok(InstallerSettings::default())
        }
    }
}

/// Validate settings path (.toml extension required).
pub fn validate_settings_path(path: &Path) -> Result<(), ConfigError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationFailed(
            "Settings path cannot be empty".to_string(),
        ));
    }

    match path.extension() {
        Some(ext) if ext == "toml" => Ok(()),
        Some(ext) => Err(ConfigError::ValidationFailed(format!(
            "Settings file must have .toml extension, got .{}",
            ext.to_string_lossy()
        ))),
        None => Err(ConfigError::ValidationFailed(
            "Settings file must have .toml extension".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested/settings.toml");

        let settings = InstallerSettings {
            mapper_name: "rootvol".to_string(),
            step_timeout_secs: 120,
            ..Default::default()
        };
        save_settings_to_file(&settings, &path).unwrap();

        let loaded = load_settings_from_file(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "dry_run = true\n").unwrap();

        let loaded = load_settings_from_file(&path).unwrap();
        assert!(loaded.dry_run);
        assert_eq!(loaded.mapper_name, "cryptroot");
    }

    #[test]
    fn test_missing_file() {
        let result = load_settings_from_file(Path::new("/nonexistent/settings.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_rejects_wrong_extension() {
        assert!(validate_settings_path(Path::new("settings.json")).is_err());
        assert!(validate_settings_path(Path::new("settings")).is_err());
        assert!(validate_settings_path(Path::new("settings.toml")).is_ok());
    }

    #[test]
    fn test_invalid_toml() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "mount_point = [").unwrap();
        assert!(matches!(
            load_settings_from_file(&path),
            Err(ConfigError::InvalidToml(_))
        ));
    }
}
