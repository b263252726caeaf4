//! Preflight: host checks performed before step 1.
//!
//! Verifies:
//! - the process runs with root privileges
//! - every host-side tool the plan needs is on PATH
//! - the mount point exists and is a directory
//!
//! Nothing here changes the host, so a failed preflight has no side effects.

use crate::config::InstallerSettings;
use crate::error::AppError;
use crate::models::InstallPlan;
use crate::system::CHROOT_TOOL;
use std::path::Path;

/// Host binaries the plan will invoke outside the target root.
pub fn required_tools(plan: &InstallPlan) -> Vec<String> {
    let mut tools = vec!["parted".to_string()];
    if plan.use_encryption() {
        tools.push("cryptsetup".to_string());
    }
    tools.push(plan.filesystem().mkfs_program());
    if plan.use_swap() {
        tools.push("mkswap".to_string());
        tools.push("swapon".to_string());
    }
    tools.push("mount".to_string());
    tools.push("pacstrap".to_string());
    tools.push("genfstab".to_string());
    tools.push(CHROOT_TOOL.to_string());
    tools
}

/// Tools for which `found` returns false.
pub fn missing_tools<F>(tools: &[String], found: F) -> Vec<String>
where
    F: Fn(&str) -> bool,
{
    tools.iter().filter(|t| !found(t.as_str())).cloned().collect()
}

pub fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() == 0 }
}

pub fn check_mount_point(mount_point: &Path) -> Result<(), AppError> {
    if !mount_point.exists() {
        return Err(AppError::Preflight(format!(
            "Mount point does not exist: {}",
            mount_point.display()
        )));
    }
    if !mount_point.is_dir() {
        return Err(AppError::Preflight(format!(
            "Mount point is not a directory: {}",
            mount_point.display()
        )));
    }
    Ok(())
}

/// Run all host checks for `plan`.
///
/// In dry-run mode failures are logged as warnings and the run continues.
pub fn preflight(plan: &InstallPlan, settings: &InstallerSettings) -> Result<(), AppError> {
    let mut problems = Vec::new();

    if !is_root() {
        problems.push("the installer must run as root".to_string());
    }

    let missing = missing_tools(&required_tools(plan), |tool| which::which(tool).is_ok());
    if !missing.is_empty() {
        problems.push(format!("missing tools: {}", missing.join(", ")));
    }

    if let Err(e) = check_mount_point(&settings.mount_point) {
        problems.push(e.to_string());
    }

    if problems.is_empty() {
        log::info!("[Preflight] host checks passed");
        return Ok(());
    }

    if settings.dry_run {
        for problem in &problems {
            log::warn!("[Preflight] (dry run) {}", problem);
        }
        return Ok(());
    }

    Err(AppError::Preflight(problems.join("; ")))
}
