//! InstallState checkpoint persistence.
//!
//! The state is written as pretty JSON after every transition. Writes go to a
//! temporary file in the same directory and are renamed into place, so a
//! reader never observes a half-written checkpoint.

use crate::error::AppError;
use crate::orchestrator::state::InstallState;
use std::io::Write;
use std::path::Path;

/// Atomically replace the checkpoint at `path` with `state`.
pub fn save_checkpoint(state: &InstallState, path: &Path) -> Result<(), AppError> {
    let json = serde_json::to_string_pretty(state)
        .map_err(|e| AppError::Checkpoint(format!("serialize: {}", e)))?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .map_err(|e| AppError::Checkpoint(format!("create {}: {}", dir.display(), e)))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| AppError::Checkpoint(format!("temp file in {}: {}", dir.display(), e)))?;
    tmp.write_all(json.as_bytes())
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| AppError::Checkpoint(format!("write: {}", e)))?;
    tmp.persist(path)
        .map_err(|e| AppError::Checkpoint(format!("persist {}: {}", path.display(), e.error)))?;

    Ok(())
}

/// Load a previously written checkpoint.
pub fn load_checkpoint(path: &Path) -> Result<InstallState, AppError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| AppError::Checkpoint(format!("read {}: {}", path.display(), e)))?;
    serde_json::from_str(&content)
        .map_err(|e| AppError::Checkpoint(format!("parse {}: {}", path.display(), e)))
}
