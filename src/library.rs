use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::APP_NAME;

pub struct LibraryPaths {
    pub data_dir: PathBuf,
    /// Blobs written by the debounced store
    pub store_dir: PathBuf,
}

/// Resolve `path` against the current directory when it is relative.
pub fn absolute_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()
            .context("Failed to get current directory")?
            .join(path))
    }
}

/// Stable id of a book, comic or video: md5 hex of its absolute path.
pub fn entity_id(abs_path: &Path) -> String {
    let digest = md5::compute(abs_path.to_string_lossy().as_bytes());
    format!("{digest:x}")
}

pub fn entity_id_for(path: &Path) -> Result<String> {
    Ok(entity_id(&absolute_path(path)?))
}

/// Compute XDG-compliant data paths, honoring an override directory.
/// Creates the directories if they don't exist.
pub fn resolve_library_paths(data_dir_override: Option<&Path>) -> Result<LibraryPaths> {
    let data_dir = match data_dir_override {
        Some(dir) => absolute_path(dir)?,
        None => dirs::data_dir()
            .context("Could not determine data directory")?
            .join(APP_NAME),
    };
    let store_dir = data_dir.join("store");

    fs::create_dir_all(&store_dir)
        .with_context(|| format!("Failed to create store directory: {store_dir:?}"))?;

    Ok(LibraryPaths {
        data_dir,
        store_dir,
    })
}

/// Compute the XDG-compliant log file path.
/// Uses `state_dir` on platforms that have it, falls back to `cache_dir`.
pub fn resolve_log_path() -> Result<PathBuf> {
    let base = dirs::state_dir()
        .or_else(dirs::cache_dir)
        .context("Could not determine state or cache directory")?;

    let log_dir = base.join(APP_NAME);
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory: {log_dir:?}"))?;

    Ok(log_dir.join("eriri.log"))
}
