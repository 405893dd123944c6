use crate::core::error::{ScoutError, ScoutResult};
use std::path::{Path, PathBuf};

/// Get the ghscout home directory
///
/// Platform-specific locations:
/// - Windows: %APPDATA%\ghscout
/// - Linux: ~/.config/ghscout
/// - macOS: ~/Library/Application Support/ghscout
pub fn ghscout_home() -> ScoutResult<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| ScoutError::Path("Could not determine config directory".to_string()))?;
    Ok(config_dir.join("ghscout"))
}

/// Get the cache directory
///
/// Platform-specific locations:
/// - Windows: %LOCALAPPDATA%\ghscout\cache
/// - Linux: ~/.cache/ghscout
/// - macOS: ~/Library/Caches/ghscout
pub fn cache_dir() -> ScoutResult<PathBuf> {
    let cache_dir = dirs::cache_dir()
        .ok_or_else(|| ScoutError::Path("Could not determine cache directory".to_string()))?;
    Ok(cache_dir.join("ghscout"))
}

/// Get the config file path (`<ghscout_home>/config.yaml`)
pub fn config_file() -> ScoutResult<PathBuf> {
    Ok(ghscout_home()?.join("config.yaml"))
}

/// Directory holding persisted HTTP response history
pub fn http_cache_dir(cache_root: &Path) -> PathBuf {
    cache_root.join("http")
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> ScoutResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| {
            ScoutError::Path(format!(
                "Failed to create directory {}: {}",
                path.display(),
                e
            ))
        })?;
    }
    Ok(())
}
