//! Configuration file discovery and root folder resolution

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "CANTOR_ROOT_FOLDER";

/// Root folder resolution, in priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. `root_folder` key of the TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config_file_value: Option<&Path>,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = config_file_value {
        return path.to_path_buf();
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Locate the configuration file for the platform
///
/// An explicit path must exist. Otherwise the per-user location is tried,
/// then (on Linux) the system-wide one.
pub fn find_config_file(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return if path.exists() {
            Ok(path.to_path_buf())
        } else {
            Err(Error::NotFound(format!("Config file not found: {:?}", path)))
        };
    }

    let user_config = dirs::config_dir().map(|d| d.join("cantor").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Ok(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/cantor/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::NotFound("No config file found".to_string()))
}

/// Parse a TOML configuration file into `T`
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    let parsed = toml::from_str::<T>(&content)?;
    Ok(parsed)
}

/// Load configuration, degrading to defaults when no file is available
///
/// A missing file is not an error: a warning is logged and `T::default()`
/// is returned. A file that exists but fails to parse IS an error.
pub fn load_or_default<T: DeserializeOwned + Default>(explicit: Option<&Path>) -> Result<T> {
    match find_config_file(explicit) {
        Ok(path) => {
            info!("Loading configuration from {}", path.display());
            load_toml(&path)
        }
        Err(Error::NotFound(msg)) if explicit.is_none() => {
            warn!("{}; using built-in defaults", msg);
            Ok(T::default())
        }
        Err(e) => Err(e),
    }
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/cantor (or /var/lib/cantor for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("cantor"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/cantor"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/cantor
        dirs::data_dir()
            .map(|d| d.join("cantor"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/cantor"))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\cantor
        dirs::data_local_dir()
            .map(|d| d.join("cantor"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\cantor"))
    } else {
        PathBuf::from("./cantor_data")
    }
}
