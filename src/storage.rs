//! Settings persistence.
//!
//! Settings are a small JSON document written with four-space indentation.

use crate::error::LauncherError;
use crate::model::Settings;
use serde::Serialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_SETTINGS_FILE: &str = "project-settings.json";

fn app_dir(base: Option<PathBuf>) -> PathBuf {
    base.unwrap_or_else(|| PathBuf::from("."))
        .join("nuitka-launcher")
}

/// Where settings go when no explicit path is given.
pub fn default_settings_path() -> PathBuf {
    app_dir(dirs::config_dir()).join(DEFAULT_SETTINGS_FILE)
}

/// Log file used while the terminal UI owns the screen.
pub fn log_file_path() -> PathBuf {
    app_dir(dirs::cache_dir()).join("launcher.log")
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<(), LauncherError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| LauncherError::settings_io(path, e))?;
    }
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    settings
        .serialize(&mut ser)
        .map_err(|e| LauncherError::settings_io(path, e))?;
    buf.push(b'\n');
    std::fs::write(path, buf).map_err(|e| LauncherError::settings_io(path, e))?;
    tracing::info!(path = %path.display(), "settings saved");
    Ok(())
}

pub fn load_settings(path: &Path) -> Result<Settings, LauncherError> {
    let data = std::fs::read_to_string(path).map_err(|e| LauncherError::settings_io(path, e))?;
    let settings: Settings =
        serde_json::from_str(&data).map_err(|e| LauncherError::settings_io(path, e))?;
    tracing::info!(path = %path.display(), options = settings.options.len(), "settings loaded");
    Ok(settings)
}
