mod settings;

pub use settings::{
    AmbientSettings, ApiSettings, FocusSettings, PomodoroSettings, Settings, SettingsRepository,
    KEYS, SAVE_DEBOUNCE,
};

use std::path::PathBuf;

use crate::error::SettingsError;

/// Returns `~/.config/deepfocus[-dev]/` based on DEEPFOCUS_ENV.
///
/// Set DEEPFOCUS_ENV=dev to use a development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, SettingsError> {
    let base_dir = dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."));

    let env = std::env::var("DEEPFOCUS_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("deepfocus-dev")
    } else {
        base_dir.join("deepfocus")
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| SettingsError::NoConfigDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
