//! TOML-based user settings.
//!
//! Stores:
//! - Pomodoro phase lengths and autostart
//! - Ambient sound selection and volume
//! - Notification opt-in
//! - Remote session API endpoint
//!
//! Settings are stored at `~/.config/deepfocus/settings.toml`. Reads happen
//! once, synchronously, at startup; writes are debounced so a burst of
//! changes (a volume slider drag) lands on disk as a single write.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::data_dir;
use crate::audio::SoundId;
use crate::error::SettingsError;
use crate::timer::PhaseDurations;

/// Quiet period before pending changes are written.
pub const SAVE_DEBOUNCE: Duration = Duration::from_millis(100);

const MAX_MINUTES: u32 = 180;
const MAX_TIMEOUT_SECS: u64 = 120;

/// Every key accepted by [`Settings::set`].
pub const KEYS: [&str; 11] = [
    "pomodoro.work_minutes",
    "pomodoro.break_minutes",
    "pomodoro.long_break_minutes",
    "pomodoro.long_break_interval",
    "pomodoro.autostart",
    "ambient.sound",
    "ambient.volume",
    "focus.notifications_enabled",
    "api.base_url",
    "api.token",
    "api.timeout_secs",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PomodoroSettings {
    pub work_minutes: u32,
    pub break_minutes: u32,
    pub long_break_minutes: u32,
    pub long_break_interval: u32,
    pub autostart: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmbientSettings {
    pub sound: SoundId,
    pub volume: f32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FocusSettings {
    pub notifications_enabled: bool,
}

/// Remote session API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Empty disables remote session tracking.
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub pomodoro: PomodoroSettings,
    #[serde(default)]
    pub ambient: AmbientSettings,
    #[serde(default)]
    pub focus: FocusSettings,
    #[serde(default)]
    pub api: ApiSettings,
}

impl Default for PomodoroSettings {
    fn default() -> Self {
        let d = PhaseDurations::default();
        Self {
            work_minutes: d.work_minutes,
            break_minutes: d.break_minutes,
            long_break_minutes: d.long_break_minutes,
            long_break_interval: d.long_break_interval,
            autostart: false,
        }
    }
}

impl Default for AmbientSettings {
    fn default() -> Self {
        Self {
            sound: SoundId::Silent,
            volume: 0.5,
        }
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: None,
            timeout_secs: 10,
        }
    }
}

impl Settings {
    pub fn durations(&self) -> PhaseDurations {
        PhaseDurations {
            work_minutes: self.pomodoro.work_minutes,
            break_minutes: self.pomodoro.break_minutes,
            long_break_minutes: self.pomodoro.long_break_minutes,
            long_break_interval: self.pomodoro.long_break_interval,
        }
    }

    /// Parse settings from TOML, keeping the default for every entry that is
    /// missing or fails validation.
    pub fn from_toml_str(content: &str) -> Self {
        let mut settings = Settings::default();
        let root: toml::Value = match toml::from_str(content) {
            Ok(root) => root,
            Err(e) => {
                warn!("settings file is not valid TOML, using defaults: {e}");
                return settings;
            }
        };

        for key in KEYS {
            let Some(value) = lookup(&root, key) else {
                continue;
            };
            let raw = match value {
                toml::Value::String(s) => s.clone(),
                toml::Value::Integer(_) | toml::Value::Float(_) | toml::Value::Boolean(_) => {
                    value.to_string()
                }
                other => {
                    warn!("ignoring settings entry {key}: unexpected {}", other.type_str());
                    continue;
                }
            };
            if let Err(e) = settings.set(key, &raw) {
                warn!("ignoring settings entry: {e}");
            }
        }
        settings
    }

    /// Get a settings value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let mut current = &json;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        match current {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => Some(String::new()),
            other => Some(other.to_string()),
        }
    }

    /// Validate and set one value. On error the previous value is kept.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        let value = value.trim();
        match key {
            "pomodoro.work_minutes" => self.pomodoro.work_minutes = parse_minutes(key, value)?,
            "pomodoro.break_minutes" => self.pomodoro.break_minutes = parse_minutes(key, value)?,
            "pomodoro.long_break_minutes" => {
                self.pomodoro.long_break_minutes = parse_minutes(key, value)?
            }
            "pomodoro.long_break_interval" => {
                self.pomodoro.long_break_interval = parse_ranged(key, value, 1, 12)?
            }
            "pomodoro.autostart" => self.pomodoro.autostart = parse_bool(key, value)?,
            "ambient.sound" => {
                self.ambient.sound = value.parse().map_err(|message| invalid(key, message))?
            }
            "ambient.volume" => self.ambient.volume = parse_volume(key, value)?,
            "focus.notifications_enabled" => {
                self.focus.notifications_enabled = parse_bool(key, value)?
            }
            "api.base_url" => {
                if !value.is_empty() {
                    url::Url::parse(value).map_err(|e| invalid(key, e.to_string()))?;
                }
                self.api.base_url = value.to_string();
            }
            "api.token" => {
                self.api.token = (!value.is_empty()).then(|| value.to_string());
            }
            "api.timeout_secs" => {
                self.api.timeout_secs = parse_ranged(key, value, 1, MAX_TIMEOUT_SECS)?
            }
            _ => return Err(SettingsError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Settings file with debounced persistence.
///
/// The only component that touches the settings file.
#[derive(Debug)]
pub struct SettingsRepository {
    path: PathBuf,
    settings: Settings,
    save_due: Option<Instant>,
}

impl SettingsRepository {
    /// Open `settings.toml` in the application data directory.
    pub fn open_default() -> Result<Self, SettingsError> {
        Ok(Self::open(data_dir()?.join("settings.toml")))
    }

    /// Synchronously read `path`. A missing or unreadable file yields
    /// defaults; corrupt entries fall back one by one.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let settings = match std::fs::read_to_string(&path) {
            Ok(content) => Settings::from_toml_str(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file, using defaults");
                Settings::default()
            }
            Err(e) => {
                warn!(path = %path.display(), "cannot read settings, using defaults: {e}");
                Settings::default()
            }
        };
        Self {
            path,
            settings,
            save_due: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.settings.get(key)
    }

    /// Validate and apply a change; the write is scheduled, not performed.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        self.set_at(key, value, Instant::now())
    }

    pub fn set_at(&mut self, key: &str, value: &str, now: Instant) -> Result<(), SettingsError> {
        self.settings.set(key, value)?;
        self.save_due = Some(now + SAVE_DEBOUNCE);
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.save_due.is_some()
    }

    /// Write pending changes once the debounce window has passed.
    /// Returns whether a write happened.
    pub fn poll(&mut self, now: Instant) -> Result<bool, SettingsError> {
        match self.save_due {
            Some(due) if now >= due => {
                self.flush()?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Write pending changes immediately.
    pub fn flush(&mut self) -> Result<(), SettingsError> {
        if self.save_due.is_none() {
            return Ok(());
        }
        self.write()?;
        self.save_due = None;
        Ok(())
    }

    fn write(&self) -> Result<(), SettingsError> {
        let save_failed = |message: String| SettingsError::SaveFailed {
            path: self.path.clone(),
            message,
        };
        let content = self
            .settings
            .to_toml_string()
            .map_err(|e| save_failed(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| save_failed(e.to_string()))?;
        }
        std::fs::write(&self.path, content).map_err(|e| save_failed(e.to_string()))?;
        debug!(path = %self.path.display(), "settings saved");
        Ok(())
    }
}

fn lookup<'a>(root: &'a toml::Value, key: &str) -> Option<&'a toml::Value> {
    let mut current = root;
    for part in key.split('.') {
        current = current.get(part)?;
    }
    Some(current)
}

fn invalid(key: &str, message: impl Into<String>) -> SettingsError {
    SettingsError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}

fn parse_ranged<T>(key: &str, value: &str, min: T, max: T) -> Result<T, SettingsError>
where
    T: std::str::FromStr + PartialOrd + std::fmt::Display + Copy,
{
    let n: T = value
        .parse()
        .map_err(|_| invalid(key, format!("'{value}' is not a whole number")))?;
    if n < min || n > max {
        return Err(invalid(key, format!("{n} is outside {min}..={max}")));
    }
    Ok(n)
}

fn parse_minutes(key: &str, value: &str) -> Result<u32, SettingsError> {
    parse_ranged(key, value, 1, MAX_MINUTES)
}

fn parse_bool(key: &str, value: &str) -> Result<bool, SettingsError> {
    value
        .parse()
        .map_err(|_| invalid(key, format!("'{value}' is not true or false")))
}

fn parse_volume(key: &str, value: &str) -> Result<f32, SettingsError> {
    let v: f32 = value
        .parse()
        .map_err(|_| invalid(key, format!("'{value}' is not a number")))?;
    if !v.is_finite() || !(0.0..=1.0).contains(&v) {
        return Err(invalid(key, format!("{v} is outside 0..=1")));
    }
    Ok(v)
}
