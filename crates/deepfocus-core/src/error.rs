//! Core error types for deepfocus-core.
//!
//! Every component has its own error enum; `CoreError` wraps them for callers
//! that drive the whole subsystem. Nothing in this crate treats an error as
//! fatal: the controller logs it, posts a notice and keeps the timer running.

use std::path::PathBuf;
use thiserror::Error;

use crate::timer::Phase;

/// Core error type for deepfocus-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Timer command rejected in the current state
    #[error("Timer error: {0}")]
    Timer(#[from] TimerError),

    /// Audio output or synthesis errors
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    /// Remote session API errors
    #[error("Session API error: {0}")]
    Api(#[from] ApiError),

    /// Settings errors
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    /// Desktop notification errors
    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Commands the timer engine refuses in its current state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    #[error("timer is already running")]
    AlreadyActive,

    #[error("timer is not running")]
    NotActive,

    #[error("timer is already paused")]
    AlreadyPaused,

    #[error("timer is not paused")]
    NotPaused,

    /// Only break phases can be skipped.
    #[error("cannot skip a {0} phase")]
    CannotSkip(Phase),
}

/// Audio output errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    /// The platform refused or lacks an output device
    #[error("audio output unavailable: {0}")]
    Unavailable(String),

    /// The output stream failed after it was opened
    #[error("audio stream failed: {0}")]
    Stream(String),

    /// A node handle that the port does not know about
    #[error("unknown audio node {0}")]
    UnknownNode(u64),
}

/// Remote session API errors.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid API URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("No session backend configured (set api.base_url)")]
    NotConfigured,
}

/// Settings-specific errors.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// Failed to save settings
    #[error("Failed to save settings to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid value for a known key
    #[error("Invalid settings value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Key not in the schema
    #[error("Unknown settings key: {0}")]
    UnknownKey(String),

    /// No usable config directory
    #[error("Config directory unavailable: {0}")]
    NoConfigDir(String),
}

/// Desktop notification errors.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("no notification backend available")]
    Unsupported,

    #[error("notification server unavailable: {0}")]
    Backend(#[from] notify_rust::error::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
