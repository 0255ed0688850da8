//! # DeepFocus Core Library
//!
//! This library provides the focus-session engine behind the `deepfocus` CLI:
//! a drift-free Pomodoro countdown, procedurally generated ambient noise, and
//! remote recording of completed focus sessions. Front ends stay thin; they
//! forward user commands and call `tick()` about once per second.
//!
//! ## Architecture
//!
//! - **Timer Engine**: A wall-clock-based state machine that requires the caller
//!   to periodically invoke `tick()` for progress updates
//! - **Audio**: Seamless looping white, pink and brown noise rendered into an
//!   audio graph behind the [`AudioPort`] trait
//! - **Session**: Opens, completes and abandons sessions on a REST backend
//!   without ever blocking the countdown
//! - **Storage**: TOML-based settings with debounced writes
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: Core timer state machine
//! - [`NoiseSynth`]: Ambient sound playback
//! - [`SessionManager`]: Remote session bookkeeping
//! - [`SettingsRepository`]: Settings persistence
//! - [`FocusController`]: Wires the above together

pub mod audio;
pub mod controller;
pub mod error;
pub mod events;
pub mod notice;
pub mod notify;
pub mod session;
pub mod storage;
pub mod timer;

pub use audio::{AudioPort, Mixer, NoiseSynth, SoundId};
pub use controller::{FocusController, FocusTarget};
pub use error::{ApiError, AudioError, CoreError, NotifyError, SettingsError, TimerError};
pub use events::Event;
pub use notice::{Notice, NoticeBoard, NoticeLevel};
pub use notify::{DesktopNotifier, Notifier, Permission};
pub use session::{FocusApi, FocusSession, HttpFocusApi, SessionManager};
pub use storage::{Settings, SettingsRepository};
pub use timer::{Clock, ManualClock, Phase, PhaseDurations, SystemClock, TimerEngine, TimerState};
