//! Phase-change desktop notifications.

use std::thread;

use notify_rust::Notification;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::NotifyError;
use crate::timer::Phase;

const APP_NAME: &str = "deepfocus";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// Not asked yet.
    #[default]
    Unknown,
    Granted,
    Denied,
}

pub trait Notifier: Send {
    /// Ask once; later calls return the remembered answer.
    fn request_permission(&mut self) -> Permission;

    fn notify(&mut self, title: &str, body: &str) -> Result<(), NotifyError>;
}

/// Title and body announcing the end of `finished`.
pub fn phase_message(finished: Phase, next: Phase) -> (&'static str, &'static str) {
    match (finished, next) {
        (Phase::Work, Phase::LongBreak) => ("Focus session complete", "Time for a long break."),
        (Phase::Work, _) => ("Focus session complete", "Time for a short break."),
        (_, _) => ("Break is over", "Ready to focus again?"),
    }
}

/// Native notifications through `notify-rust`.
#[derive(Debug, Default)]
pub struct DesktopNotifier {
    permission: Permission,
}

impl DesktopNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A freedesktop notification server has to be running on the session bus.
#[cfg(all(unix, not(target_os = "macos")))]
fn check_server() -> Result<(), NotifyError> {
    let info = notify_rust::get_server_information()?;
    debug!(server = %info.name, version = %info.version, "notification server found");
    Ok(())
}

#[cfg(not(all(unix, not(target_os = "macos"))))]
fn check_server() -> Result<(), NotifyError> {
    Ok(())
}

impl Notifier for DesktopNotifier {
    fn request_permission(&mut self) -> Permission {
        if self.permission != Permission::Unknown {
            return self.permission;
        }
        self.permission = match check_server() {
            Ok(()) => Permission::Granted,
            Err(e) => {
                warn!("desktop notifications unavailable: {e}");
                Permission::Denied
            }
        };
        self.permission
    }

    /// Shown from a short-lived thread so the tick loop never waits on the
    /// notification server.
    fn notify(&mut self, title: &str, body: &str) -> Result<(), NotifyError> {
        if self.permission != Permission::Granted {
            return Err(NotifyError::Unsupported);
        }
        let mut notification = Notification::new();
        notification.summary(title).body(body).appname(APP_NAME);
        thread::Builder::new()
            .name("notify".into())
            .spawn(move || {
                if let Err(e) = notification.show() {
                    warn!("failed to show notification: {e}");
                }
            })?;
        Ok(())
    }
}
