//! Transient, dismissible notices for the front end.
//!
//! Errors that the user should hear about (a failed remote sync, an audio
//! device that refused to open) land here instead of interrupting anything.

use serde::{Deserialize, Serialize};

/// How long a notice stays up unless dismissed.
pub const NOTICE_TTL_MS: u64 = 6_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub id: u64,
    pub level: NoticeLevel,
    pub message: String,
    pub expires_at_ms: u64,
}

#[derive(Debug, Clone)]
pub struct NoticeBoard {
    ttl_ms: u64,
    next_id: u64,
    notices: Vec<Notice>,
}

impl NoticeBoard {
    pub fn new(ttl_ms: u64) -> Self {
        Self {
            ttl_ms,
            next_id: 1,
            notices: Vec::new(),
        }
    }

    pub fn post(&mut self, level: NoticeLevel, message: impl Into<String>, now_ms: u64) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.notices.push(Notice {
            id,
            level,
            message: message.into(),
            expires_at_ms: now_ms.saturating_add(self.ttl_ms),
        });
        id
    }

    /// Returns false if the notice was already gone.
    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.notices.len();
        self.notices.retain(|n| n.id != id);
        self.notices.len() != before
    }

    pub fn prune(&mut self, now_ms: u64) {
        self.notices.retain(|n| n.expires_at_ms > now_ms);
    }

    /// Visible notices, oldest first.
    pub fn active(&self) -> &[Notice] {
        &self.notices
    }

    /// Notices posted after `id`.
    pub fn since(&self, id: u64) -> impl Iterator<Item = &Notice> {
        self.notices.iter().filter(move |n| n.id > id)
    }
}

impl Default for NoticeBoard {
    fn default() -> Self {
        Self::new(NOTICE_TTL_MS)
    }
}
