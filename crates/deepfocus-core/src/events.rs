use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::{Phase, TimerStatus};

/// Every timer state change produces an Event.
/// The session lifecycle table consumes them; front ends render them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    TimerStarted {
        phase: Phase,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    /// A phase ended, either by reaching zero or by skipping a break.
    PhaseCompleted {
        finished: Phase,
        /// Configured length of the finished phase.
        planned_minutes: u32,
        next: Phase,
        session_count: u32,
        /// The next phase started running immediately.
        auto_started: bool,
        skipped: bool,
        at: DateTime<Utc>,
    },
    TimerReset {
        /// The timer was running or paused when reset.
        was_active: bool,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        status: TimerStatus,
        phase: Phase,
        seconds_remaining: u64,
        total_secs: u64,
        session_count: u32,
        at: DateTime<Utc>,
    },
}
