use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Work,
    Break,
    LongBreak,
}

impl Phase {
    pub fn is_break(self) -> bool {
        matches!(self, Phase::Break | Phase::LongBreak)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Work => "work",
            Phase::Break => "break",
            Phase::LongBreak => "long break",
        };
        f.write_str(s)
    }
}

/// Configured length of each phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseDurations {
    pub work_minutes: u32,
    pub break_minutes: u32,
    pub long_break_minutes: u32,
    /// Every n-th completed work phase is followed by a long break.
    pub long_break_interval: u32,
}

impl PhaseDurations {
    pub fn minutes(&self, phase: Phase) -> u32 {
        match phase {
            Phase::Work => self.work_minutes,
            Phase::Break => self.break_minutes,
            Phase::LongBreak => self.long_break_minutes,
        }
    }

    /// Phase length in seconds.
    ///
    /// Uses saturating arithmetic so absurd configured values cannot overflow.
    pub fn seconds(&self, phase: Phase) -> u64 {
        u64::from(self.minutes(phase)).saturating_mul(60)
    }

    /// Break that follows the `session_count`-th completed work phase.
    pub fn break_after(&self, session_count: u32) -> Phase {
        let interval = self.long_break_interval.max(1);
        if session_count > 0 && session_count % interval == 0 {
            Phase::LongBreak
        } else {
            Phase::Break
        }
    }
}

impl Default for PhaseDurations {
    fn default() -> Self {
        Self {
            work_minutes: 25,
            break_minutes: 5,
            long_break_minutes: 15,
            long_break_interval: 4,
        }
    }
}
