//! Timer events to remote session actions.
//!
//! The whole lifecycle policy is the single table in [`transition`]. It looks
//! at the timer state *before* an event and the event itself; nothing else
//! decides when a session is opened, completed or abandoned.

use serde::{Deserialize, Serialize};

use crate::events::Event;
use crate::timer::{Phase, PhaseDurations, TimerState};

/// The part of the timer state the lifecycle cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "phase", rename_all = "snake_case")]
pub enum LifecycleState {
    Idle,
    Running(Phase),
    Paused(Phase),
}

impl From<TimerState> for LifecycleState {
    fn from(state: TimerState) -> Self {
        match (state.is_active, state.is_paused) {
            (false, _) => LifecycleState::Idle,
            (true, false) => LifecycleState::Running(state.phase),
            (true, true) => LifecycleState::Paused(state.phase),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum LifecycleAction {
    /// A work phase began running.
    Open { planned_minutes: u32 },
    /// A work phase ran down to zero.
    Complete { completed_minutes: u32 },
    /// An active timer was reset or left.
    Abandon,
}

/// `(previous state, event) -> action`.
///
/// | previous          | event                                   | action   |
/// |-------------------|-----------------------------------------|----------|
/// | Idle              | TimerStarted(work)                      | Open     |
/// | any               | PhaseCompleted(next work, auto-started) | Open     |
/// | Running(work)     | PhaseCompleted(work, not skipped)       | Complete |
/// | Running / Paused  | TimerReset                              | Abandon  |
/// | anything else     |                                         | none     |
pub fn transition(
    previous: LifecycleState,
    event: &Event,
    durations: &PhaseDurations,
) -> Option<LifecycleAction> {
    match (previous, event) {
        (
            LifecycleState::Idle,
            Event::TimerStarted {
                phase: Phase::Work,
                ..
            },
        ) => Some(LifecycleAction::Open {
            planned_minutes: durations.minutes(Phase::Work),
        }),

        (
            LifecycleState::Running(Phase::Work),
            Event::PhaseCompleted {
                finished: Phase::Work,
                skipped: false,
                planned_minutes,
                ..
            },
        ) => Some(LifecycleAction::Complete {
            completed_minutes: *planned_minutes,
        }),

        (
            _,
            Event::PhaseCompleted {
                next: Phase::Work,
                auto_started: true,
                ..
            },
        ) => Some(LifecycleAction::Open {
            planned_minutes: durations.minutes(Phase::Work),
        }),

        (
            LifecycleState::Running(_) | LifecycleState::Paused(_),
            Event::TimerReset { .. },
        ) => Some(LifecycleAction::Abandon),

        _ => None,
    }
}
