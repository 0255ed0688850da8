//! Timer engine implementation.
//!
//! The timer engine is a wall-clock-based state machine. It does not use
//! internal threads - the caller is responsible for calling `tick()` about
//! once per second. Remaining time is recomputed from an anchor timestamp on
//! every tick, so missed ticks (a suspended process, a sleeping laptop) never
//! make the countdown drift.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused
//!           |
//!           +-- remaining == 0 --> next phase (Running if autostart, else Idle)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new(PhaseDurations::default(), false);
//! engine.start()?;
//! // In a loop:
//! engine.tick(); // Returns Some(Event::PhaseCompleted) when a phase ends
//! ```
//!
//! Every command has an `*_at(now_ms)` form taking epoch milliseconds; the
//! plain form reads the system clock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::phase::{Phase, PhaseDurations};
use crate::error::TimerError;
use crate::events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Idle,
    Running,
    Paused,
}

/// Observable countdown state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerState {
    pub phase: Phase,
    pub seconds_remaining: u64,
    pub is_active: bool,
    /// Only meaningful while `is_active`.
    pub is_paused: bool,
    /// Completed work phases since the last reset.
    pub session_count: u32,
}

impl TimerState {
    pub fn status(&self) -> TimerStatus {
        match (self.is_active, self.is_paused) {
            (false, _) => TimerStatus::Idle,
            (true, false) => TimerStatus::Running,
            (true, true) => TimerStatus::Paused,
        }
    }
}

/// Core timer engine.
///
/// Operates on wall-clock deltas -- no internal thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerEngine {
    durations: PhaseDurations,
    /// Duration change received while running; applied at the next phase
    /// transition or reset.
    #[serde(default)]
    pending_durations: Option<PhaseDurations>,
    autostart: bool,
    phase: Phase,
    seconds_remaining: u64,
    is_active: bool,
    is_paused: bool,
    session_count: u32,
    /// Epoch ms at which the current phase would have started had it never
    /// been paused.
    #[serde(default)]
    anchor_ms: Option<u64>,
    /// Elapsed ms frozen at the moment of pausing.
    #[serde(default)]
    paused_elapsed_ms: u64,
}

impl TimerEngine {
    /// Create an idle engine with a work phase loaded.
    pub fn new(durations: PhaseDurations, autostart: bool) -> Self {
        Self {
            durations,
            pending_durations: None,
            autostart,
            phase: Phase::Work,
            seconds_remaining: durations.seconds(Phase::Work),
            is_active: false,
            is_paused: false,
            session_count: 0,
            anchor_ms: None,
            paused_elapsed_ms: 0,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        TimerState {
            phase: self.phase,
            seconds_remaining: self.seconds_remaining,
            is_active: self.is_active,
            is_paused: self.is_paused,
            session_count: self.session_count,
        }
    }

    pub fn status(&self) -> TimerStatus {
        self.state().status()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn seconds_remaining(&self) -> u64 {
        self.seconds_remaining
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn is_paused(&self) -> bool {
        self.is_paused
    }

    pub fn session_count(&self) -> u32 {
        self.session_count
    }

    pub fn durations(&self) -> PhaseDurations {
        self.durations
    }

    pub fn pending_durations(&self) -> Option<PhaseDurations> {
        self.pending_durations
    }

    pub fn autostart(&self) -> bool {
        self.autostart
    }

    /// Full length of the current phase in seconds.
    pub fn total_secs(&self) -> u64 {
        self.durations.seconds(self.phase)
    }

    pub fn snapshot(&self) -> Event {
        self.snapshot_at(now_ms())
    }

    pub fn snapshot_at(&self, now_ms: u64) -> Event {
        Event::StateSnapshot {
            status: self.status(),
            phase: self.phase,
            seconds_remaining: self.seconds_remaining,
            total_secs: self.total_secs(),
            session_count: self.session_count,
            at: to_datetime(now_ms),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self) -> Result<Event, TimerError> {
        self.start_at(now_ms())
    }

    pub fn start_at(&mut self, now_ms: u64) -> Result<Event, TimerError> {
        if self.is_active {
            return Err(TimerError::AlreadyActive);
        }
        let done_ms = self
            .total_secs()
            .saturating_sub(self.seconds_remaining)
            .saturating_mul(1000);
        self.anchor_ms = Some(now_ms.saturating_sub(done_ms));
        self.paused_elapsed_ms = 0;
        self.is_active = true;
        self.is_paused = false;
        Ok(Event::TimerStarted {
            phase: self.phase,
            duration_secs: self.seconds_remaining,
            at: to_datetime(now_ms),
        })
    }

    pub fn pause(&mut self) -> Result<Event, TimerError> {
        self.pause_at(now_ms())
    }

    pub fn pause_at(&mut self, now_ms: u64) -> Result<Event, TimerError> {
        if !self.is_active {
            return Err(TimerError::NotActive);
        }
        if self.is_paused {
            return Err(TimerError::AlreadyPaused);
        }
        let elapsed = self.elapsed_ms(now_ms);
        self.paused_elapsed_ms = elapsed;
        self.seconds_remaining = self.seconds_remaining.min(self.remaining_after(elapsed));
        self.is_paused = true;
        Ok(Event::TimerPaused {
            remaining_secs: self.seconds_remaining,
            at: to_datetime(now_ms),
        })
    }

    pub fn resume(&mut self) -> Result<Event, TimerError> {
        self.resume_at(now_ms())
    }

    pub fn resume_at(&mut self, now_ms: u64) -> Result<Event, TimerError> {
        if !self.is_active {
            return Err(TimerError::NotActive);
        }
        if !self.is_paused {
            return Err(TimerError::NotPaused);
        }
        self.anchor_ms = Some(now_ms.saturating_sub(self.paused_elapsed_ms));
        self.is_paused = false;
        Ok(Event::TimerResumed {
            remaining_secs: self.seconds_remaining,
            at: to_datetime(now_ms),
        })
    }

    /// End a break early. Runs the same transition as natural completion.
    pub fn skip(&mut self) -> Result<Event, TimerError> {
        self.skip_at(now_ms())
    }

    pub fn skip_at(&mut self, now_ms: u64) -> Result<Event, TimerError> {
        if !self.phase.is_break() {
            return Err(TimerError::CannotSkip(self.phase));
        }
        Ok(self.transition(now_ms, now_ms, true))
    }

    /// Back to an idle work phase with the session count cleared.
    pub fn reset(&mut self) -> Event {
        self.reset_at(now_ms())
    }

    pub fn reset_at(&mut self, now_ms: u64) -> Event {
        let was_active = self.is_active;
        if let Some(durations) = self.pending_durations.take() {
            self.durations = durations;
        }
        self.phase = Phase::Work;
        self.seconds_remaining = self.durations.seconds(Phase::Work);
        self.is_active = false;
        self.is_paused = false;
        self.session_count = 0;
        self.anchor_ms = None;
        self.paused_elapsed_ms = 0;
        Event::TimerReset {
            was_active,
            at: to_datetime(now_ms),
        }
    }

    /// Call periodically. Returns `Some(Event::PhaseCompleted)` when a phase ends.
    pub fn tick(&mut self) -> Option<Event> {
        self.tick_at(now_ms())
    }

    pub fn tick_at(&mut self, now_ms: u64) -> Option<Event> {
        if !self.is_active || self.is_paused {
            return None;
        }
        let anchor = *self.anchor_ms.get_or_insert(now_ms);
        let elapsed = now_ms.saturating_sub(anchor);
        // A clock stepping backwards must not wind the countdown up again.
        self.seconds_remaining = self.seconds_remaining.min(self.remaining_after(elapsed));
        if self.seconds_remaining > 0 {
            return None;
        }
        let ended_at = anchor
            .saturating_add(self.total_secs().saturating_mul(1000))
            .min(now_ms);
        Some(self.transition(ended_at, now_ms, false))
    }

    /// Change phase lengths.
    ///
    /// Applied immediately while idle (re-seeding the loaded phase). While
    /// running or paused the change is held until the next phase transition
    /// or reset so the live countdown is never corrupted. Returns whether the
    /// change was applied immediately.
    pub fn set_durations(&mut self, durations: PhaseDurations) -> bool {
        if self.is_active {
            self.pending_durations = Some(durations);
            return false;
        }
        self.durations = durations;
        self.pending_durations = None;
        self.seconds_remaining = durations.seconds(self.phase);
        true
    }

    pub fn set_autostart(&mut self, autostart: bool) {
        self.autostart = autostart;
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn elapsed_ms(&self, now_ms: u64) -> u64 {
        self.anchor_ms
            .map(|anchor| now_ms.saturating_sub(anchor))
            .unwrap_or(0)
    }

    fn remaining_after(&self, elapsed_ms: u64) -> u64 {
        self.total_secs().saturating_sub(elapsed_ms / 1000)
    }

    /// Move to the next phase. `next_anchor` is when the next phase began
    /// (the exact end of the finished one for natural completion).
    fn transition(&mut self, next_anchor: u64, now_ms: u64, skipped: bool) -> Event {
        let finished = self.phase;
        let planned_minutes = self.durations.minutes(finished);
        if let Some(durations) = self.pending_durations.take() {
            self.durations = durations;
        }

        let next = if finished == Phase::Work {
            self.session_count = self.session_count.saturating_add(1);
            self.durations.break_after(self.session_count)
        } else {
            Phase::Work
        };

        self.phase = next;
        self.seconds_remaining = self.durations.seconds(next);
        self.is_paused = false;
        self.paused_elapsed_ms = 0;
        if self.autostart {
            self.is_active = true;
            self.anchor_ms = Some(next_anchor);
        } else {
            self.is_active = false;
            self.anchor_ms = None;
        }

        Event::PhaseCompleted {
            finished,
            planned_minutes,
            next,
            session_count: self.session_count,
            auto_started: self.autostart,
            skipped,
            at: to_datetime(now_ms),
        }
    }
}

impl Default for TimerEngine {
    fn default() -> Self {
        Self::new(PhaseDurations::default(), false)
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn to_datetime(epoch_ms: u64) -> DateTime<Utc> {
    i64::try_from(epoch_ms)
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: u64 = 1_700_000_000_000;

    fn minute_engine(autostart: bool) -> TimerEngine {
        TimerEngine::new(
            PhaseDurations {
                work_minutes: 1,
                break_minutes: 1,
                long_break_minutes: 2,
                long_break_interval: 4,
            },
            autostart,
        )
    }

    fn secs(n: u64) -> u64 {
        T0 + n * 1000
    }

    #[test]
    fn start_pause_resume() {
        let mut engine = TimerEngine::default();
        assert_eq!(engine.status(), TimerStatus::Idle);

        assert!(engine.start_at(T0).is_ok());
        assert_eq!(engine.status(), TimerStatus::Running);

        assert!(engine.pause_at(secs(5)).is_ok());
        assert_eq!(engine.status(), TimerStatus::Paused);

        assert!(engine.resume_at(secs(50)).is_ok());
        assert_eq!(engine.status(), TimerStatus::Running);
    }

    #[test]
    fn start_twice_is_rejected() {
        let mut engine = TimerEngine::default();
        engine.start_at(T0).unwrap();
        assert_eq!(engine.start_at(T0), Err(TimerError::AlreadyActive));
    }

    #[test]
    fn pause_and_resume_require_active_timer() {
        let mut engine = TimerEngine::default();
        assert_eq!(engine.pause_at(T0), Err(TimerError::NotActive));
        assert_eq!(engine.resume_at(T0), Err(TimerError::NotActive));
        engine.start_at(T0).unwrap();
        assert_eq!(engine.resume_at(T0), Err(TimerError::NotPaused));
        engine.pause_at(T0).unwrap();
        assert_eq!(engine.pause_at(T0), Err(TimerError::AlreadyPaused));
    }

    #[test]
    fn tick_recomputes_from_anchor_after_missed_ticks() {
        let mut engine = TimerEngine::default();
        engine.start_at(T0).unwrap();
        // No ticks for ten minutes, then one.
        assert!(engine.tick_at(secs(600)).is_none());
        assert_eq!(engine.seconds_remaining(), 25 * 60 - 600);
        assert!(engine.tick_at(secs(600) + 999).is_none());
        assert_eq!(engine.seconds_remaining(), 25 * 60 - 600);
    }

    #[test]
    fn paused_time_is_not_counted() {
        let mut engine = TimerEngine::default();
        engine.start_at(T0).unwrap();
        engine.tick_at(secs(100));
        engine.pause_at(secs(100)).unwrap();
        assert!(engine.tick_at(secs(5000)).is_none());
        assert_eq!(engine.seconds_remaining(), 1400);
        engine.resume_at(secs(5000)).unwrap();
        engine.tick_at(secs(5010));
        assert_eq!(engine.seconds_remaining(), 1390);
    }

    #[test]
    fn backwards_clock_does_not_increase_remaining() {
        let mut engine = TimerEngine::default();
        engine.start_at(T0).unwrap();
        engine.tick_at(secs(30));
        engine.tick_at(secs(10));
        assert_eq!(engine.seconds_remaining(), 25 * 60 - 30);
    }

    #[test]
    fn work_completion_loads_break_and_goes_idle() {
        let mut engine = minute_engine(false);
        engine.start_at(T0).unwrap();
        assert!(engine.tick_at(secs(59)).is_none());

        let event = engine.tick_at(secs(60)).expect("phase should complete");
        match event {
            Event::PhaseCompleted {
                finished,
                planned_minutes,
                next,
                session_count,
                auto_started,
                skipped,
                ..
            } => {
                assert_eq!(finished, Phase::Work);
                assert_eq!(planned_minutes, 1);
                assert_eq!(next, Phase::Break);
                assert_eq!(session_count, 1);
                assert!(!auto_started);
                assert!(!skipped);
            }
            other => panic!("Expected PhaseCompleted, got {other:?}"),
        }

        let state = engine.state();
        assert!(!state.is_active);
        assert_eq!(state.phase, Phase::Break);
        assert_eq!(state.seconds_remaining, 60);
        assert_eq!(state.session_count, 1);
        assert!(engine.tick_at(secs(120)).is_none());
    }

    #[test]
    fn autostart_anchors_next_phase_at_previous_end() {
        let mut engine = minute_engine(true);
        engine.start_at(T0).unwrap();
        // The tick arrives 20s late; the break already ran for 20s.
        engine.tick_at(secs(80)).expect("work completes");
        assert!(engine.is_active());
        assert_eq!(engine.phase(), Phase::Break);
        assert!(engine.tick_at(secs(81)).is_none());
        assert_eq!(engine.seconds_remaining(), 39);
    }

    #[test]
    fn fourth_work_phase_is_followed_by_long_break() {
        let mut engine = minute_engine(true);
        let mut now = T0;
        engine.start_at(now).unwrap();
        let mut breaks = Vec::new();
        while breaks.len() < 4 {
            now += 1000;
            if let Some(Event::PhaseCompleted { finished, next, .. }) = engine.tick_at(now) {
                if finished == Phase::Work {
                    breaks.push(next);
                }
            }
        }
        assert_eq!(
            breaks,
            vec![Phase::Break, Phase::Break, Phase::Break, Phase::LongBreak]
        );
        assert_eq!(engine.session_count(), 4);
        assert_eq!(engine.seconds_remaining(), 120);
    }

    #[test]
    fn skip_only_allowed_during_breaks() {
        let mut engine = minute_engine(false);
        assert_eq!(engine.skip_at(T0), Err(TimerError::CannotSkip(Phase::Work)));

        engine.start_at(T0).unwrap();
        engine.tick_at(secs(60)).unwrap();
        engine.start_at(secs(61)).unwrap();
        let event = engine.skip_at(secs(70)).unwrap();
        assert!(matches!(
            event,
            Event::PhaseCompleted {
                finished: Phase::Break,
                next: Phase::Work,
                skipped: true,
                ..
            }
        ));
        assert_eq!(engine.phase(), Phase::Work);
        assert_eq!(engine.session_count(), 1);
        assert!(!engine.is_active());
    }

    #[test]
    fn reset_goes_to_idle_work() {
        let mut engine = minute_engine(true);
        engine.start_at(T0).unwrap();
        engine.tick_at(secs(60));
        engine.pause_at(secs(65)).unwrap();

        let event = engine.reset_at(secs(66));
        assert!(matches!(event, Event::TimerReset { was_active: true, .. }));
        let state = engine.state();
        assert_eq!(state.phase, Phase::Work);
        assert_eq!(state.session_count, 0);
        assert!(!state.is_active);
        assert!(!state.is_paused);
        assert_eq!(state.seconds_remaining, 60);
    }

    #[test]
    fn duration_change_while_idle_reseeds() {
        let mut engine = TimerEngine::default();
        let applied = engine.set_durations(PhaseDurations {
            work_minutes: 50,
            ..PhaseDurations::default()
        });
        assert!(applied);
        assert_eq!(engine.seconds_remaining(), 50 * 60);
    }

    #[test]
    fn duration_change_while_running_is_deferred() {
        let mut engine = minute_engine(false);
        engine.start_at(T0).unwrap();
        engine.tick_at(secs(10));
        let applied = engine.set_durations(PhaseDurations {
            work_minutes: 30,
            break_minutes: 10,
            long_break_minutes: 20,
            long_break_interval: 4,
        });
        assert!(!applied);
        engine.tick_at(secs(20));
        assert_eq!(engine.seconds_remaining(), 40);
        assert_eq!(engine.total_secs(), 60);

        engine.tick_at(secs(60)).expect("original minute still ends the phase");
        assert_eq!(engine.phase(), Phase::Break);
        assert_eq!(engine.seconds_remaining(), 10 * 60);
        assert!(engine.pending_durations().is_none());
    }

    #[test]
    fn snapshot_returns_valid_event() {
        let engine = TimerEngine::default();
        match engine.snapshot_at(T0) {
            Event::StateSnapshot {
                status,
                phase,
                seconds_remaining,
                total_secs,
                ..
            } => {
                assert_eq!(status, TimerStatus::Idle);
                assert_eq!(phase, Phase::Work);
                assert_eq!(seconds_remaining, 25 * 60);
                assert_eq!(total_secs, 25 * 60);
            }
            _ => panic!("Expected StateSnapshot"),
        }
    }

    #[test]
    fn engine_survives_serde_roundtrip_mid_phase() {
        let mut engine = TimerEngine::default();
        engine.start_at(T0).unwrap();
        let json = serde_json::to_string(&engine).unwrap();
        let mut restored: TimerEngine = serde_json::from_str(&json).unwrap();
        restored.tick_at(secs(90));
        assert_eq!(restored.seconds_remaining(), 25 * 60 - 90);
    }
}
