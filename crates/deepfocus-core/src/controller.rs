//! Focus controller: the one place where timer, sound, sessions and settings
//! meet.
//!
//! Front ends call the command methods and drive [`FocusController::tick`]
//! about once per second. Every engine event is routed through the lifecycle
//! table before the call returns, so a completed phase is reported to the
//! session manager before the engine can advance again.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::audio::{AmbientConfig, AudioPort, NoiseSynth, SoundId};
use crate::error::{CoreError, SettingsError};
use crate::events::Event;
use crate::notice::{NoticeBoard, NoticeLevel};
use crate::notify::{phase_message, Notifier, Permission};
use crate::session::{
    transition, FocusApi, LifecycleAction, LifecycleState, SessionManager, SessionOp,
    SessionOutcome, StartSession,
};
use crate::storage::SettingsRepository;
use crate::timer::{Clock, Phase, TimerEngine, TimerState};

/// Task and goal attached to sessions opened from now on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FocusTarget {
    pub task_id: Option<String>,
    pub goal_id: Option<String>,
}

pub struct FocusController<P: AudioPort> {
    engine: TimerEngine,
    synth: NoiseSynth<P>,
    sessions: SessionManager,
    settings: SettingsRepository,
    notifier: Box<dyn Notifier>,
    notices: NoticeBoard,
    clock: Arc<dyn Clock>,
    target: FocusTarget,
}

impl<P: AudioPort> FocusController<P> {
    /// Build from loaded settings. Nothing audible happens and no permission
    /// is requested until the user acts.
    pub fn new(
        settings: SettingsRepository,
        port: P,
        api: Option<Arc<dyn FocusApi>>,
        notifier: Box<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let current = settings.settings();
        let engine = TimerEngine::new(current.durations(), current.pomodoro.autostart);
        let synth = NoiseSynth::new(port, current.ambient.volume);
        Self {
            engine,
            synth,
            sessions: SessionManager::new(api),
            settings,
            notifier,
            notices: NoticeBoard::default(),
            clock,
            target: FocusTarget::default(),
        }
    }

    pub fn engine(&self) -> &TimerEngine {
        &self.engine
    }

    pub fn state(&self) -> TimerState {
        self.engine.state()
    }

    pub fn snapshot(&self) -> Event {
        self.engine.snapshot_at(self.clock.now_ms())
    }

    pub fn synth(&self) -> &NoiseSynth<P> {
        &self.synth
    }

    pub fn ambient(&self) -> AmbientConfig {
        AmbientConfig {
            sound_id: self.selected_sound(),
            volume: self.synth.volume(),
            is_playing: self.synth.is_playing(),
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn settings(&self) -> &SettingsRepository {
        &self.settings
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }

    pub fn dismiss_notice(&mut self, id: u64) -> bool {
        self.notices.dismiss(id)
    }

    pub fn target(&self) -> &FocusTarget {
        &self.target
    }

    pub fn set_target(&mut self, target: FocusTarget) {
        self.target = target;
    }

    // ── Timer commands ───────────────────────────────────────────────

    /// Start or restart the loaded phase. The selected ambient sound starts
    /// with it.
    pub fn start(&mut self) -> Result<Event, CoreError> {
        let previous = self.lifecycle_state();
        let event = self.engine.start_at(self.clock.now_ms())?;
        self.ensure_ambient();
        self.route(previous, &event);
        Ok(event)
    }

    pub fn pause(&mut self) -> Result<Event, CoreError> {
        let previous = self.lifecycle_state();
        let event = self.engine.pause_at(self.clock.now_ms())?;
        self.route(previous, &event);
        Ok(event)
    }

    pub fn resume(&mut self) -> Result<Event, CoreError> {
        let previous = self.lifecycle_state();
        let event = self.engine.resume_at(self.clock.now_ms())?;
        self.route(previous, &event);
        Ok(event)
    }

    /// Skip the current break.
    pub fn skip(&mut self) -> Result<Event, CoreError> {
        let previous = self.lifecycle_state();
        let event = self.engine.skip_at(self.clock.now_ms())?;
        self.route(previous, &event);
        Ok(event)
    }

    /// Back to an idle work phase. An open session is abandoned.
    pub fn reset(&mut self) -> Event {
        let previous = self.lifecycle_state();
        let event = self.engine.reset_at(self.clock.now_ms());
        self.route(previous, &event);
        event
    }

    /// The user navigated away: reset, silence the sound and write settings
    /// out.
    pub fn leave(&mut self) -> Event {
        let event = self.reset();
        self.synth.stop();
        if let Err(e) = self.settings.flush() {
            self.settings_failed(e);
        }
        event
    }

    /// Advance the countdown and handle whatever arrived since the last
    /// tick. Returns the engine event, if any.
    pub fn tick(&mut self) -> Option<Event> {
        let now = self.clock.now_ms();
        let previous = self.lifecycle_state();
        let event = self.engine.tick_at(now);
        if let Some(event) = &event {
            self.route(previous, event);
        }

        for outcome in self.sessions.poll_replies() {
            self.post_outcome(outcome);
        }

        let instant = Instant::now();
        self.synth.poll(instant);
        if let Err(e) = self.settings.poll(instant) {
            self.settings_failed(e);
        }
        self.notices.prune(now);
        event
    }

    /// Wait for every outstanding remote request and flush settings.
    pub async fn settle(&mut self) {
        for outcome in self.sessions.settle().await {
            self.post_outcome(outcome);
        }
        if let Err(e) = self.settings.flush() {
            self.settings_failed(e);
        }
    }

    // ── Sound commands ───────────────────────────────────────────────

    /// Explicit user choice: failures are reported as a notice.
    pub fn select_sound(&mut self, sound: SoundId) -> Result<(), CoreError> {
        if let Err(e) = self.synth.play(sound) {
            self.post(NoticeLevel::Warning, format!("Ambient sound unavailable: {e}"));
            return Err(e.into());
        }
        self.settings.set("ambient.sound", sound.as_str())?;
        Ok(())
    }

    pub fn stop_sound(&mut self) {
        self.synth.stop();
    }

    pub fn fade_in_sound(&mut self, duration: Duration) {
        self.synth.fade_in(duration);
    }

    pub fn fade_out_sound(&mut self, duration: Duration) {
        self.synth.fade_out(duration);
    }

    pub fn set_volume(&mut self, volume: f32) -> Result<(), CoreError> {
        self.synth.set_volume(volume);
        self.settings
            .set("ambient.volume", &self.synth.volume().to_string())?;
        Ok(())
    }

    // ── Settings ─────────────────────────────────────────────────────

    /// Validate, persist (debounced) and apply a setting.
    pub fn update_setting(&mut self, key: &str, value: &str) -> Result<(), CoreError> {
        self.settings.set(key, value)?;
        let current = self.settings.settings().clone();

        match key {
            "pomodoro.autostart" => self.engine.set_autostart(current.pomodoro.autostart),
            k if k.starts_with("pomodoro.") => {
                if !self.engine.set_durations(current.durations()) {
                    info!("phase lengths change after the current phase");
                }
            }
            "ambient.sound" => {
                if self.synth.is_playing() || self.engine.is_active() {
                    if let Err(e) = self.synth.play(current.ambient.sound) {
                        self.post(NoticeLevel::Warning, format!("Ambient sound unavailable: {e}"));
                    }
                }
            }
            "ambient.volume" => self.synth.set_volume(current.ambient.volume),
            "focus.notifications_enabled" if current.focus.notifications_enabled => {
                if self.notifier.request_permission() == Permission::Denied {
                    self.post(
                        NoticeLevel::Warning,
                        "Desktop notifications are not available",
                    );
                }
            }
            k if k.starts_with("api.") => {
                debug!(key = k, "session backend settings apply on next launch");
            }
            _ => {}
        }
        Ok(())
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn lifecycle_state(&self) -> LifecycleState {
        LifecycleState::from(self.engine.state())
    }

    fn selected_sound(&self) -> SoundId {
        self.settings.settings().ambient.sound
    }

    /// Start the selected sound if it is not already audible. Not an
    /// explicit sound request, so failure is only logged.
    fn ensure_ambient(&mut self) {
        let selected = self.selected_sound();
        if selected.is_silent() || self.synth.playing_sound() == Some(selected) {
            return;
        }
        if let Err(e) = self.synth.play(selected) {
            debug!("ambient sound not started with timer: {e}");
        }
    }

    fn route(&mut self, previous: LifecycleState, event: &Event) {
        if let Some(action) = transition(previous, event, &self.engine.durations()) {
            debug!(?previous, ?action, "session lifecycle action");
            match action {
                LifecycleAction::Open { planned_minutes } => {
                    let request = StartSession {
                        task_id: self.target.task_id.clone(),
                        goal_id: self.target.goal_id.clone(),
                        duration: planned_minutes,
                        ambient_mode: self
                            .synth
                            .playing_sound()
                            .unwrap_or(SoundId::Silent)
                            .to_string(),
                    };
                    self.sessions.start_session(request);
                }
                LifecycleAction::Complete { completed_minutes } => {
                    self.sessions.complete_session(completed_minutes);
                }
                LifecycleAction::Abandon => self.sessions.abandon_session(),
            }
        }

        if let Event::PhaseCompleted {
            finished,
            next,
            skipped: false,
            ..
        } = event
        {
            self.announce(*finished, *next);
        }
    }

    fn announce(&mut self, finished: Phase, next: Phase) {
        if !self.settings.settings().focus.notifications_enabled {
            return;
        }
        if self.notifier.request_permission() != Permission::Granted {
            return;
        }
        let (title, body) = phase_message(finished, next);
        if let Err(e) = self.notifier.notify(title, body) {
            warn!("failed to show notification: {e}");
        }
    }

    fn post_outcome(&mut self, outcome: SessionOutcome) {
        match outcome {
            SessionOutcome::Completed { points_earned, .. } => {
                self.post(
                    NoticeLevel::Info,
                    format!("Focus session recorded, +{points_earned} DP"),
                );
            }
            SessionOutcome::Failed {
                op: SessionOp::History,
                message,
            } => {
                self.post(
                    NoticeLevel::Warning,
                    format!("Couldn't refresh focus history: {message}"),
                );
            }
            SessionOutcome::Failed { op, message } => {
                self.post(
                    NoticeLevel::Warning,
                    format!("Couldn't {op} focus session: {message}"),
                );
            }
            SessionOutcome::Opened { .. }
            | SessionOutcome::Abandoned { .. }
            | SessionOutcome::HistoryRefreshed { .. } => {}
        }
    }

    fn settings_failed(&mut self, e: SettingsError) {
        warn!("{e}");
        self.post(NoticeLevel::Warning, format!("Couldn't save settings: {e}"));
    }

    fn post(&mut self, level: NoticeLevel, message: impl Into<String>) {
        let now = self.clock.now_ms();
        self.notices.post(level, message, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::fake::FakePort;
    use crate::notify::fake::FakeNotifier;
    use crate::session::fake::{Call, FakeApi};
    use crate::timer::ManualClock;
    use tempfile::TempDir;

    struct Harness {
        controller: FocusController<FakePort>,
        clock: ManualClock,
        api: Arc<FakeApi>,
        _dir: TempDir,
    }

    fn harness_with(port: FakePort, notifier: FakeNotifier, setup: &[(&str, &str)]) -> Harness {
        let dir = TempDir::new().unwrap();
        let mut settings = SettingsRepository::open(dir.path().join("settings.toml"));
        for (key, value) in setup {
            settings.set(key, value).unwrap();
        }
        let clock = ManualClock::new(1_000_000);
        let api = FakeApi::new();
        let controller = FocusController::new(
            settings,
            port,
            Some(Arc::clone(&api) as Arc<dyn FocusApi>),
            Box::new(notifier),
            Arc::new(clock.clone()),
        );
        Harness {
            controller,
            clock,
            api,
            _dir: dir,
        }
    }

    fn harness(setup: &[(&str, &str)]) -> Harness {
        harness_with(FakePort::default(), FakeNotifier::granting(), setup)
    }

    #[tokio::test]
    async fn one_minute_work_phase_completes_once() {
        let mut h = harness(&[("pomodoro.work_minutes", "1")]);
        h.controller.start().unwrap();
        h.controller.settle().await;

        for _ in 0..61 {
            h.clock.advance_secs(1);
            h.controller.tick();
        }
        h.controller.settle().await;

        let completes: Vec<_> = h
            .api
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Complete { .. }))
            .collect();
        assert_eq!(
            completes,
            vec![Call::Complete {
                id: "s-1".into(),
                minutes: 1
            }]
        );
        assert_eq!(h.controller.state().phase, Phase::Break);
        assert!(!h.controller.state().is_active);
    }

    #[tokio::test]
    async fn reset_mid_phase_abandons_and_never_completes() {
        let mut h = harness(&[]);
        h.controller.start().unwrap();
        h.controller.settle().await;
        h.clock.advance_secs(10);
        h.controller.tick();

        h.controller.reset();
        h.controller.settle().await;

        assert_eq!(h.api.count(|c| matches!(c, Call::Abandon(_))), 1);
        assert_eq!(h.api.count(|c| matches!(c, Call::Complete { .. })), 0);
        assert_eq!(h.controller.state().phase, Phase::Work);
    }

    #[tokio::test]
    async fn skipping_into_autostarted_work_keeps_pending_completion() {
        let mut h = harness(&[("pomodoro.work_minutes", "1"), ("pomodoro.autostart", "true")]);
        let gate = h.api.hold_completes();
        h.controller.start().unwrap();
        h.controller.settle().await;

        h.clock.advance_secs(60);
        h.controller.tick();
        assert_eq!(h.controller.state().phase, Phase::Break);
        assert!(h.controller.sessions().is_completing("s-1"));

        // The next work phase opens before the completion reply lands.
        h.controller.skip().unwrap();
        assert_eq!(h.controller.state().phase, Phase::Work);
        gate.notify_one();
        h.controller.settle().await;

        assert_eq!(h.controller.sessions().points_earned(), 10);
        assert_eq!(h.api.count(|c| matches!(c, Call::Abandon(_))), 0);
        assert_eq!(
            h.controller.sessions().current().and_then(|c| c.remote_id()),
            Some("s-2")
        );
        assert!(h
            .controller
            .notices()
            .active()
            .iter()
            .any(|n| n.message.contains("+10 DP")));
    }

    #[tokio::test]
    async fn failed_start_still_runs_the_timer() {
        let mut h = harness(&[]);
        h.api.fail_next_starts(1);
        h.controller.start().unwrap();
        h.controller.settle().await;

        assert!(h.controller.state().is_active);
        assert_eq!(h.controller.notices().active().len(), 1);
        assert_eq!(h.controller.notices().active()[0].level, NoticeLevel::Warning);
    }

    #[tokio::test]
    async fn start_request_carries_target_and_sound() {
        let mut h = harness(&[("ambient.sound", "rain")]);
        h.controller.set_target(FocusTarget {
            task_id: Some("t-9".into()),
            goal_id: None,
        });
        h.controller.start().unwrap();
        h.controller.settle().await;

        let Call::Start(request) = &h.api.calls()[0] else {
            panic!("expected a start call");
        };
        assert_eq!(request.task_id.as_deref(), Some("t-9"));
        assert_eq!(request.duration, 25);
        assert_eq!(request.ambient_mode, "rain");
        assert_eq!(h.controller.synth().playing_sound(), Some(SoundId::Rain));
    }

    #[tokio::test]
    async fn audio_failure_on_start_is_silent() {
        let mut h = harness_with(
            FakePort::failing(),
            FakeNotifier::granting(),
            &[("ambient.sound", "brown")],
        );
        h.controller.start().unwrap();
        assert!(h.controller.state().is_active);
        assert!(!h.controller.synth().is_playing());
        assert!(h.controller.notices().active().is_empty());
    }

    #[test]
    fn explicit_sound_failure_posts_notice() {
        let mut h = harness_with(FakePort::failing(), FakeNotifier::granting(), &[]);
        assert!(h.controller.select_sound(SoundId::White).is_err());
        assert_eq!(h.controller.notices().active().len(), 1);
        assert_eq!(h.controller.ambient().sound_id, SoundId::Silent);
    }

    #[test]
    fn select_sound_persists_choice() {
        let mut h = harness(&[]);
        h.controller.select_sound(SoundId::Pink).unwrap();
        assert_eq!(h.controller.settings().get("ambient.sound").as_deref(), Some("pink"));
        assert!(h.controller.synth().is_playing());
    }

    #[test]
    fn volume_applies_live_and_persists() {
        let mut h = harness(&[]);
        h.controller.select_sound(SoundId::Brown).unwrap();
        h.controller.set_volume(0.25).unwrap();
        assert_eq!(h.controller.synth().volume(), 0.25);
        assert_eq!(h.controller.settings().settings().ambient.volume, 0.25);
    }

    #[tokio::test]
    async fn notification_permission_is_requested_on_opt_in() {
        let notifier = FakeNotifier::granting();
        let log = notifier.log();
        let mut h = harness_with(
            FakePort::default(),
            notifier,
            &[("pomodoro.work_minutes", "1")],
        );
        assert_eq!(log.lock().unwrap().requests, 0);

        h.controller
            .update_setting("focus.notifications_enabled", "true")
            .unwrap();
        assert_eq!(log.lock().unwrap().requests, 1);

        h.controller.start().unwrap();
        h.clock.advance_secs(60);
        h.controller.tick();
        h.controller.settle().await;

        let log = log.lock().unwrap();
        assert_eq!(log.requests, 1);
        assert_eq!(
            log.sent,
            vec![(
                "Focus session complete".to_string(),
                "Time for a short break.".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn no_notification_without_opt_in() {
        let notifier = FakeNotifier::granting();
        let log = notifier.log();
        let mut h = harness_with(
            FakePort::default(),
            notifier,
            &[("pomodoro.work_minutes", "1")],
        );
        h.controller.start().unwrap();
        h.clock.advance_secs(60);
        h.controller.tick();
        h.controller.settle().await;

        let log = log.lock().unwrap();
        assert_eq!(log.requests, 0);
        assert!(log.sent.is_empty());
    }

    #[test]
    fn denied_notifications_post_a_notice() {
        let mut h = harness_with(FakePort::default(), FakeNotifier::denying(), &[]);
        h.controller
            .update_setting("focus.notifications_enabled", "true")
            .unwrap();
        assert_eq!(h.controller.notices().active().len(), 1);
    }

    #[tokio::test]
    async fn duration_change_while_running_waits_for_next_phase() {
        let mut h = harness(&[]);
        h.controller.start().unwrap();
        h.controller
            .update_setting("pomodoro.work_minutes", "50")
            .unwrap();
        assert_eq!(h.controller.engine().total_secs(), 25 * 60);
        assert_eq!(
            h.controller.engine().pending_durations().map(|d| d.work_minutes),
            Some(50)
        );
    }

    #[test]
    fn invalid_setting_is_rejected_and_kept() {
        let mut h = harness(&[]);
        assert!(h
            .controller
            .update_setting("pomodoro.work_minutes", "zero")
            .is_err());
        assert_eq!(h.controller.engine().durations().work_minutes, 25);
    }

    #[tokio::test]
    async fn leave_stops_sound_and_abandons() {
        let mut h = harness(&[("ambient.sound", "white")]);
        h.controller.start().unwrap();
        h.controller.settle().await;
        h.controller.leave();
        h.controller.settle().await;
        assert!(!h.controller.synth().is_playing());
        assert_eq!(h.api.count(|c| matches!(c, Call::Abandon(_))), 1);
        assert!(!h.controller.settings().is_dirty());
    }
}
