//! Remote session bookkeeping.
//!
//! The timer never waits on the network. Every request runs on a spawned
//! task and reports back through a channel; the owner drains it with
//! [`SessionManager::poll_replies`] on each tick, or awaits everything still
//! outstanding with [`SessionManager::settle`].
//!
//! Replies are matched against the session that is current when they are
//! handled, not when they were sent. A `start` reply for a session that is no
//! longer wanted gets its remote record abandoned. Once a completion is sent
//! the session leaves `current`, so opening the next one cannot lose the
//! points the backend credits for it; only a reset discards that reply.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::api::FocusApi;
use super::types::{CompletedSession, FocusSession, SessionStatus, StartSession};
use crate::error::ApiError;

/// Remote progress of the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Start request in flight. A completion that arrives meanwhile is held.
    Starting { complete_after: Option<u32> },
    /// The backend knows the session.
    Open,
    /// The start request failed; completing retries it first.
    StartFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    key: Uuid,
    request: StartSession,
    remote_id: Option<String>,
    state: SyncState,
}

impl ActiveSession {
    /// Local identity, stable before the backend assigns an id.
    pub fn key(&self) -> Uuid {
        self.key
    }

    pub fn remote_id(&self) -> Option<&str> {
        self.remote_id.as_deref()
    }

    pub fn state(&self) -> SyncState {
        self.state
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOp {
    Start,
    Complete,
    Abandon,
    History,
}

impl fmt::Display for SessionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionOp::Start => "start",
            SessionOp::Complete => "complete",
            SessionOp::Abandon => "abandon",
            SessionOp::History => "history",
        };
        f.write_str(name)
    }
}

/// What handling a reply changed, for the front end to surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Opened { id: String },
    Completed { id: String, points_earned: u32 },
    Abandoned { id: String },
    HistoryRefreshed { sessions: usize },
    Failed { op: SessionOp, message: String },
}

enum Reply {
    Started {
        key: Uuid,
        result: Result<FocusSession, ApiError>,
    },
    Completed {
        id: String,
        result: Result<CompletedSession, ApiError>,
    },
    Abandoned {
        id: String,
        result: Result<(), ApiError>,
    },
    History(Result<Vec<FocusSession>, ApiError>),
}

pub struct SessionManager {
    api: Option<Arc<dyn FocusApi>>,
    current: Option<ActiveSession>,
    /// Remote ids whose complete request is in flight.
    completing: HashSet<String>,
    tx: mpsc::UnboundedSender<Reply>,
    rx: mpsc::UnboundedReceiver<Reply>,
    in_flight: usize,
    history: Vec<FocusSession>,
    points_earned: u64,
}

impl SessionManager {
    /// `None` runs offline: sessions are not recorded anywhere.
    pub fn new(api: Option<Arc<dyn FocusApi>>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            api,
            current: None,
            completing: HashSet::new(),
            tx,
            rx,
            in_flight: 0,
            history: Vec::new(),
            points_earned: 0,
        }
    }

    pub fn current(&self) -> Option<&ActiveSession> {
        self.current.as_ref()
    }

    /// Whether a complete request for `id` is awaiting its reply.
    pub fn is_completing(&self, id: &str) -> bool {
        self.completing.contains(id)
    }

    /// Requests sent whose replies have not been handled yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Cached history, newest last.
    pub fn history(&self) -> &[FocusSession] {
        &self.history
    }

    /// Focus points credited during this run.
    pub fn points_earned(&self) -> u64 {
        self.points_earned
    }

    /// Open a remote session. Any session still open is abandoned first so
    /// at most one is active.
    pub fn start_session(&mut self, request: StartSession) {
        self.abandon_current();
        if self.api.is_none() {
            debug!("offline, not recording session");
            return;
        }

        let key = Uuid::new_v4();
        info!(%key, minutes = request.duration, "opening focus session");
        self.current = Some(ActiveSession {
            key,
            request: request.clone(),
            remote_id: None,
            state: SyncState::Starting {
                complete_after: None,
            },
        });
        self.send_start(key, request);
    }

    /// Mark the current session completed with `completed_minutes` of focus.
    pub fn complete_session(&mut self, completed_minutes: u32) {
        let Some(current) = self.current.as_mut() else {
            debug!("no session to complete");
            return;
        };

        match current.state {
            SyncState::Open => {
                if let Some(id) = current.remote_id.clone() {
                    self.current = None;
                    self.send_complete(id, completed_minutes);
                }
            }
            SyncState::Starting { .. } => {
                debug!("completion held until the session start is acknowledged");
                current.state = SyncState::Starting {
                    complete_after: Some(completed_minutes),
                };
            }
            SyncState::StartFailed => {
                debug!("retrying session start before completing");
                current.state = SyncState::Starting {
                    complete_after: Some(completed_minutes),
                };
                let key = current.key;
                let request = current.request.clone();
                self.send_start(key, request);
            }
        }
    }

    /// The timer was reset: drop the current session, telling the backend if
    /// it knows about it, and ignore any completion reply still on its way.
    pub fn abandon_session(&mut self) {
        for id in self.completing.drain() {
            debug!(%id, "completion reply will be ignored after reset");
        }
        self.abandon_current();
    }

    fn abandon_current(&mut self) {
        let Some(current) = self.current.take() else {
            return;
        };
        match (current.state, current.remote_id) {
            (SyncState::Open, Some(id)) => {
                info!(%id, "abandoning focus session");
                self.send_abandon(id);
            }
            (SyncState::Starting { .. }, _) => {
                debug!(key = %current.key, "session dropped before start was acknowledged");
            }
            _ => {}
        }
    }

    /// Fetch history in the background; the cache is replaced when the reply
    /// is handled.
    pub fn refresh_history(&mut self) {
        let Some(api) = self.api.clone() else {
            return;
        };
        self.spawn(async move { Reply::History(api.history().await) });
    }

    /// Fetch history now, replacing the cache.
    pub async fn load_history(&mut self) -> Result<&[FocusSession], ApiError> {
        let api = self.api.clone().ok_or(ApiError::NotConfigured)?;
        self.history = api.history().await?;
        Ok(&self.history)
    }

    pub async fn remote_stats(&self) -> Result<super::RemoteStats, ApiError> {
        let api = self.api.clone().ok_or(ApiError::NotConfigured)?;
        api.stats().await
    }

    /// Handle every reply that has already arrived.
    pub fn poll_replies(&mut self) -> Vec<SessionOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(reply) = self.rx.try_recv() {
            outcomes.extend(self.handle(reply));
        }
        outcomes
    }

    /// Wait until nothing is in flight, handling replies as they arrive.
    /// Follow-up requests issued while handling are waited for too.
    pub async fn settle(&mut self) -> Vec<SessionOutcome> {
        let mut outcomes = Vec::new();
        while self.in_flight > 0 {
            match self.rx.recv().await {
                Some(reply) => outcomes.extend(self.handle(reply)),
                None => break,
            }
        }
        outcomes
    }

    fn handle(&mut self, reply: Reply) -> Option<SessionOutcome> {
        self.in_flight = self.in_flight.saturating_sub(1);
        match reply {
            Reply::Started { key, result } => self.on_started(key, result),
            Reply::Completed { id, result } => self.on_completed(id, result),
            Reply::Abandoned { id, result } => match result {
                Ok(()) => {
                    if let Some(session) = self.history.iter_mut().find(|s| s.id == id) {
                        session.status = SessionStatus::Abandoned;
                    }
                    Some(SessionOutcome::Abandoned { id })
                }
                Err(e) => {
                    warn!(%id, "failed to abandon session: {e}");
                    Some(failed(SessionOp::Abandon, &e))
                }
            },
            Reply::History(result) => match result {
                Ok(sessions) => {
                    let count = sessions.len();
                    self.history = sessions;
                    Some(SessionOutcome::HistoryRefreshed { sessions: count })
                }
                Err(e) => {
                    warn!("failed to refresh session history: {e}");
                    Some(failed(SessionOp::History, &e))
                }
            },
        }
    }

    fn on_started(
        &mut self,
        key: Uuid,
        result: Result<FocusSession, ApiError>,
    ) -> Option<SessionOutcome> {
        let complete_after = match self.current.as_ref() {
            Some(ActiveSession {
                key: current_key,
                state: SyncState::Starting { complete_after },
                ..
            }) if *current_key == key => *complete_after,
            _ => {
                // Nobody wants this session any more.
                if let Ok(session) = result {
                    debug!(id = %session.id, "abandoning session started after it was dropped");
                    self.send_abandon(session.id);
                }
                return None;
            }
        };

        match result {
            Ok(session) => {
                let id = session.id.clone();
                info!(%id, "focus session opened");
                match complete_after {
                    Some(minutes) => {
                        self.current = None;
                        self.send_complete(id.clone(), minutes);
                    }
                    None => {
                        if let Some(current) = self.current.as_mut() {
                            current.remote_id = Some(id.clone());
                            current.state = SyncState::Open;
                        }
                    }
                }
                self.history.push(session);
                Some(SessionOutcome::Opened { id })
            }
            Err(e) => {
                warn!("failed to start focus session: {e}");
                if complete_after.is_some() {
                    // Second failure, this focus time goes unrecorded.
                    self.current = None;
                } else if let Some(current) = self.current.as_mut() {
                    current.state = SyncState::StartFailed;
                }
                Some(failed(SessionOp::Start, &e))
            }
        }
    }

    fn on_completed(
        &mut self,
        id: String,
        result: Result<CompletedSession, ApiError>,
    ) -> Option<SessionOutcome> {
        if !self.completing.remove(&id) {
            debug!(%id, "dropping completion reply for a session that was reset");
            return None;
        }

        match result {
            Ok(completed) => {
                let points = completed.dp_earned;
                self.points_earned += u64::from(points);
                let mut session = completed.session;
                session.status = SessionStatus::Completed;
                session.points_earned.get_or_insert(points);
                match self.history.iter_mut().find(|s| s.id == id) {
                    Some(slot) => *slot = session,
                    None => self.history.push(session),
                }
                info!(%id, points, "focus session completed");
                self.refresh_history();
                Some(SessionOutcome::Completed {
                    id,
                    points_earned: points,
                })
            }
            Err(e) => {
                warn!(%id, "failed to complete focus session: {e}");
                Some(failed(SessionOp::Complete, &e))
            }
        }
    }

    fn send_start(&mut self, key: Uuid, request: StartSession) {
        let Some(api) = self.api.clone() else {
            return;
        };
        self.spawn(async move {
            let result = api.start(request).await;
            Reply::Started { key, result }
        });
    }

    fn send_complete(&mut self, id: String, minutes: u32) {
        let Some(api) = self.api.clone() else {
            return;
        };
        self.completing.insert(id.clone());
        self.spawn(async move {
            let result = api.complete(&id, minutes).await;
            Reply::Completed { id, result }
        });
    }

    fn send_abandon(&mut self, id: String) {
        let Some(api) = self.api.clone() else {
            return;
        };
        self.spawn(async move {
            let result = api.abandon(&id).await;
            Reply::Abandoned { id, result }
        });
    }

    fn spawn<F>(&mut self, request: F)
    where
        F: Future<Output = Reply> + Send + 'static,
    {
        let tx = self.tx.clone();
        self.in_flight += 1;
        tokio::spawn(async move {
            let reply = request.await;
            let _ = tx.send(reply);
        });
    }
}

fn failed(op: SessionOp, error: &ApiError) -> SessionOutcome {
    SessionOutcome::Failed {
        op,
        message: error.to_string(),
    }
}
