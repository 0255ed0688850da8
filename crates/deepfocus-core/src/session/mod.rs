//! Remote focus-session lifecycle.

mod api;
mod client;
pub mod lifecycle;
mod manager;
pub mod stats;
mod types;

pub use api::FocusApi;
pub use client::HttpFocusApi;
pub use lifecycle::{transition, LifecycleAction, LifecycleState};
pub use manager::{ActiveSession, SessionManager, SessionOp, SessionOutcome, SyncState};
pub use stats::{daily_stats, weekly_stats, DailyStat, WeeklyStats};
pub use types::{
    CompleteSession, CompletedSession, FocusSession, RemoteStats, SessionStatus, StartSession,
};

#[cfg(test)]
pub(crate) use manager::fake;
