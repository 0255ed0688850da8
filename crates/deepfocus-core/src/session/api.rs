use async_trait::async_trait;

use super::types::{CompletedSession, FocusSession, RemoteStats, StartSession};
use crate::error::ApiError;

/// Remote focus-session backend.
///
/// Implementations must be cheap to share: the session manager clones an
/// `Arc` of the backend into every spawned request.
#[async_trait]
pub trait FocusApi: Send + Sync {
    /// `POST /focus/start`
    async fn start(&self, request: StartSession) -> Result<FocusSession, ApiError>;

    /// `PUT /focus/{id}/complete`
    async fn complete(
        &self,
        id: &str,
        completed_duration: u32,
    ) -> Result<CompletedSession, ApiError>;

    /// `PUT /focus/{id}/abandon`
    async fn abandon(&self, id: &str) -> Result<(), ApiError>;

    /// `GET /focus/history`
    async fn history(&self) -> Result<Vec<FocusSession>, ApiError>;

    /// `GET /focus/stats`
    async fn stats(&self) -> Result<RemoteStats, ApiError>;
}
