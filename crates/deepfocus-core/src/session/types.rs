//! Wire types for the remote focus-session API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Active,
    Completed,
    Abandoned,
}

/// A focus session as recorded by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusSession {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_id: Option<String>,
    #[serde(default = "Utc::now")]
    pub start_time: DateTime<Utc>,
    /// Minutes.
    #[serde(default, alias = "duration")]
    pub planned_duration: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ambient_mode: Option<String>,
    #[serde(default)]
    pub status: SessionStatus,
    /// Minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points_earned: Option<u32>,
}

impl FocusSession {
    /// Minutes that count towards statistics.
    pub fn minutes(&self) -> u32 {
        self.completed_duration.unwrap_or(self.planned_duration)
    }
}

/// Body of `POST /focus/start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_id: Option<String>,
    /// Planned minutes.
    pub duration: u32,
    pub ambient_mode: String,
}

/// Body of `PUT /focus/{id}/complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteSession {
    pub completed_duration: u32,
}

/// Response of `PUT /focus/{id}/complete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedSession {
    #[serde(rename = "dpEarned", default)]
    pub dp_earned: u32,
    #[serde(flatten)]
    pub session: FocusSession,
}

/// Response of `GET /focus/stats`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteStats {
    #[serde(default)]
    pub total_sessions: u64,
    #[serde(default)]
    pub total_minutes: u64,
    #[serde(rename = "totalDP", default)]
    pub total_dp: u64,
    #[serde(default)]
    pub average_session_length: f64,
    #[serde(default)]
    pub streak: u32,
}

/// Backends disagree on whether ids are strings or numbers.
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(u64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}
