use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::focus::MindStateEntry;
use crate::stats::SessionStats;

/// One stored attempt at a day.
///
/// Sessions are written once when an attempt ends (completed, ended early or
/// abandoned) and never updated. A day can have several attempts; only a
/// completed one moves the user on to the next day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub day_number: u32,
    /// Target duration in seconds.
    pub duration: u32,
    pub completed: bool,
    /// Seconds actually spent, if recorded.
    pub actual_time: Option<u32>,
    pub clear_percent: u32,
    pub thought_count: u32,
    pub mind_state_log: Vec<MindStateEntry>,
    /// Calendar day the attempt was made on. Independent of `day_number`.
    pub session_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Input for storing an attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionInput {
    pub day_number: u32,
    pub duration: u32,
    #[serde(default = "default_completed")]
    pub completed: bool,
    /// Defaults to `duration` when omitted.
    #[serde(default)]
    pub actual_time: Option<u32>,
    pub clear_percent: u32,
    #[serde(default)]
    pub thought_count: u32,
    #[serde(default)]
    pub mind_state_log: Vec<MindStateEntry>,
    pub session_date: NaiveDate,
}

fn default_completed() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session: Session,
}

/// A user's sessions with the statistics derived from them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsResponse {
    pub sessions: Vec<Session>,
    pub stats: SessionStats,
}

/// The latest attempt at one day plus the thoughts captured during it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDetailResponse {
    pub session: Session,
    pub thoughts: Vec<super::Thought>,
}
