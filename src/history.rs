//! Day-by-day history with missed calendar days filled in.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::Session;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// `None` for a missed calendar day.
    pub day: Option<u32>,
    pub duration: u32,
    pub actual_time: u32,
    pub completed: bool,
    pub date: NaiveDate,
    pub clear_percent: u32,
    pub thought_count: u32,
    #[serde(default)]
    pub missed: bool,
}

impl HistoryEntry {
    pub fn missed(date: NaiveDate) -> Self {
        Self {
            day: None,
            duration: 0,
            actual_time: 0,
            completed: false,
            date,
            clear_percent: 0,
            thought_count: 0,
            missed: true,
        }
    }
}

impl From<&Session> for HistoryEntry {
    fn from(session: &Session) -> Self {
        Self {
            day: Some(session.day_number),
            duration: session.duration,
            actual_time: session.actual_time.unwrap_or(session.duration),
            completed: session.completed,
            date: session.session_date,
            clear_percent: session.clear_percent,
            thought_count: session.thought_count,
            missed: false,
        }
    }
}

/// Orders sessions by day number and inserts a placeholder for every
/// calendar day skipped between two consecutive sessions.
///
/// Day numbers only advance on completion, so the gaps are measured on
/// session dates. Dates that go backwards produce no placeholders.
pub fn build_history(sessions: &[Session]) -> Vec<HistoryEntry> {
    let mut sorted: Vec<&Session> = sessions.iter().collect();
    sorted.sort_by(|a, b| {
        a.day_number
            .cmp(&b.day_number)
            .then(a.created_at.cmp(&b.created_at))
    });

    let mut history = Vec::with_capacity(sorted.len());
    let mut prev_date: Option<NaiveDate> = None;
    for session in sorted {
        if let Some(prev) = prev_date {
            let gap = session.session_date.signed_duration_since(prev).num_days();
            for offset in 1..gap {
                history.push(HistoryEntry::missed(prev + Duration::days(offset)));
            }
        }
        history.push(HistoryEntry::from(session));
        prev_date = Some(session.session_date);
    }
    history
}
