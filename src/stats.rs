//! Statistics derived from a user's stored sessions.
//!
//! Nothing here is persisted. The sessions endpoint and the public board
//! both recompute these on read from the full session list.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::Session;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub streak: u32,
    pub avg_clear_percent: u32,
    pub avg_thoughts_per_session: f64,
    pub avg_thoughts_per_minute: f64,
}

impl SessionStats {
    pub fn from_sessions(sessions: &[Session]) -> Self {
        Self {
            streak: streak(sessions),
            avg_clear_percent: avg_clear_percent(sessions),
            avg_thoughts_per_session: avg_thoughts_per_session(sessions),
            avg_thoughts_per_minute: avg_thoughts_per_minute(sessions),
        }
    }
}

/// Consecutive completed days counted back from the most recent day number.
///
/// Attempts are collapsed per day first: a day counts as completed when any
/// attempt at it completed. The count stops at the first day without a
/// completion or at a hole in the day numbers. Input order does not matter.
pub fn streak(sessions: &[Session]) -> u32 {
    let mut days: BTreeMap<u32, bool> = BTreeMap::new();
    for session in sessions {
        *days.entry(session.day_number).or_insert(false) |= session.completed;
    }

    let mut count = 0;
    let mut expected: Option<u32> = None;
    for (&day, &completed) in days.iter().rev() {
        if !completed {
            break;
        }
        if let Some(next) = expected {
            if day != next {
                break;
            }
        }
        count += 1;
        match day.checked_sub(1) {
            Some(prev) => expected = Some(prev),
            None => break,
        }
    }
    count
}

/// Mean clear-percent over completed sessions, rounded. 0 when none completed.
pub fn avg_clear_percent(sessions: &[Session]) -> u32 {
    let completed: Vec<u32> = sessions
        .iter()
        .filter(|s| s.completed)
        .map(|s| s.clear_percent)
        .collect();
    if completed.is_empty() {
        return 0;
    }
    let sum: u64 = completed.iter().map(|&c| u64::from(c)).sum();
    (sum as f64 / completed.len() as f64).round() as u32
}

/// Mean thought count over every attempt, to one decimal.
pub fn avg_thoughts_per_session(sessions: &[Session]) -> f64 {
    if sessions.is_empty() {
        return 0.0;
    }
    let sum: u64 = sessions.iter().map(|s| u64::from(s.thought_count)).sum();
    round_tenths(sum as f64 / sessions.len() as f64)
}

/// Mean of each attempt's thoughts per minute of target duration, to one
/// decimal. Zero-length sessions contribute 0.
pub fn avg_thoughts_per_minute(sessions: &[Session]) -> f64 {
    if sessions.is_empty() {
        return 0.0;
    }
    let sum: f64 = sessions
        .iter()
        .map(|s| {
            if s.duration == 0 {
                0.0
            } else {
                f64::from(s.thought_count) / (f64::from(s.duration) / 60.0)
            }
        })
        .sum();
    round_tenths(sum / sessions.len() as f64)
}

pub fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// One row of the public board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardEntry {
    pub username: String,
    pub current_day: u32,
    pub streak: u32,
    pub avg_clear: u32,
    /// Completed sessions only.
    pub total_sessions: u32,
}

impl BoardEntry {
    pub fn compute(username: impl Into<String>, current_day: u32, sessions: &[Session]) -> Self {
        Self {
            username: username.into(),
            current_day,
            streak: streak(sessions),
            avg_clear: avg_clear_percent(sessions),
            total_sessions: sessions.iter().filter(|s| s.completed).count() as u32,
        }
    }
}
