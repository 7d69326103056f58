//! Mind-state log and the clear-percent calculation.
//!
//! A session starts "clear". Every time the user acknowledges a wandering
//! thought the log gains a `Thinking` entry, and returning to focus adds a
//! `Clear` entry. The log is append-only: entries are never edited or
//! removed, and timestamps never go backwards.

use serde::{Deserialize, Serialize};

/// The two states a session alternates between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MindState {
    #[default]
    Clear,
    Thinking,
}

impl MindState {
    pub fn toggled(self) -> Self {
        match self {
            Self::Clear => Self::Thinking,
            Self::Thinking => Self::Clear,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::Thinking => "thinking",
        }
    }
}

/// One transition: from `time` seconds into the session the mind is `state`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MindStateEntry {
    pub time: f64,
    pub state: MindState,
}

impl MindStateEntry {
    pub fn new(time: f64, state: MindState) -> Self {
        Self { time, state }
    }
}

/// A contiguous stretch of one state, as fractions of the session length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MindStateSegment {
    pub start: f64,
    pub end: f64,
    pub state: MindState,
}

/// Append-only, time-ordered record of mind-state transitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MindStateLog {
    entries: Vec<MindStateEntry>,
}

impl MindStateLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transition. Times earlier than the last entry (or negative)
    /// are pulled forward so the log stays non-decreasing.
    pub fn record(&mut self, time: f64, state: MindState) -> MindStateEntry {
        let floor = self.entries.last().map_or(0.0, |e| e.time);
        let time = if time.is_finite() { time.max(floor) } else { floor };
        let entry = MindStateEntry::new(time, state);
        self.entries.push(entry);
        entry
    }

    pub fn entries(&self) -> &[MindStateEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<MindStateEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// State in effect after the last transition.
    pub fn current_state(&self) -> MindState {
        self.entries.last().map_or(MindState::Clear, |e| e.state)
    }

    pub fn clear_percent(&self, end_time: f64) -> u32 {
        clear_percent(&self.entries, end_time)
    }

    pub fn segments(&self, elapsed: f64, total_seconds: u32) -> Vec<MindStateSegment> {
        segments(&self.entries, elapsed, total_seconds, self.current_state())
    }
}

/// Percentage of `[0, end_time]` spent clear, rounded to the nearest integer.
///
/// Each entry's state holds until the next entry; an implicit `Clear` entry
/// closes the log at `end_time`. An empty log is 100% clear.
pub fn clear_percent(entries: &[MindStateEntry], end_time: f64) -> u32 {
    if entries.is_empty() || !(end_time > 0.0) {
        return 100;
    }

    let closing = MindStateEntry::new(end_time, MindState::Clear);
    let mut clear_time = 0.0;
    let mut last_time = 0.0_f64;
    let mut last_state = MindState::Clear;

    for entry in entries.iter().chain(std::iter::once(&closing)) {
        let time = entry.time.min(end_time).max(last_time);
        if last_state == MindState::Clear {
            clear_time += time - last_time;
        }
        last_time = time;
        last_state = entry.state;
    }

    let percent = (clear_time / end_time * 100.0).round();
    percent.clamp(0.0, 100.0) as u32
}

/// Split the elapsed part of a session into coloured stretches for display.
///
/// While the session is running the trailing stretch runs up to `elapsed`
/// in `current`; once finished it runs to the full length.
pub fn segments(
    entries: &[MindStateEntry],
    elapsed: f64,
    total_seconds: u32,
    current: MindState,
) -> Vec<MindStateSegment> {
    let total = total_seconds as f64;
    if elapsed <= 0.0 || total <= 0.0 {
        return Vec::new();
    }

    let boundary = if elapsed < total {
        MindStateEntry::new(elapsed, current)
    } else {
        MindStateEntry::new(total, MindState::Clear)
    };

    let mut result = Vec::new();
    let mut last_time = 0.0_f64;
    let mut last_state = MindState::Clear;

    for entry in entries.iter().chain(std::iter::once(&boundary)) {
        let time = entry.time.min(total);
        if time > last_time {
            result.push(MindStateSegment {
                start: last_time / total,
                end: time / total,
                state: last_state,
            });
            last_time = time;
        }
        last_state = entry.state;
    }

    result
}
