use std::time::Instant;

use serde::Serialize;

use super::cues::{Cue, SoundPrefs};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TimerStatus {
    Running,
    Paused,
    /// Reached the target duration.
    Completed,
    /// Halted before the target (ended early or abandoned).
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimerEvent {
    Cue(Cue),
    /// Emitted exactly once, on the poll that crosses the target.
    Completed,
}

/// Wall-clock countdown for one focus session.
///
/// Elapsed time is derived from an anchor instant rather than counted in
/// ticks, so irregular polling never makes the clock drift. Pausing folds
/// the running window into `elapsed_baseline`; resuming captures a new
/// anchor.
#[derive(Debug, Clone)]
pub struct SessionTimer {
    total_seconds: u32,
    status: TimerStatus,
    prefs: SoundPrefs,
    /// Seconds accumulated before `running_anchor`.
    elapsed_baseline: f64,
    running_anchor: Option<Instant>,
    /// Last observed elapsed seconds.
    elapsed: f64,
    last_tick_second: Option<u64>,
    last_minutes_left: u32,
}

impl SessionTimer {
    pub fn start(total_seconds: u32, prefs: SoundPrefs, now: Instant) -> Self {
        Self {
            total_seconds,
            status: TimerStatus::Running,
            prefs,
            elapsed_baseline: 0.0,
            running_anchor: Some(now),
            elapsed: 0.0,
            last_tick_second: None,
            last_minutes_left: total_seconds.div_ceil(60),
        }
    }

    pub fn total_seconds(&self) -> u32 {
        self.total_seconds
    }

    pub fn status(&self) -> TimerStatus {
        self.status
    }

    pub fn prefs(&self) -> SoundPrefs {
        self.prefs
    }

    pub fn set_prefs(&mut self, prefs: SoundPrefs) {
        self.prefs = prefs;
    }

    pub fn is_running(&self) -> bool {
        self.status == TimerStatus::Running
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, TimerStatus::Completed | TimerStatus::Stopped)
    }

    /// Elapsed seconds as of the last poll, pause or stop.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Elapsed seconds at `now` without advancing any state.
    pub fn elapsed_at(&self, now: Instant) -> f64 {
        match self.running_anchor {
            Some(anchor) => (self.elapsed_baseline
                + now.saturating_duration_since(anchor).as_secs_f64())
            .min(self.total_seconds as f64),
            None => self.elapsed,
        }
    }

    pub fn remaining(&self) -> f64 {
        (self.total_seconds as f64 - self.elapsed).max(0.0)
    }

    /// Advance to `now` and report any cues or completion crossed since the
    /// previous poll. Each second and each minute boundary is reported at
    /// most once, however far apart polls are.
    pub fn poll(&mut self, now: Instant) -> Vec<TimerEvent> {
        let Some(anchor) = self.running_anchor else {
            return Vec::new();
        };

        let mut events = Vec::new();
        let total = self.total_seconds as f64;
        let raw = self.elapsed_baseline + now.saturating_duration_since(anchor).as_secs_f64();

        if raw >= total {
            self.elapsed = total;
            self.elapsed_baseline = total;
            self.running_anchor = None;
            self.status = TimerStatus::Completed;
            if self.prefs.completion {
                events.push(TimerEvent::Cue(Cue::Completion));
            }
            events.push(TimerEvent::Completed);
            return events;
        }

        self.elapsed = raw;

        let second = raw.floor() as u64;
        if self.last_tick_second.map_or(true, |last| second > last) {
            self.last_tick_second = Some(second);
            if self.prefs.tick {
                events.push(TimerEvent::Cue(Cue::Tick));
            }
        }

        let minutes_left = ((total - raw) / 60.0).floor() as u32;
        if minutes_left >= 1 && minutes_left < self.last_minutes_left && self.prefs.chime {
            events.push(TimerEvent::Cue(Cue::Chime(minutes_left)));
        }
        self.last_minutes_left = self.last_minutes_left.min(minutes_left);

        events
    }

    /// Freeze the clock. A pause that lands past the target completes the
    /// session instead, and the completion events are returned.
    pub fn pause(&mut self, now: Instant) -> Vec<TimerEvent> {
        if self.status != TimerStatus::Running {
            return Vec::new();
        }
        let events = self.poll(now);
        if self.status == TimerStatus::Running {
            self.elapsed_baseline = self.elapsed;
            self.running_anchor = None;
            self.status = TimerStatus::Paused;
        }
        events
    }

    pub fn resume(&mut self, now: Instant) {
        if self.status == TimerStatus::Paused {
            self.elapsed_baseline = self.elapsed;
            self.running_anchor = Some(now);
            self.status = TimerStatus::Running;
        }
    }

    pub fn toggle_pause(&mut self, now: Instant) -> Vec<TimerEvent> {
        match self.status {
            TimerStatus::Running => self.pause(now),
            TimerStatus::Paused => {
                self.resume(now);
                Vec::new()
            }
            TimerStatus::Completed | TimerStatus::Stopped => Vec::new(),
        }
    }

    /// Halt without completing. Returns the frozen elapsed seconds.
    pub fn stop(&mut self, now: Instant) -> f64 {
        if self.status == TimerStatus::Running {
            self.elapsed = self.elapsed_at(now);
        }
        if self.status != TimerStatus::Completed {
            self.status = TimerStatus::Stopped;
        }
        self.elapsed_baseline = self.elapsed;
        self.running_anchor = None;
        self.elapsed
    }
}
