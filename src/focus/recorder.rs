use std::time::Instant;

use chrono::NaiveDate;

use crate::models::{CreateSessionInput, NewThought};

use super::cues::SoundPrefs;
use super::mind_state::{MindState, MindStateLog};
use super::progression::Progression;
use super::timer::{SessionTimer, TimerEvent};

/// How an attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishKind {
    /// The timer reached the day's duration.
    Completed,
    /// Stopped by the user; the result is kept and shown.
    EndedEarly,
    /// Stopped by the user; the result is stored for history only.
    Abandoned,
}

/// Everything needed to persist a finished attempt.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub kind: FinishKind,
    pub session: CreateSessionInput,
    pub thoughts: Vec<NewThought>,
}

/// One day's attempt: the timer plus everything observed while it ran.
#[derive(Debug, Clone)]
pub struct FocusRecorder {
    day_number: u32,
    timer: SessionTimer,
    log: MindStateLog,
    state: MindState,
    thought_count: u32,
    thoughts: Vec<NewThought>,
    capturing: bool,
}

impl FocusRecorder {
    pub fn begin(
        day_number: u32,
        progression: &Progression,
        prefs: SoundPrefs,
        now: Instant,
    ) -> Self {
        let duration = progression.duration_for(day_number);
        tracing::debug!("Starting day {} ({}s)", day_number, duration);
        Self {
            day_number,
            timer: SessionTimer::start(duration, prefs, now),
            log: MindStateLog::new(),
            state: MindState::Clear,
            thought_count: 0,
            thoughts: Vec::new(),
            capturing: false,
        }
    }

    pub fn day_number(&self) -> u32 {
        self.day_number
    }

    pub fn duration(&self) -> u32 {
        self.timer.total_seconds()
    }

    pub fn timer(&self) -> &SessionTimer {
        &self.timer
    }

    pub fn set_prefs(&mut self, prefs: SoundPrefs) {
        self.timer.set_prefs(prefs);
    }

    pub fn state(&self) -> MindState {
        self.state
    }

    pub fn log(&self) -> &MindStateLog {
        &self.log
    }

    pub fn thought_count(&self) -> u32 {
        self.thought_count
    }

    pub fn thoughts(&self) -> &[NewThought] {
        &self.thoughts
    }

    /// True while the capture prompt opened by an interruption is waiting.
    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    pub fn poll(&mut self, now: Instant) -> Vec<TimerEvent> {
        self.timer.poll(now)
    }

    pub fn toggle_pause(&mut self, now: Instant) -> Vec<TimerEvent> {
        self.timer.toggle_pause(now)
    }

    /// Flip between clear and thinking at the current elapsed time.
    ///
    /// Going to thinking counts an interruption and opens the capture prompt.
    pub fn toggle_mind_state(&mut self, now: Instant) -> MindState {
        let time = self.timer.elapsed_at(now);
        let next = self.state.toggled();
        self.log.record(time, next);
        self.state = next;

        match next {
            MindState::Thinking => {
                self.thought_count += 1;
                self.capturing = true;
            }
            MindState::Clear => self.capturing = false,
        }
        next
    }

    /// Store the captured thought and return to clear. Blank text is a skip.
    pub fn save_thought(&mut self, text: &str, now: Instant) {
        let text = text.trim();
        if text.is_empty() {
            self.skip_thought(now);
            return;
        }

        let time = self.timer.elapsed_at(now);
        self.thoughts.push(NewThought {
            time_in_session: time.round() as i32,
            text: text.to_string(),
        });
        self.return_to_clear(time);
    }

    pub fn skip_thought(&mut self, now: Instant) {
        let time = self.timer.elapsed_at(now);
        self.return_to_clear(time);
    }

    fn return_to_clear(&mut self, time: f64) {
        self.log.record(time, MindState::Clear);
        self.state = MindState::Clear;
        self.capturing = false;
    }

    /// Clear-percent against elapsed-so-far, or the full duration if nothing
    /// has elapsed yet. Every finish path uses this same reference.
    pub fn clear_percent(&self) -> u32 {
        let elapsed = self.timer.elapsed();
        let reference = if elapsed > 0.0 {
            elapsed
        } else {
            self.duration() as f64
        };
        self.log.clear_percent(reference)
    }

    pub fn finish(mut self, kind: FinishKind, now: Instant, session_date: NaiveDate) -> SessionRecord {
        if kind != FinishKind::Completed {
            self.timer.stop(now);
        }

        let clear_percent = self.clear_percent();
        let actual_time = self.timer.elapsed().round() as u32;
        tracing::info!(
            "Day {} finished ({:?}): {}s, {}% clear, {} thoughts",
            self.day_number,
            kind,
            actual_time,
            clear_percent,
            self.thought_count
        );

        SessionRecord {
            kind,
            session: CreateSessionInput {
                day_number: self.day_number,
                duration: self.timer.total_seconds(),
                completed: kind == FinishKind::Completed,
                actual_time: Some(actual_time),
                clear_percent,
                thought_count: self.thought_count,
                mind_state_log: self.log.into_entries(),
                session_date,
            },
            thoughts: self.thoughts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn at(start: Instant, secs: f64) -> Instant {
        start + Duration::from_secs_f64(secs)
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn begin(t0: Instant) -> FocusRecorder {
        FocusRecorder::begin(1, &Progression::new(60, 10), SoundPrefs::silent(), t0)
    }

    #[test]
    fn duration_comes_from_the_progression() {
        let recorder =
            FocusRecorder::begin(3, &Progression::new(60, 10), SoundPrefs::silent(), Instant::now());
        assert_eq!(recorder.duration(), 80);
    }

    #[test]
    fn thinking_counts_an_interruption_and_opens_capture() {
        let t0 = Instant::now();
        let mut recorder = begin(t0);

        assert_eq!(recorder.toggle_mind_state(at(t0, 5.0)), MindState::Thinking);
        assert_eq!(recorder.thought_count(), 1);
        assert!(recorder.is_capturing());

        recorder.save_thought("groceries", at(t0, 9.4));
        assert!(!recorder.is_capturing());
        assert_eq!(recorder.state(), MindState::Clear);
        assert_eq!(recorder.thoughts()[0].time_in_session, 9);
        assert_eq!(recorder.log().len(), 2);
    }

    #[test]
    fn skipping_a_capture_still_counts_the_interruption() {
        let t0 = Instant::now();
        let mut recorder = begin(t0);

        recorder.toggle_mind_state(at(t0, 5.0));
        recorder.skip_thought(at(t0, 6.0));
        assert_eq!(recorder.thought_count(), 1);
        assert!(recorder.thoughts().is_empty());
        assert_eq!(recorder.state(), MindState::Clear);
    }

    #[test]
    fn blank_thought_is_a_skip() {
        let t0 = Instant::now();
        let mut recorder = begin(t0);

        recorder.toggle_mind_state(at(t0, 5.0));
        recorder.save_thought("   ", at(t0, 6.0));
        assert!(recorder.thoughts().is_empty());
        assert!(!recorder.is_capturing());
    }

    #[test]
    fn completed_record_uses_full_duration() {
        let t0 = Instant::now();
        let mut recorder = begin(t0);

        recorder.toggle_mind_state(at(t0, 10.0));
        recorder.toggle_mind_state(at(t0, 25.0));
        let events = recorder.poll(at(t0, 61.0));
        assert!(events.contains(&TimerEvent::Completed));

        let record = recorder.finish(FinishKind::Completed, at(t0, 61.0), date());
        assert!(record.session.completed);
        assert_eq!(record.session.actual_time, Some(60));
        assert_eq!(record.session.clear_percent, 75);
        assert_eq!(record.session.thought_count, 1);
        assert_eq!(record.session.mind_state_log.len(), 2);
    }

    #[test]
    fn ending_early_measures_against_elapsed_so_far() {
        let t0 = Instant::now();
        let mut recorder = begin(t0);

        recorder.toggle_mind_state(at(t0, 10.0));
        let record = recorder.finish(FinishKind::EndedEarly, at(t0, 20.0), date());

        assert!(!record.session.completed);
        assert_eq!(record.session.actual_time, Some(20));
        assert_eq!(record.session.clear_percent, 50);
    }

    #[test]
    fn abandon_and_end_early_agree_on_clear_percent() {
        let t0 = Instant::now();
        let mut a = begin(t0);
        a.toggle_mind_state(at(t0, 12.0));
        let mut b = a.clone();

        let ended = a.finish(FinishKind::EndedEarly, at(t0, 30.0), date());
        b.toggle_pause(at(t0, 30.0));
        let abandoned = b.finish(FinishKind::Abandoned, at(t0, 45.0), date());

        assert_eq!(ended.session.clear_percent, abandoned.session.clear_percent);
        assert_eq!(abandoned.kind, FinishKind::Abandoned);
        assert!(!abandoned.session.completed);
    }

    #[test]
    fn finishing_immediately_is_fully_clear() {
        let t0 = Instant::now();
        let record = begin(t0).finish(FinishKind::Abandoned, t0, date());
        assert_eq!(record.session.clear_percent, 100);
        assert_eq!(record.session.actual_time, Some(0));
    }
}
