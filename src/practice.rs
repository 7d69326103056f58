//! Interactive practice runner.
//!
//! The timer is polled every 50 ms; stdin is read line by line on a
//! blocking thread and forwarded over a channel so input never stalls the
//! clock. Logs go to stderr and the status line is redrawn on stdout.

use std::io::Write;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Local;
use tokio::sync::mpsc;

use crate::client::{Persisted, StillpointClient};
use crate::config::ClientPrefs;
use crate::focus::{
    BlockLayout, Cue, CueSink, FinishKind, FocusRecorder, MindState, MindStateSegment,
    Progression, SessionRecord, SoundPrefs, TimerEvent, TimerStatus,
};
use crate::models::{Session, MAX_THOUGHT_LEN};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const MIND_BAR_WIDTH: usize = 20;

const HELP: &str = "\
  enter   mark a thought (then type it, or enter to skip)
  p       pause / resume
  e       end early (result is kept)
  q       abandon (stored for history only)
  s tick|chime|done   toggle a sound
  ?       this help
while typing a thought: /p pause, /e end early, /q abandon";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundToggle {
    Tick,
    Chime,
    Completion,
}

impl SoundToggle {
    fn apply(self, prefs: SoundPrefs) -> SoundPrefs {
        let mut prefs = prefs;
        match self {
            Self::Tick => prefs.tick = !prefs.tick,
            Self::Chime => prefs.chime = !prefs.chime,
            Self::Completion => prefs.completion = !prefs.completion,
        }
        prefs
    }
}

/// One line of user input during a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ToggleMind,
    Pause,
    EndEarly,
    Abandon,
    Sound(SoundToggle),
    Help,
    /// Text for the open capture prompt. Empty means skip.
    Capture(String),
    Unknown(String),
}

impl Command {
    /// While a capture prompt is open every line is thought text, except
    /// the slash commands that pause or stop the session.
    pub fn parse(line: &str, capturing: bool) -> Self {
        if capturing {
            return match line.trim() {
                "/p" => Self::Pause,
                "/e" => Self::EndEarly,
                "/q" => Self::Abandon,
                text => Self::Capture(text.chars().take(MAX_THOUGHT_LEN).collect()),
            };
        }

        let line = line.trim();
        match line {
            "" | "t" => Self::ToggleMind,
            "p" => Self::Pause,
            "e" => Self::EndEarly,
            "q" | "a" => Self::Abandon,
            "?" | "h" | "help" => Self::Help,
            _ => match line.strip_prefix("s ").map(str::trim) {
                Some("tick") => Self::Sound(SoundToggle::Tick),
                Some("chime") => Self::Sound(SoundToggle::Chime),
                Some("done") | Some("completion") => Self::Sound(SoundToggle::Completion),
                _ => Self::Unknown(line.to_string()),
            },
        }
    }
}

/// What the loop should do after handling input or a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    ShowHelp,
    Finish(FinishKind),
}

/// Play cues for the events and report whether the session completed.
pub fn dispatch_events(events: &[TimerEvent], sink: &dyn CueSink) -> bool {
    let mut completed = false;
    for event in events {
        match event {
            TimerEvent::Cue(cue) => sink.play(*cue),
            TimerEvent::Completed => completed = true,
        }
    }
    completed
}

pub fn apply_command(
    recorder: &mut FocusRecorder,
    command: Command,
    now: Instant,
    sink: &dyn CueSink,
) -> Step {
    match command {
        Command::ToggleMind => {
            if recorder.timer().is_running() {
                recorder.toggle_mind_state(now);
            }
            Step::Continue
        }
        Command::Capture(text) => {
            recorder.save_thought(&text, now);
            Step::Continue
        }
        Command::Pause => {
            let events = recorder.toggle_pause(now);
            if dispatch_events(&events, sink) {
                Step::Finish(FinishKind::Completed)
            } else {
                Step::Continue
            }
        }
        Command::EndEarly => Step::Finish(FinishKind::EndedEarly),
        Command::Abandon => Step::Finish(FinishKind::Abandoned),
        Command::Sound(toggle) => {
            let prefs = toggle.apply(recorder.timer().prefs());
            recorder.set_prefs(prefs);
            Step::Continue
        }
        Command::Help => Step::ShowHelp,
        Command::Unknown(line) => {
            tracing::debug!("Ignoring unknown command: {}", line);
            Step::ShowHelp
        }
    }
}

pub fn format_clock(seconds: f64) -> String {
    let whole = seconds.max(0.0).floor() as u64;
    format!("{:02}:{:02}", whole / 60, whole % 60)
}

/// The single status line redrawn while a session runs.
pub fn status_line(recorder: &FocusRecorder, layout: &BlockLayout) -> String {
    let elapsed = recorder.timer().elapsed();
    if recorder.is_capturing() {
        return format!(
            "Day {} · {} · thought {}: ",
            recorder.day_number(),
            format_clock(elapsed),
            recorder.thought_count()
        );
    }

    let state = match (recorder.timer().status(), recorder.state()) {
        (TimerStatus::Paused, _) => "paused",
        (_, MindState::Clear) => "clear",
        (_, MindState::Thinking) => "thinking",
    };
    let segments = recorder.log().segments(elapsed, recorder.duration());
    format!(
        "Day {} · {} / {} · {} · {} · [{}] · {}",
        recorder.day_number(),
        format_clock(elapsed),
        format_clock(recorder.duration() as f64),
        layout.render(elapsed),
        layout.status_label(elapsed),
        mind_bar(&segments, MIND_BAR_WIDTH),
        state
    )
}

/// Fixed-width strip of the session so far: `=` clear, `~` thinking, blank
/// for time still to come.
pub fn mind_bar(segments: &[MindStateSegment], width: usize) -> String {
    (0..width)
        .map(|i| {
            let at = (i as f64 + 0.5) / width as f64;
            match segments.iter().find(|s| s.start <= at && at < s.end) {
                Some(s) if s.state == MindState::Thinking => '~',
                Some(_) => '=',
                None => ' ',
            }
        })
        .collect()
}

pub fn summary(record: &SessionRecord) -> String {
    let session = &record.session;
    let outcome = match record.kind {
        FinishKind::Completed => "complete",
        FinishKind::EndedEarly => "ended early",
        FinishKind::Abandoned => "abandoned",
    };
    format!(
        "Day {} {} · {} of {} · {}% clear · {} thought{}",
        session.day_number,
        outcome,
        format_clock(session.actual_time.unwrap_or(session.duration) as f64),
        format_clock(session.duration as f64),
        session.clear_percent,
        session.thought_count,
        if session.thought_count == 1 { "" } else { "s" }
    )
}

fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            match stdin.read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    if tx.blocking_send(line.trim_end_matches(['\r', '\n']).to_string()).is_err() {
                        break;
                    }
                }
            }
        }
    });
    rx
}

fn redraw(line: &str) {
    let mut out = std::io::stdout();
    let _ = write!(out, "\r\x1b[2K{}", line);
    let _ = out.flush();
}

/// Runs one attempt at the user's current day and saves it.
pub async fn run(client: StillpointClient, prefs: &mut ClientPrefs, sink: &dyn CueSink) -> Result<()> {
    if !client.is_authenticated() {
        anyhow::bail!("Not logged in. Run `stillpoint login` first.");
    }

    let user = client.me().await.context("Failed to load your account")?;
    let progression = client
        .progression()
        .await
        .context("Failed to load the server's session lengths")?;
    let mut input = spawn_stdin_reader();

    let (record, sound) =
        run_session(user.current_day, &progression, prefs.sound, sink, &mut input).await?;
    prefs.sound = sound;

    println!();
    println!("{}", summary(&record));

    let persisted = match client.persist_record(&record).await {
        Ok(persisted) => persisted,
        Err(e) => {
            tracing::error!("Failed to save session: {}", e);
            println!("Could not save this session: {}", e);
            return Ok(());
        }
    };

    if record.kind != FinishKind::Abandoned {
        completion_screen(&client, &persisted, &mut input).await;
    }
    Ok(())
}

async fn run_session(
    day_number: u32,
    progression: &Progression,
    sound: SoundPrefs,
    sink: &dyn CueSink,
    input: &mut mpsc::Receiver<String>,
) -> Result<(SessionRecord, SoundPrefs)> {
    let layout = BlockLayout::for_duration(progression.duration_for(day_number));
    let mut recorder = FocusRecorder::begin(day_number, progression, sound, Instant::now());
    let mut interval = tokio::time::interval(POLL_INTERVAL);
    let mut last_drawn = String::new();

    println!(
        "Day {} · {} · press enter whenever a thought pulls you away, ? for help",
        day_number,
        format_clock(recorder.duration() as f64)
    );

    let kind = loop {
        tokio::select! {
            _ = interval.tick() => {
                let events = recorder.poll(Instant::now());
                if dispatch_events(&events, sink) {
                    break FinishKind::Completed;
                }
            }
            line = input.recv() => {
                let Some(line) = line else {
                    tracing::info!("Input closed, abandoning session");
                    break FinishKind::Abandoned;
                };
                let command = Command::parse(&line, recorder.is_capturing());
                match apply_command(&mut recorder, command, Instant::now(), sink) {
                    Step::Continue => {}
                    Step::ShowHelp => {
                        println!();
                        println!("{}", HELP);
                        last_drawn.clear();
                    }
                    Step::Finish(kind) => break kind,
                }
            }
        }

        let line = status_line(&recorder, &layout);
        if line != last_drawn {
            redraw(&line);
            last_drawn = line;
        }
    };

    redraw(&status_line(&recorder, &layout));
    let sound = recorder.timer().prefs();
    let record = recorder.finish(kind, Instant::now(), Local::now().date_naive());
    Ok((record, sound))
}

async fn completion_screen(
    client: &StillpointClient,
    persisted: &Persisted,
    input: &mut mpsc::Receiver<String>,
) {
    if let Err(e) = &persisted.thoughts {
        println!("Your thoughts could not be saved: {}", e);
    }
    show_session(&persisted.session);

    println!("Anything to note about this session? (enter to skip)");
    let Some(note) = input.recv().await else {
        return;
    };
    let note: String = note.trim().chars().take(MAX_THOUGHT_LEN).collect();
    if note.is_empty() {
        return;
    }

    loop {
        match client.save_note(&persisted.session, &note).await {
            Ok(_) => {
                println!("Note saved.");
                return;
            }
            Err(e) => {
                tracing::warn!("Failed to save note: {}", e);
                println!("Could not save the note ({}). Type r to retry, enter to give up.", e);
                match input.recv().await {
                    Some(answer) if answer.trim() == "r" => continue,
                    _ => return,
                }
            }
        }
    }
}

fn show_session(session: &Session) {
    if session.completed {
        println!("Day {} done. Tomorrow: day {}.", session.day_number, session.day_number + 1);
    } else {
        println!("Day {} stays open. Try it again next time.", session.day_number);
    }
}

/// Plays nothing. For runs with sound fully disabled.
pub struct SilentSink;

impl CueSink for SilentSink {
    fn play(&self, _cue: Cue) {}
}
