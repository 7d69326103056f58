//! Audible cues fired by the session timer.
//!
//! Cues are short synthesized sine tones played through one rodio sink that
//! lives on its own thread for the rest of the process.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, OnceLock};
use std::thread;
use std::time::Duration;

use rodio::source::{Empty, SineWave};
use rodio::{OutputStream, Sink, Source};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cue {
    /// Once per elapsed second.
    Tick,
    /// Whole minutes left, announced when the count drops.
    Chime(u32),
    /// The target duration was reached.
    Completion,
}

/// One sound appended to the output: the listed partials mixed together,
/// fading out over `millis`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub partials: &'static [f32],
    pub millis: u64,
    pub gain: f32,
}

const TICK: Tone = Tone {
    partials: &[800.0],
    millis: 60,
    gain: 0.06,
};

const CHIME: Tone = Tone {
    partials: &[1200.0, 800.0],
    millis: 400,
    gain: 0.15,
};

const COMPLETION: Tone = Tone {
    partials: &[528.0, 660.0],
    millis: 2500,
    gain: 0.2,
};

impl Cue {
    /// Tones played back to back for this cue. A chime rings once per
    /// minute left.
    pub fn tones(&self) -> Vec<Tone> {
        match self {
            Self::Tick => vec![TICK],
            Self::Chime(minutes) => vec![CHIME; *minutes as usize],
            Self::Completion => vec![COMPLETION],
        }
    }
}

fn render(tone: &Tone) -> Box<dyn Source<Item = f32> + Send> {
    let length = Duration::from_millis(tone.millis);
    let mut mixed: Option<Box<dyn Source<Item = f32> + Send>> = None;
    for &hz in tone.partials {
        let mut partial = SineWave::new(hz).take_duration(length);
        partial.set_filter_fadeout();
        let partial = partial.amplify(tone.gain);
        mixed = Some(match mixed {
            Some(acc) => Box::new(acc.mix(partial)),
            None => Box::new(partial),
        });
    }
    mixed.unwrap_or_else(|| Box::new(Empty::<f32>::new()))
}

/// Which cues the user wants to hear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundPrefs {
    pub tick: bool,
    pub chime: bool,
    pub completion: bool,
}

impl Default for SoundPrefs {
    fn default() -> Self {
        Self {
            tick: false,
            chime: true,
            completion: true,
        }
    }
}

impl SoundPrefs {
    pub fn silent() -> Self {
        Self {
            tick: false,
            chime: false,
            completion: false,
        }
    }

    pub fn allows(&self, cue: Cue) -> bool {
        match cue {
            Cue::Tick => self.tick,
            Cue::Chime(_) => self.chime,
            Cue::Completion => self.completion,
        }
    }
}

/// Anything that can play a cue.
pub trait CueSink {
    fn play(&self, cue: Cue);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputState {
    Suspended,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum AudioCommand {
    Resume,
    Play(Cue),
}

/// Process-wide cue output.
///
/// The audio thread and its sink are created on the first cue and reused
/// afterwards. The sink starts paused and is resumed before a cue if it is
/// still suspended; it is never torn down while the process is alive.
pub struct AudioOutput {
    state: Mutex<OutputState>,
    tx: Mutex<Option<Sender<AudioCommand>>>,
}

static OUTPUT: OnceLock<AudioOutput> = OnceLock::new();

impl AudioOutput {
    /// Get the shared output, creating it on first call.
    pub fn acquire() -> &'static AudioOutput {
        OUTPUT.get_or_init(AudioOutput::new)
    }

    fn new() -> Self {
        Self {
            state: Mutex::new(OutputState::Suspended),
            tx: Mutex::new(None),
        }
    }

    pub fn state(&self) -> OutputState {
        *self.state.lock().expect("audio state lock poisoned")
    }

    /// Returns true if the output had to be resumed.
    pub fn resume_if_suspended(&self) -> bool {
        let mut state = self.state.lock().expect("audio state lock poisoned");
        if *state == OutputState::Suspended {
            *state = OutputState::Running;
            self.send(AudioCommand::Resume);
            tracing::trace!("Resumed audio output");
            true
        } else {
            false
        }
    }

    fn send(&self, command: AudioCommand) {
        let mut tx = self.tx.lock().expect("audio sender lock poisoned");
        if tx.is_none() {
            match spawn_audio_thread() {
                Ok(sender) => *tx = Some(sender),
                Err(e) => {
                    tracing::warn!("Failed to start audio thread: {}", e);
                    return;
                }
            }
        }
        if let Some(sender) = tx.as_ref() {
            if sender.send(command).is_err() {
                tracing::warn!("Audio thread is gone, dropping {:?}", command);
            }
        }
    }
}

impl CueSink for AudioOutput {
    fn play(&self, cue: Cue) {
        self.resume_if_suspended();
        self.send(AudioCommand::Play(cue));
    }
}

fn spawn_audio_thread() -> std::io::Result<Sender<AudioCommand>> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("audio-output".to_string())
        .spawn(move || run_audio(rx))?;
    Ok(tx)
}

fn open_sink() -> Result<(OutputStream, Sink), String> {
    let (stream, handle) = OutputStream::try_default()
        .map_err(|e| format!("Failed to create audio output stream: {}", e))?;
    let sink =
        Sink::try_new(&handle).map_err(|e| format!("Failed to create audio sink: {}", e))?;
    sink.pause();
    Ok((stream, sink))
}

/// Owns the non-Send stream and sink.
fn run_audio(rx: Receiver<AudioCommand>) {
    let (_stream, sink) = match open_sink() {
        Ok(opened) => opened,
        Err(e) => {
            tracing::warn!("{}; cues will be silent", e);
            while rx.recv().is_ok() {}
            return;
        }
    };
    tracing::debug!("Opened audio output");

    while let Ok(command) = rx.recv() {
        match command {
            AudioCommand::Resume => sink.play(),
            AudioCommand::Play(cue) => {
                for tone in cue.tones() {
                    sink.append(render(&tone));
                }
            }
        }
    }
}
