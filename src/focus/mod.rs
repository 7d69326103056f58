//! The focus session engine: timer, block layout, mind-state log and cues.
//!
//! Nothing in here touches the network or the database. The practice
//! runner drives a [`FocusRecorder`] by polling it with the current
//! [`std::time::Instant`]; tests drive it with synthetic instants.

pub mod blocks;
pub mod cues;
pub mod mind_state;
pub mod progression;
pub mod recorder;
pub mod timer;

pub use blocks::{Block, BlockKind, BlockLayout, BlockStatus};
pub use cues::{AudioOutput, Cue, CueSink, OutputState, SoundPrefs};
pub use mind_state::{clear_percent, MindState, MindStateEntry, MindStateLog, MindStateSegment};
pub use progression::{Progression, BLOCK_SECONDS};
pub use recorder::{FinishKind, FocusRecorder, SessionRecord};
pub use timer::{SessionTimer, TimerEvent, TimerStatus};
