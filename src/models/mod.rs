//! Domain models for Still Point.
//!
//! # Core Concepts
//!
//! - [`User`]: Owns a day counter (`current_day`) that only moves forward
//!   when a session is completed. Day N's duration grows with N.
//! - [`Session`]: One stored attempt at a day, written once when the attempt
//!   ends. Carries the mind-state log recorded while it ran.
//! - [`Thought`]: Text captured during an interruption, or a free-form note
//!   written after the session (`time_in_session == -1`).
//!
//! Derived views ([`crate::stats::SessionStats`], [`crate::stats::BoardEntry`],
//! [`crate::history::HistoryEntry`]) are computed on read and never stored.

mod session;
mod thought;
mod user;

pub use session::*;
pub use thought::*;
pub use user::*;

use serde::{Deserialize, Serialize};

use crate::focus::Progression;
use crate::history::HistoryEntry;
use crate::stats::BoardEntry;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardResponse {
    pub board: Vec<BoardEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub history: Vec<HistoryEntry>,
}

/// Server rules a client needs before it starts a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub progression: Progression,
}
