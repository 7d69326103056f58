use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `time_in_session` value marking a note written after the session rather
/// than captured during it.
pub const FREE_FORM_NOTE: i32 = -1;

/// Longest accepted thought text, in characters.
pub const MAX_THOUGHT_LEN: usize = 1000;

/// A captured interruption or an end-of-session note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thought {
    pub id: Uuid,
    pub session_id: Uuid,
    pub day_number: u32,
    /// Whole seconds into the session, or [`FREE_FORM_NOTE`].
    pub time_in_session: i32,
    pub text: String,
}

impl Thought {
    pub fn is_note(&self) -> bool {
        self.time_in_session == FREE_FORM_NOTE
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewThought {
    pub time_in_session: i32,
    pub text: String,
}

impl NewThought {
    pub fn note(text: impl Into<String>) -> Self {
        Self {
            time_in_session: FREE_FORM_NOTE,
            text: text.into(),
        }
    }
}

/// Input for storing several thoughts against one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchThoughtsInput {
    pub session_id: Uuid,
    pub day_number: u32,
    pub thoughts: Vec<NewThought>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThoughtsResponse {
    pub thoughts: Vec<Thought>,
}
