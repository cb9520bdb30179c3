//! Turn-level streaming events.
//!
//! `TurnEvent` wraps provider-level stream chunks into the events the gateway
//! forwards to clients over SSE:
//! - `token` — a non-empty fragment of the answer
//! - `done`  — the turn committed
//! - `error` — the turn failed

use serde::{Deserialize, Serialize};
use syllabot_core::error::{Error, ErrorKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// Partial answer text, in generation order.
    Token { content: String },

    /// The turn finished and its state is durable.
    Done {
        thread_id: String,
        title: Option<String>,
        summarized: bool,
        message_count: usize,
    },

    /// The turn failed. `incomplete` marks an answer cut off mid-stream,
    /// with nothing from the turn saved. A `summary_failure` may also follow
    /// tokens, but that answer is whole and already saved.
    #[serde(rename = "error")]
    Failed {
        kind: ErrorKind,
        message: String,
        incomplete: bool,
    },
}

impl TurnEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Token { .. } => "token",
            Self::Done { .. } => "done",
            Self::Failed { .. } => "error",
        }
    }

    pub fn failed(err: &Error) -> Self {
        Self::Failed {
            kind: err.kind(),
            message: err.to_string(),
            incomplete: matches!(err, Error::Incomplete { .. }),
        }
    }
}
