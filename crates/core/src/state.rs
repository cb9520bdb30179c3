//! Conversation state: the record threaded through every turn.
//!
//! `messages` is an append-only log. Summarization never removes entries from
//! it; it only moves the `last_summarized_index` boundary forward, together
//! with the `summary` that covers everything before that boundary.

use serde::{Deserialize, Serialize};
use crate::error::Error;
use crate::message::{Message, ThreadId};

/// Durable per-thread state. One instance per thread, versioned by checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub thread_id: ThreadId,

    /// Ordered dialogue turns. Entries are never mutated or reordered.
    #[serde(default)]
    pub messages: Vec<Message>,

    /// Set once by title generation, afterwards only by an explicit rename.
    #[serde(default)]
    pub conversation_title: Option<String>,

    /// Cumulative summary of `messages[..last_summarized_index]`.
    #[serde(default)]
    pub summary: Option<String>,

    /// Boundary already folded into `summary`. Never decreases and never
    /// exceeds `messages.len()`.
    #[serde(default)]
    pub last_summarized_index: usize,
}

/// A new summary and the boundary it covers. Applied as one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryUpdate {
    pub summary: String,
    pub last_summarized_index: usize,
}

impl ConversationState {
    /// Empty state for a thread that has never been seen.
    pub fn new(thread_id: ThreadId) -> Self {
        Self {
            thread_id,
            messages: Vec::new(),
            conversation_title: None,
            summary: None,
            last_summarized_index: 0,
        }
    }

    /// Append a turn to the log.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// The messages not yet folded into `summary`.
    pub fn unsummarized(&self) -> &[Message] {
        let start = self.last_summarized_index.min(self.messages.len());
        &self.messages[start..]
    }

    /// Number of messages past the summarized boundary.
    pub fn pending_summary_len(&self) -> usize {
        self.messages.len().saturating_sub(self.last_summarized_index)
    }

    /// Replace the summary and move the boundary in one step.
    pub fn apply_summary(&mut self, update: SummaryUpdate) -> Result<(), Error> {
        if update.last_summarized_index < self.last_summarized_index {
            return Err(Error::Internal(format!(
                "summary boundary would move backwards ({} -> {})",
                self.last_summarized_index, update.last_summarized_index
            )));
        }
        if update.last_summarized_index > self.messages.len() {
            return Err(Error::Internal(format!(
                "summary boundary {} exceeds message count {}",
                update.last_summarized_index,
                self.messages.len()
            )));
        }
        self.summary = Some(update.summary);
        self.last_summarized_index = update.last_summarized_index;
        Ok(())
    }

    /// Set the title if none exists yet. Returns whether it was set.
    pub fn set_title_once(&mut self, title: impl Into<String>) -> bool {
        if self.conversation_title.is_some() {
            return false;
        }
        self.conversation_title = Some(title.into());
        true
    }

    /// Overwrite the title. Only the rename path may call this.
    pub fn rename(&mut self, title: impl Into<String>) {
        self.conversation_title = Some(title.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(n: usize) -> ConversationState {
        let mut state = ConversationState::new(ThreadId::from("t"));
        for i in 0..n {
            if i % 2 == 0 {
                state.push(Message::user(format!("q{i}")));
            } else {
                state.push(Message::assistant(format!("a{i}")));
            }
        }
        state
    }

    #[test]
    fn fresh_state_is_empty() {
        let state = ConversationState::new(ThreadId::from("t"));
        assert!(state.messages.is_empty());
        assert!(state.conversation_title.is_none());
        assert!(state.summary.is_none());
        assert_eq!(state.last_summarized_index, 0);
    }

    #[test]
    fn apply_summary_moves_both_fields() {
        let mut state = state_with(6);
        state
            .apply_summary(SummaryUpdate {
                summary: "covered q0..a5".into(),
                last_summarized_index: 6,
            })
            .unwrap();
        assert_eq!(state.summary.as_deref(), Some("covered q0..a5"));
        assert_eq!(state.last_summarized_index, 6);
        assert!(state.unsummarized().is_empty());
        // The log itself is untouched.
        assert_eq!(state.messages.len(), 6);
    }

    #[test]
    fn apply_summary_rejects_invalid_boundaries() {
        let mut state = state_with(4);
        let beyond = SummaryUpdate {
            summary: "s".into(),
            last_summarized_index: 5,
        };
        assert!(state.apply_summary(beyond).is_err());
        assert!(state.summary.is_none());

        state
            .apply_summary(SummaryUpdate {
                summary: "s".into(),
                last_summarized_index: 4,
            })
            .unwrap();
        let backwards = SummaryUpdate {
            summary: "t".into(),
            last_summarized_index: 2,
        };
        assert!(state.apply_summary(backwards).is_err());
        assert_eq!(state.summary.as_deref(), Some("s"));
        assert_eq!(state.last_summarized_index, 4);
    }

    #[test]
    fn title_is_set_once() {
        let mut state = state_with(0);
        assert!(state.set_title_once("Sorting Basics"));
        assert!(!state.set_title_once("Something Else"));
        assert_eq!(state.conversation_title.as_deref(), Some("Sorting Basics"));

        state.rename("My Notes");
        assert_eq!(state.conversation_title.as_deref(), Some("My Notes"));
    }

    #[test]
    fn pending_count_starts_at_log_length() {
        let state = state_with(5);
        assert_eq!(state.pending_summary_len(), 5);
    }

    #[test]
    fn missing_fields_deserialize_to_defaults() {
        let state: ConversationState = serde_json::from_str(r#"{"thread_id":"abc"}"#).unwrap();
        assert_eq!(state.thread_id, ThreadId::from("abc"));
        assert!(state.messages.is_empty());
        assert_eq!(state.last_summarized_index, 0);
    }
}
