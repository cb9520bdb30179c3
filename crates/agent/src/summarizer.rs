//! Rolling conversation summary.
//!
//! The decision to summarize is a plain function of state, re-evaluated at
//! the end of every turn. When it fires, everything past the current
//! boundary is folded into the summary and the boundary moves to the end of
//! the log.

use std::sync::Arc;
use syllabot_core::error::ProviderError;
use syllabot_core::message::{Message, Role};
use syllabot_core::provider::{Provider, ProviderRequest};
use syllabot_core::state::{ConversationState, SummaryUpdate};
use crate::prompts::{SUMMARY_CREATE_PROMPT, SUMMARY_UPDATE_PROMPT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryDecision {
    Summarize { pending: usize },
    Skip { pending: usize },
}

/// Summarize once `threshold` or more messages sit past the boundary.
pub fn should_summarize(state: &ConversationState, threshold: usize) -> SummaryDecision {
    let pending = state.pending_summary_len();
    if pending >= threshold {
        SummaryDecision::Summarize { pending }
    } else {
        SummaryDecision::Skip { pending }
    }
}

pub struct Summarizer {
    provider: Arc<dyn Provider>,
    model: String,
}

impl Summarizer {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    pub fn build_messages(existing: Option<&str>, slice: &[Message]) -> Vec<Message> {
        let transcript = slice
            .iter()
            .filter(|m| m.is_dialogue())
            .map(|m| {
                let speaker = match m.role {
                    Role::User => "Student",
                    _ => "Tutor",
                };
                format!("{speaker}: {}", m.content)
            })
            .collect::<Vec<_>>()
            .join("\n");

        match existing {
            Some(summary) => vec![
                Message::system(SUMMARY_UPDATE_PROMPT),
                Message::user(format!(
                    "EXISTING SUMMARY:\n{summary}\n\nNEW MESSAGES:\n{transcript}"
                )),
            ],
            None => vec![
                Message::system(SUMMARY_CREATE_PROMPT),
                Message::user(format!("CONVERSATION:\n{transcript}")),
            ],
        }
    }

    /// Fold the unsummarized tail of `state` into a new summary.
    ///
    /// `None` when there is nothing past the boundary.
    pub async fn summarize(
        &self,
        state: &ConversationState,
    ) -> Result<Option<SummaryUpdate>, ProviderError> {
        let slice = state.unsummarized();
        if slice.is_empty() {
            return Ok(None);
        }

        let request = ProviderRequest::new(
            &self.model,
            Self::build_messages(state.summary.as_deref(), slice),
        )
        .with_temperature(0.0);

        let response = self.provider.complete(request).await?;
        Ok(Some(SummaryUpdate {
            summary: response.message.content.trim().to_string(),
            last_summarized_index: state.messages.len(),
        }))
    }
}
