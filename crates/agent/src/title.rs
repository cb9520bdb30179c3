//! Title generation for new threads.

use std::sync::Arc;
use syllabot_core::error::ProviderError;
use syllabot_core::message::Message;
use syllabot_core::provider::{Provider, ProviderRequest};
use crate::prompts::TITLE_SYSTEM_PROMPT;

pub struct TitleGenerator {
    provider: Arc<dyn Provider>,
    model: String,
    max_words: usize,
}

impl TitleGenerator {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, max_words: usize) -> Self {
        Self {
            provider,
            model: model.into(),
            max_words,
        }
    }

    /// Generate a title from the (rewritten) question.
    ///
    /// `None` when the model's output sanitizes to nothing.
    pub async fn generate(&self, question: &str) -> Result<Option<String>, ProviderError> {
        let request = ProviderRequest::new(
            &self.model,
            vec![Message::system(TITLE_SYSTEM_PROMPT), Message::user(question)],
        )
        .with_temperature(0.0)
        .with_max_tokens(Some(32));

        let response = self.provider.complete(request).await?;
        Ok(sanitize_title(&response.message.content, self.max_words))
    }
}

/// Strip punctuation and quotes, collapse whitespace, keep `max_words` words.
pub fn sanitize_title(raw: &str, max_words: usize) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();

    let title = cleaned
        .split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ");

    (!title.is_empty()).then_some(title)
}
