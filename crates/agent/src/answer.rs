//! Grounded answer generation, streamed fragment by fragment.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;
use syllabot_core::error::{Error, ProviderError};
use syllabot_core::message::Message;
use syllabot_core::provider::{Provider, ProviderRequest};
use crate::prompts::{SUMMARY_PREFIX, TUTOR_SYSTEM_PROMPT};
use crate::stream_event::TurnEvent;

pub struct AnswerGenerator {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    window: usize,
}

impl AnswerGenerator {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, window: usize) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.3,
            max_tokens: None,
            window,
        }
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: Option<u32>) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn build_messages(
        &self,
        summary: Option<&str>,
        history: &[Message],
        query: &str,
        context: &str,
    ) -> Vec<Message> {
        let dialogue: Vec<&Message> = history.iter().filter(|m| m.is_dialogue()).collect();
        let start = dialogue.len().saturating_sub(self.window);

        let mut messages = vec![Message::system(TUTOR_SYSTEM_PROMPT)];
        if let Some(summary) = summary.filter(|s| !s.trim().is_empty()) {
            messages.push(Message::system(format!("{SUMMARY_PREFIX}\n{summary}")));
        }
        messages.extend(dialogue[start..].iter().map(|m| (*m).clone()));
        messages.push(Message::user(format!(
            "QUESTION:\n{query}\n\nCONTEXT:\n{context}"
        )));
        messages
    }

    /// Stream the answer into `events`, returning the full text.
    ///
    /// Empty fragments are dropped. A failure after the first forwarded
    /// fragment comes back as [`Error::Incomplete`]; a closed receiver does
    /// not stop generation.
    pub async fn generate(
        &self,
        messages: Vec<Message>,
        events: &mpsc::Sender<TurnEvent>,
    ) -> Result<String, Error> {
        let request = ProviderRequest::new(&self.model, messages)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
            .streaming();

        let mut rx = self.provider.stream(request).await?;
        let mut answer = String::new();
        let mut fragments = 0usize;

        while let Some(item) = rx.recv().await {
            match item {
                Ok(chunk) => {
                    if let Some(content) = chunk.content.filter(|c| !c.is_empty()) {
                        answer.push_str(&content);
                        fragments += 1;
                        let _ = events.send(TurnEvent::Token { content }).await;
                    }
                    if chunk.done {
                        break;
                    }
                }
                Err(err) => return Err(interrupted(answer, err)),
            }
        }

        debug!(fragments, chars = answer.len(), "answer stream finished");
        Ok(answer)
    }
}

fn interrupted(partial: String, source: ProviderError) -> Error {
    if partial.is_empty() {
        Error::Provider(source)
    } else {
        Error::Incomplete { partial, source }
    }
}
