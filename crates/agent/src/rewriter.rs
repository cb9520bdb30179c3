//! Query rewriting: turn a follow-up into a self-contained question.

use std::sync::Arc;
use syllabot_core::error::ProviderError;
use syllabot_core::message::Message;
use syllabot_core::provider::{Provider, ProviderRequest};
use crate::prompts::REWRITE_SYSTEM_PROMPT;

pub struct QueryRewriter {
    provider: Arc<dyn Provider>,
    model: String,
    /// Most recent history messages shown to the model.
    window: usize,
}

impl QueryRewriter {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, window: usize) -> Self {
        Self {
            provider,
            model: model.into(),
            window,
        }
    }

    /// Instruction, the last `window` dialogue messages, then the wrapped query.
    pub fn build_messages(&self, history: &[Message], query: &str) -> Vec<Message> {
        let dialogue: Vec<&Message> = history.iter().filter(|m| m.is_dialogue()).collect();
        let start = dialogue.len().saturating_sub(self.window);

        let mut messages = Vec::with_capacity(self.window + 2);
        messages.push(Message::system(REWRITE_SYSTEM_PROMPT));
        messages.extend(dialogue[start..].iter().map(|m| (*m).clone()));
        messages.push(Message::user(format!("Rewrite this question: {query}")));
        messages
    }

    /// The rewritten question, trimmed. May be empty.
    pub async fn rewrite(&self, history: &[Message], query: &str) -> Result<String, ProviderError> {
        let request = ProviderRequest::new(&self.model, self.build_messages(history, query))
            .with_temperature(0.0);
        let response = self.provider.complete(request).await?;
        Ok(response.message.content.trim().to_string())
    }
}

/// The query used for retrieval: the rewrite, or the original when the
/// rewrite came back empty.
pub fn retrieval_query(rewritten: &str, original: &str) -> String {
    if rewritten.trim().is_empty() {
        original.to_string()
    } else {
        rewritten.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RoutingMockProvider, Step};
    use syllabot_core::message::Role;

    fn history(n: usize) -> Vec<Message> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    Message::user(format!("q{i}"))
                } else {
                    Message::assistant(format!("a{i}"))
                }
            })
            .collect()
    }

    #[test]
    fn window_keeps_last_four_messages() {
        let rewriter = QueryRewriter::new(Arc::new(RoutingMockProvider::new()), "m", 4);
        let messages = rewriter.build_messages(&history(7), "explain it");

        assert_eq!(messages.len(), 6);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].content, "a3");
        assert_eq!(messages[4].content, "q6");
        assert_eq!(messages[5].content, "Rewrite this question: explain it");
    }

    #[test]
    fn short_history_is_used_whole() {
        let rewriter = QueryRewriter::new(Arc::new(RoutingMockProvider::new()), "m", 4);
        let messages = rewriter.build_messages(&[], "What is an algorithm?");
        assert_eq!(messages.len(), 2);
    }

    #[tokio::test]
    async fn rewrite_trims_output() {
        let provider = Arc::new(RoutingMockProvider::new().with_rewrite("  Explain bubble sort.\n"));
        let rewriter = QueryRewriter::new(provider.clone(), "m", 4);
        let out = rewriter.rewrite(&history(2), "explain it").await.unwrap();
        assert_eq!(out, "Explain bubble sort.");
        assert_eq!(provider.calls(Step::Rewrite), 1);
    }

    #[test]
    fn empty_rewrite_falls_back_to_original() {
        assert_eq!(retrieval_query("", "What is a heap?"), "What is a heap?");
        assert_eq!(retrieval_query("   ", "What is a heap?"), "What is a heap?");
        assert_eq!(retrieval_query("Define heap", "it?"), "Define heap");
    }
}
