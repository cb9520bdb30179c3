//! Shared test helpers.
//!
//! [`RoutingMockProvider`] answers each pipeline step from its own script,
//! picking the step from the request's leading system instruction. Title
//! generation and retrieval run concurrently, so routing by content keeps
//! scripted replies deterministic where call order is not.

use std::collections::HashMap;
use std::sync::Mutex;
use async_trait::async_trait;
use syllabot_core::error::ProviderError;
use syllabot_core::message::{Message, Role};
use syllabot_core::provider::{
    ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk, Usage,
};

use crate::prompts::{
    REWRITE_SYSTEM_PROMPT, SUMMARY_CREATE_PROMPT, SUMMARY_UPDATE_PROMPT, TITLE_SYSTEM_PROMPT,
    TUTOR_SYSTEM_PROMPT,
};

/// Which pipeline step a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Rewrite,
    Title,
    Summary,
    Answer,
    Unknown,
}

impl Step {
    pub fn of(request: &ProviderRequest) -> Self {
        let Some(first) = request.messages.first().filter(|m| m.role == Role::System) else {
            return Self::Unknown;
        };
        match first.content.as_str() {
            REWRITE_SYSTEM_PROMPT => Self::Rewrite,
            TITLE_SYSTEM_PROMPT => Self::Title,
            SUMMARY_CREATE_PROMPT | SUMMARY_UPDATE_PROMPT => Self::Summary,
            TUTOR_SYSTEM_PROMPT => Self::Answer,
            _ => Self::Unknown,
        }
    }
}

#[derive(Clone)]
enum Reply {
    /// Rewrite only: repeat the user's question back.
    Echo,
    Text(String),
    Fail(ProviderError),
}

#[derive(Clone)]
struct AnswerScript {
    fragments: Vec<String>,
    /// Fail the stream after this many fragments were sent.
    fail_after: Option<usize>,
    /// Fail before any stream is opened.
    fail_to_start: bool,
}

/// A provider scripted per pipeline step.
pub struct RoutingMockProvider {
    rewrite: Mutex<Reply>,
    title: Mutex<Reply>,
    summary: Mutex<Reply>,
    answer: Mutex<AnswerScript>,
    requests: Mutex<Vec<(Step, ProviderRequest)>>,
}

impl RoutingMockProvider {
    /// Echoing rewriter, fixed title and summary, a two-fragment answer.
    pub fn new() -> Self {
        Self {
            rewrite: Mutex::new(Reply::Echo),
            title: Mutex::new(Reply::Text("Algorithm Basics".into())),
            summary: Mutex::new(Reply::Text("The student is studying algorithms.".into())),
            answer: Mutex::new(AnswerScript {
                fragments: vec!["An algorithm is ".into(), "a finite set of steps.".into()],
                fail_after: None,
                fail_to_start: false,
            }),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_rewrite(self, text: &str) -> Self {
        *self.rewrite.lock().unwrap() = Reply::Text(text.into());
        self
    }

    pub fn failing_rewrite(self) -> Self {
        *self.rewrite.lock().unwrap() = Reply::Fail(ProviderError::Network("rewrite down".into()));
        self
    }

    pub fn with_title(self, text: &str) -> Self {
        *self.title.lock().unwrap() = Reply::Text(text.into());
        self
    }

    pub fn failing_title(self) -> Self {
        *self.title.lock().unwrap() = Reply::Fail(ProviderError::Network("title down".into()));
        self
    }

    pub fn with_summary(self, text: &str) -> Self {
        *self.summary.lock().unwrap() = Reply::Text(text.into());
        self
    }

    pub fn failing_summary(self) -> Self {
        *self.summary.lock().unwrap() =
            Reply::Fail(ProviderError::Network("summary down".into()));
        self
    }

    /// Stream these fragments, in order, for every answer.
    pub fn with_answer(self, fragments: &[&str]) -> Self {
        self.answer.lock().unwrap().fragments = fragments.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Break the answer stream after `n` fragments.
    pub fn failing_answer_after(self, n: usize) -> Self {
        self.answer.lock().unwrap().fail_after = Some(n);
        self
    }

    /// Refuse to open the answer stream at all.
    pub fn failing_answer(self) -> Self {
        self.answer.lock().unwrap().fail_to_start = true;
        self
    }

    /// Number of calls made for `step`.
    pub fn calls(&self, step: Step) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| *s == step)
            .count()
    }

    /// Requests made for `step`, in call order.
    pub fn requests(&self, step: Step) -> Vec<ProviderRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| *s == step)
            .map(|(_, r)| r.clone())
            .collect()
    }

    fn record(&self, request: &ProviderRequest) -> Step {
        let step = Step::of(request);
        self.requests.lock().unwrap().push((step, request.clone()));
        step
    }

    fn reply(&self, step: Step, request: &ProviderRequest) -> Result<String, ProviderError> {
        let reply = match step {
            Step::Rewrite => self.rewrite.lock().unwrap().clone(),
            Step::Title => self.title.lock().unwrap().clone(),
            Step::Summary => self.summary.lock().unwrap().clone(),
            Step::Answer => Reply::Text(self.answer.lock().unwrap().fragments.concat()),
            Step::Unknown => Reply::Text(String::new()),
        };
        match reply {
            Reply::Echo => {
                let last = request
                    .messages
                    .last()
                    .map(|m| m.content.as_str())
                    .unwrap_or_default();
                Ok(last
                    .strip_prefix("Rewrite this question: ")
                    .unwrap_or(last)
                    .to_string())
            }
            Reply::Text(text) => Ok(text),
            Reply::Fail(err) => Err(err),
        }
    }
}

impl Default for RoutingMockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for RoutingMockProvider {
    fn name(&self) -> &str {
        "routing_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let step = self.record(&request);
        let text = self.reply(step, &request)?;
        Ok(ProviderResponse {
            message: Message::assistant(text),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: request.model,
        })
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        self.record(&request);
        let script = self.answer.lock().unwrap().clone();
        if script.fail_to_start {
            return Err(ProviderError::ApiError {
                status_code: 503,
                message: "answer model unavailable".into(),
            });
        }

        let (tx, rx) = tokio::sync::mpsc::channel(8);
        tokio::spawn(async move {
            for (i, fragment) in script.fragments.into_iter().enumerate() {
                if script.fail_after == Some(i) {
                    let _ = tx
                        .send(Err(ProviderError::StreamInterrupted("connection reset".into())))
                        .await;
                    return;
                }
                let chunk = StreamChunk {
                    content: Some(fragment),
                    done: false,
                    usage: None,
                };
                if tx.send(Ok(chunk)).await.is_err() {
                    return;
                }
            }
            if let Some(n) = script.fail_after {
                // Fragments ran out before the scripted failure point.
                let _ = tx
                    .send(Err(ProviderError::StreamInterrupted(format!(
                        "connection reset after {n} fragments"
                    ))))
                    .await;
                return;
            }
            let _ = tx
                .send(Ok(StreamChunk {
                    content: None,
                    done: true,
                    usage: None,
                }))
                .await;
        });
        Ok(rx)
    }
}
