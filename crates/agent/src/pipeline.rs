//! The turn pipeline.
//!
//! ```text
//! rewrite ─┬─ title (only while untitled) ─┬─ context ─ answer ─ commit ─ summarize? ─ commit
//!          └─ retrieve ────────────────────┘
//! ```
//!
//! A turn holds its thread's lock from the first read to the last write.
//! Nothing is persisted until the answer is complete; the summary, when it
//! fires, is a second checkpoint on top.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, info_span, warn, Instrument};
use syllabot_config::AppConfig;
use syllabot_core::checkpoint::CheckpointStore;
use syllabot_core::error::Error;
use syllabot_core::message::{Message, ThreadId};
use syllabot_core::provider::Provider;
use syllabot_core::retrieval::{Passage, Retriever, Scope, SearchRequest};
use syllabot_core::state::ConversationState;
use syllabot_retrieval::scope_filter_with_key;

use crate::answer::AnswerGenerator;
use crate::context::assemble_context;
use crate::locks::ThreadLocks;
use crate::prompts::REFUSAL_TEXT;
use crate::registry::ThreadRegistry;
use crate::rewriter::{retrieval_query, QueryRewriter};
use crate::stream_event::TurnEvent;
use crate::summarizer::{should_summarize, SummaryDecision, Summarizer};
use crate::title::TitleGenerator;

/// Buffered events between the engine and a slow client.
const EVENT_BUFFER: usize = 64;

/// One student question against one thread.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub thread_id: ThreadId,
    pub query: String,
    pub scope: Scope,
}

impl TurnRequest {
    pub fn new(thread_id: impl Into<ThreadId>, query: impl Into<String>, scope: Scope) -> Self {
        Self {
            thread_id: thread_id.into(),
            query: query.into(),
            scope,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.thread_id.as_str().trim().is_empty() {
            return Err(Error::InvalidRequest("thread_id must not be empty".into()));
        }
        if self.query.trim().is_empty() {
            return Err(Error::InvalidRequest("query must not be empty".into()));
        }
        self.scope.validate()
    }
}

/// What a committed turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub answer: String,
    pub rewritten_query: String,
    /// The thread's title after the turn.
    pub title: Option<String>,
    pub passages: Vec<Passage>,
    pub summarized: bool,
    pub state: ConversationState,
}

pub struct ConversationEngine {
    rewriter: QueryRewriter,
    titles: TitleGenerator,
    answers: AnswerGenerator,
    summarizer: Summarizer,
    retriever: Arc<dyn Retriever>,
    store: Arc<dyn CheckpointStore>,
    locks: Arc<ThreadLocks>,
    metadata_key: String,
    top_k: usize,
    hnsw_ef: u32,
    summarize_after: usize,
}

impl ConversationEngine {
    pub fn new(
        provider: Arc<dyn Provider>,
        retriever: Arc<dyn Retriever>,
        store: Arc<dyn CheckpointStore>,
        config: &AppConfig,
    ) -> Self {
        let models = &config.models;
        let pipeline = &config.pipeline;
        Self {
            rewriter: QueryRewriter::new(provider.clone(), &models.rewrite, pipeline.rewrite_window),
            titles: TitleGenerator::new(provider.clone(), &models.title, pipeline.title_max_words),
            answers: AnswerGenerator::new(provider.clone(), &models.answer, pipeline.answer_window)
                .with_sampling(models.temperature, Some(models.max_tokens)),
            summarizer: Summarizer::new(provider, &models.summary),
            retriever,
            store,
            locks: Arc::new(ThreadLocks::new()),
            metadata_key: config.retrieval.metadata_key.clone(),
            top_k: config.retrieval.top_k,
            hnsw_ef: config.retrieval.hnsw_ef,
            summarize_after: pipeline.summarize_after,
        }
    }

    /// Wire the configured provider, retriever and checkpoint store.
    pub async fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let router = syllabot_providers::build_from_config(config);
        let provider = router.default().ok_or_else(|| Error::Config {
            message: format!("provider '{}' is not configured", config.default_provider),
        })?;
        let retriever = syllabot_retrieval::build_from_config(config, provider.clone()).await?;
        let store = syllabot_checkpoint::build_from_config(config).await?;

        info!(
            provider = provider.name(),
            retriever = retriever.name(),
            store = store.name(),
            "Conversation engine ready"
        );
        Ok(Self::new(provider, retriever, store, config))
    }

    /// Thread management sharing this engine's store and locks.
    pub fn registry(&self) -> ThreadRegistry {
        ThreadRegistry::new(self.store.clone(), self.locks.clone())
    }

    /// The checkpoint store, for health probes.
    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    /// Run a turn in the background.
    ///
    /// The receiver yields `token` events, then exactly one `done` or
    /// `error` event, then closes.
    pub fn run_turn(self: &Arc<Self>, request: TurnRequest) -> mpsc::Receiver<TurnEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let engine = Arc::clone(self);

        tokio::spawn(async move {
            let thread_id = request.thread_id.to_string();
            let event = match engine.execute(request, &tx).await {
                Ok(outcome) => TurnEvent::Done {
                    thread_id,
                    title: outcome.title,
                    summarized: outcome.summarized,
                    message_count: outcome.state.messages.len(),
                },
                Err(e) => {
                    warn!(thread_id = %thread_id, kind = %e.kind(), "Turn failed: {e}");
                    TurnEvent::failed(&e)
                }
            };
            let _ = tx.send(event).await;
        });

        rx
    }

    /// Run a turn to completion, forwarding answer tokens to `events`.
    pub async fn execute(
        &self,
        request: TurnRequest,
        events: &mpsc::Sender<TurnEvent>,
    ) -> Result<TurnOutcome, Error> {
        request.validate()?;

        let span = info_span!(
            "rag_query",
            thread_id = %request.thread_id,
            semester = request.scope.semester,
            subject = %request.scope.subject,
            unit = request.scope.unit,
        );
        self.execute_locked(request, events).instrument(span).await
    }

    async fn execute_locked(
        &self,
        request: TurnRequest,
        events: &mpsc::Sender<TurnEvent>,
    ) -> Result<TurnOutcome, Error> {
        let TurnRequest {
            thread_id,
            query,
            scope,
        } = request;

        let _guard = self.locks.acquire(&thread_id).await;

        let mut state = match self.store.latest(&thread_id).await? {
            Some(checkpoint) => checkpoint.state,
            None => ConversationState::new(thread_id.clone()),
        };
        debug!(messages = state.messages.len(), "state loaded");

        // rewrite_query
        let rewritten = self.rewriter.rewrite(&state.messages, &query).await?;
        let search_query = retrieval_query(&rewritten, &query);
        debug!(step = "rewrite_query", rewritten = %search_query, "step complete");

        // generate_title and retrieve_docs, concurrently
        let needs_title = state.conversation_title.is_none();
        let title_step = async {
            if needs_title {
                self.titles.generate(&search_query).await.map_err(Error::from)
            } else {
                Ok(None)
            }
        };
        let search = SearchRequest {
            query: search_query.clone(),
            filter: scope_filter_with_key(&self.metadata_key, &scope),
            limit: self.top_k,
            hnsw_ef: self.hnsw_ef,
        };
        let retrieve_step = async { self.retriever.search(search).await.map_err(Error::from) };
        let (new_title, passages) = tokio::try_join!(title_step, retrieve_step)?;
        debug!(
            step = "retrieve_docs",
            passages = passages.len(),
            titled = new_title.is_some(),
            "step complete"
        );

        // build_context
        let context = assemble_context(&passages);

        // generate_answer
        let answer = if context.is_empty() {
            debug!(step = "generate_answer", "no context retrieved, refusing");
            let _ = events
                .send(TurnEvent::Token {
                    content: REFUSAL_TEXT.to_string(),
                })
                .await;
            REFUSAL_TEXT.to_string()
        } else {
            let messages = self.answers.build_messages(
                state.summary.as_deref(),
                &state.messages,
                &query,
                &context,
            );
            self.answers.generate(messages, events).await?
        };

        state.push(Message::user(&query));
        state.push(Message::assistant(&answer));
        if let Some(title) = new_title {
            state.set_title_once(title);
        }
        self.store.put(&state).await?;
        debug!(step = "generate_answer", messages = state.messages.len(), "turn committed");

        // summarize
        let mut summarized = false;
        if let SummaryDecision::Summarize { pending } =
            should_summarize(&state, self.summarize_after)
        {
            let update = self
                .summarizer
                .summarize(&state)
                .await
                .map_err(Error::Summary)?;
            if let Some(update) = update {
                state.apply_summary(update)?;
                self.store.put(&state).await?;
                summarized = true;
                debug!(
                    step = "summarize",
                    folded = pending,
                    last_summarized_index = state.last_summarized_index,
                    "summary committed"
                );
            }
        }

        info!(
            messages = state.messages.len(),
            passages = passages.len(),
            summarized,
            "turn complete"
        );

        Ok(TurnOutcome {
            answer,
            rewritten_query: search_query,
            title: state.conversation_title.clone(),
            passages,
            summarized,
            state,
        })
    }
}
