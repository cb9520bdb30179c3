//! The conversation engine: one grounded tutoring turn at a time.
//!
//! A turn follows a fixed pipeline:
//!
//! 1. **Rewrite** the student's message into a self-contained question
//! 2. **Title** the thread (first turns only) and **retrieve** scoped
//!    passages, concurrently
//! 3. **Assemble** the passages into a numbered context block
//! 4. **Answer** from that context only, streaming tokens as they arrive
//! 5. **Commit** the turn, then **summarize** once enough history piles up
//!
//! [`ThreadRegistry`] covers everything outside a turn: listing threads,
//! reading history, renaming and deleting.

pub mod answer;
pub mod context;
pub mod locks;
pub mod pipeline;
pub mod prompts;
pub mod registry;
pub mod rewriter;
pub mod stream_event;
pub mod summarizer;
pub mod title;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use locks::ThreadLocks;
pub use pipeline::{ConversationEngine, TurnOutcome, TurnRequest};
pub use registry::{DeleteReport, HistoryEntry, ThreadRegistry, ThreadSummary};
pub use stream_event::TurnEvent;
pub use summarizer::{should_summarize, SummaryDecision};
