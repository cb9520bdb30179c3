//! # Syllabot Core
//!
//! Domain types, collaborator traits, and error definitions for the Syllabot
//! curriculum tutor. This crate performs **no I/O**: it defines the model
//! that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Each external collaborator is a trait here:
//! - [`Provider`] — the generation (and embedding) backend
//! - [`Retriever`] — the similarity-search backend
//! - [`CheckpointStore`] — the durable per-thread state store
//!
//! Implementations live in their respective crates, so the orchestration
//! engine can be exercised end-to-end against in-memory stand-ins.

pub mod checkpoint;
pub mod error;
pub mod message;
pub mod provider;
pub mod retrieval;
pub mod state;

// Re-export key types at crate root for ergonomics
pub use checkpoint::{Checkpoint, CheckpointHeader, CheckpointStore};
pub use error::{Error, ErrorKind, Result};
pub use message::{Message, Role, ThreadId};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk};
pub use retrieval::{FieldMatch, Passage, Retriever, Scope, ScopeFilter, SearchRequest};
pub use state::{ConversationState, SummaryUpdate};
