//! Error types for the Syllabot domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each collaborator boundary has its own error enum; the top-level
//! [`Error`] wraps them and adds the turn-level outcomes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The top-level error type for all Syllabot operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Generation collaborator ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Similarity-search collaborator ---
    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    // --- Durable checkpoint store ---
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// Generation failed after at least one fragment reached the client.
    #[error("Answer generation interrupted after {} streamed bytes: {source}", .partial.len())]
    Incomplete {
        partial: String,
        #[source]
        source: ProviderError,
    },

    /// The answer was committed but folding it into the summary failed.
    #[error("Summary update failed after the answer was saved: {0}")]
    Summary(#[source] ProviderError),

    #[error("Thread not found: {0}")]
    ThreadNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`], as surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RetrievalFailure,
    GenerationFailure,
    IncompleteGeneration,
    SummaryFailure,
    StateNotFound,
    InvalidRequest,
    Storage,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RetrievalFailure => "retrieval_failure",
            Self::GenerationFailure => "generation_failure",
            Self::IncompleteGeneration => "incomplete_generation",
            Self::SummaryFailure => "summary_failure",
            Self::StateNotFound => "state_not_found",
            Self::InvalidRequest => "invalid_request",
            Self::Storage => "storage",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Provider(_) => ErrorKind::GenerationFailure,
            Self::Retrieval(_) => ErrorKind::RetrievalFailure,
            Self::Checkpoint(_) => ErrorKind::Storage,
            Self::Incomplete { .. } => ErrorKind::IncompleteGeneration,
            Self::Summary(_) => ErrorKind::SummaryFailure,
            Self::ThreadNotFound(_) => ErrorKind::StateNotFound,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::Config { .. } | Self::Serialization(_) | Self::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }
}

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("Similarity search backend unreachable: {0}")]
    Unreachable(String),

    #[error("Similarity search failed: {message} (status: {status_code})")]
    Backend { status_code: u16, message: String },

    #[error("Query embedding failed: {0}")]
    Embedding(String),

    #[error("Invalid search response: {0}")]
    InvalidResponse(String),

    #[error("Failed to load corpus {path}: {reason}")]
    Corpus { path: String, reason: String },
}

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Corrupt checkpoint {checkpoint_id}: {reason}")]
    Corrupt {
        checkpoint_id: String,
        reason: String,
    },
}
