//! Retriever trait: the abstraction over similarity search.
//!
//! Passages of the curriculum corpus are stored with metadata naming the
//! semester, subject and unit they belong to. Every search is scoped to
//! exactly one such triple through a conjunctive exact-match [`ScopeFilter`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::{Error, RetrievalError};

/// Highest semester number accepted by [`Scope::validate`].
pub const MAX_SEMESTER: u8 = 8;
/// Highest unit number accepted by [`Scope::validate`].
pub const MAX_UNIT: u8 = 7;

/// The (semester, subject, unit) triple restricting retrieval to a
/// curriculum subset. Supplied per request, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub semester: u8,
    pub subject: String,
    pub unit: u8,
}

impl Scope {
    pub fn new(semester: u8, subject: impl Into<String>, unit: u8) -> Self {
        Self {
            semester,
            subject: subject.into(),
            unit,
        }
    }

    /// Check the selector ranges accepted at the request boundary.
    pub fn validate(&self) -> Result<(), Error> {
        if !(1..=MAX_SEMESTER).contains(&self.semester) {
            return Err(Error::InvalidRequest(format!(
                "semester must be between 1 and {MAX_SEMESTER}, got {}",
                self.semester
            )));
        }
        if !(1..=MAX_UNIT).contains(&self.unit) {
            return Err(Error::InvalidRequest(format!(
                "unit must be between 1 and {MAX_UNIT}, got {}",
                self.unit
            )));
        }
        if self.subject.trim().is_empty() {
            return Err(Error::InvalidRequest("subject must not be empty".into()));
        }
        Ok(())
    }
}

/// One exact-match condition on a metadata field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMatch {
    /// Dotted payload path, e.g. `metadata.semester`.
    pub key: String,
    pub value: serde_json::Value,
}

/// A structural predicate: every condition in `must` has to hold.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScopeFilter {
    pub must: Vec<FieldMatch>,
}

impl ScopeFilter {
    /// Whether a passage's metadata satisfies every condition.
    ///
    /// Keys are resolved relative to the metadata map, so a leading
    /// `metadata.` segment is ignored.
    pub fn matches(&self, metadata: &serde_json::Map<String, serde_json::Value>) -> bool {
        self.must.iter().all(|cond| {
            let field = cond.key.strip_prefix("metadata.").unwrap_or(&cond.key);
            metadata.get(field) == Some(&cond.value)
        })
    }
}

/// A retrieved corpus passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// Passage text
    #[serde(alias = "page_content")]
    pub content: String,

    /// Stored metadata (semester, subject, unit, source file, page, ...)
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,

    /// Similarity score reported by the backend
    #[serde(default)]
    pub score: f32,
}

impl Passage {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: serde_json::Map::new(),
            score: 0.0,
        }
    }

    /// Attach the scope triple as metadata.
    pub fn scoped(mut self, scope: &Scope) -> Self {
        self.metadata
            .insert("semester".into(), serde_json::json!(scope.semester));
        self.metadata
            .insert("subject".into(), serde_json::json!(scope.subject));
        self.metadata.insert("unit".into(), serde_json::json!(scope.unit));
        self
    }
}

/// A similarity search request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// The (rewritten) query text
    pub query: String,

    /// Metadata predicate every result must satisfy
    pub filter: ScopeFilter,

    /// Maximum number of passages
    pub limit: usize,

    /// Search-quality parameter (HNSW `ef`)
    pub hnsw_ef: u32,
}

/// The core Retriever trait.
///
/// Implementations: Qdrant (REST), in-memory (for testing).
/// Results are ordered by rank; approximate recall is acceptable.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// The backend name (e.g., "qdrant", "in_memory").
    fn name(&self) -> &str;

    /// Run a filtered similarity search.
    async fn search(&self, request: SearchRequest) -> Result<Vec<Passage>, RetrievalError>;
}
