//! In-memory retriever, useful for testing and local development.
//!
//! Applies the scope filter exactly, then ranks the surviving passages by
//! cosine similarity when an embedder is attached, or by keyword overlap
//! otherwise.

use std::sync::Arc;
use async_trait::async_trait;
use syllabot_core::error::RetrievalError;
use syllabot_core::provider::{EmbeddingRequest, Provider};
use syllabot_core::retrieval::{Passage, Retriever, SearchRequest};
use tokio::sync::RwLock;
use crate::vector::{cosine_similarity, keyword_overlap};

struct IndexedPassage {
    passage: Passage,
    embedding: Option<Vec<f32>>,
}

struct Embedder {
    provider: Arc<dyn Provider>,
    model: String,
}

pub struct InMemoryRetriever {
    passages: RwLock<Vec<IndexedPassage>>,
    embedder: Option<Embedder>,
}

impl InMemoryRetriever {
    /// A keyword-ranked corpus.
    pub fn new() -> Self {
        Self {
            passages: RwLock::new(Vec::new()),
            embedder: None,
        }
    }

    /// A vector-ranked corpus; passages are embedded as they are added.
    pub fn with_embedder(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            passages: RwLock::new(Vec::new()),
            embedder: Some(Embedder {
                provider,
                model: model.into(),
            }),
        }
    }

    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>, RetrievalError> {
        let Some(embedder) = &self.embedder else {
            return Ok(None);
        };
        let response = embedder
            .provider
            .embed(EmbeddingRequest {
                model: embedder.model.clone(),
                inputs: vec![text.to_string()],
            })
            .await
            .map_err(|e| RetrievalError::Embedding(e.to_string()))?;
        Ok(response.embeddings.into_iter().next())
    }

    /// Add a passage to the corpus.
    pub async fn add(&self, passage: Passage) -> Result<(), RetrievalError> {
        let embedding = self.embed(&passage.content).await?;
        self.passages.write().await.push(IndexedPassage {
            passage,
            embedding,
        });
        Ok(())
    }
}

impl Default for InMemoryRetriever {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Retriever for InMemoryRetriever {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn search(&self, request: SearchRequest) -> Result<Vec<Passage>, RetrievalError> {
        let query_embedding = self.embed(&request.query).await?;
        let passages = self.passages.read().await;

        let mut scored: Vec<Passage> = passages
            .iter()
            .filter(|p| request.filter.matches(&p.passage.metadata))
            .map(|p| {
                let score = match (&query_embedding, &p.embedding) {
                    (Some(q), Some(e)) => cosine_similarity(q, e),
                    _ => keyword_overlap(&request.query, &p.passage.content),
                };
                let mut passage = p.passage.clone();
                passage.score = score;
                passage
            })
            .collect();

        // Stable sort keeps insertion order among ties.
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(request.limit);
        Ok(scored)
    }
}
