//! Scoped similarity search for Syllabot.
//!
//! Two backends implement [`syllabot_core::Retriever`]:
//! - **Qdrant** — the production vector database, reached over REST
//! - **In-memory** — exact-match filtering with local ranking over a
//!   passage file ([`corpus`]), for tests and local development
//!
//! [`filter`] builds the scope predicate both backends understand.

pub mod corpus;
pub mod filter;
pub mod in_memory;
pub mod qdrant;
pub mod vector;

use std::sync::Arc;
use syllabot_core::error::RetrievalError;
use syllabot_core::provider::Provider;
use syllabot_core::retrieval::Retriever;

pub use corpus::load_corpus;
pub use filter::{scope_filter, scope_filter_with_key};
pub use in_memory::InMemoryRetriever;
pub use qdrant::{QdrantRetriever, QdrantSettings};

/// Build the configured retriever.
///
/// `embedder` vectorizes queries (and, for the memory backend, the corpus
/// passages) with the configured embedding model.
pub async fn build_from_config(
    config: &syllabot_config::AppConfig,
    embedder: Arc<dyn Provider>,
) -> Result<Arc<dyn Retriever>, RetrievalError> {
    let retrieval = &config.retrieval;
    match retrieval.backend.as_str() {
        "memory" => {
            let path = retrieval
                .corpus_path
                .as_deref()
                .ok_or_else(|| RetrievalError::Corpus {
                    path: "retrieval.corpus_path".into(),
                    reason: "not set".into(),
                })?;
            let passages = load_corpus(path).await?;
            tracing::info!(
                path = %path.display(),
                passages = passages.len(),
                "Using in-memory retriever"
            );

            let retriever =
                InMemoryRetriever::with_embedder(embedder, config.models.embedding.clone());
            for passage in passages {
                retriever.add(passage).await?;
            }
            Ok(Arc::new(retriever))
        }
        _ => {
            tracing::info!(
                url = %retrieval.url,
                collection = %retrieval.collection,
                "Using Qdrant retriever"
            );
            Ok(Arc::new(QdrantRetriever::new(
                QdrantSettings {
                    url: retrieval.url.clone(),
                    collection: retrieval.collection.clone(),
                    api_key: retrieval.api_key.clone(),
                    content_key: retrieval.content_key.clone(),
                    metadata_key: retrieval.metadata_key.clone(),
                    embedding_model: config.models.embedding.clone(),
                },
                embedder,
            )))
        }
    }
}
