//! Qdrant retriever over the REST API.
//!
//! The query is embedded through the configured [`Provider`], then sent to
//! `POST {url}/collections/{collection}/points/search` together with the
//! scope filter. Hits come back best-first and keep that order.

use std::sync::Arc;
use async_trait::async_trait;
use serde::Deserialize;
use syllabot_core::error::RetrievalError;
use syllabot_core::provider::{EmbeddingRequest, Provider};
use syllabot_core::retrieval::{Passage, Retriever, SearchRequest};
use tracing::{debug, warn};
use crate::filter::to_qdrant;

/// Connection settings for a Qdrant collection.
#[derive(Debug, Clone)]
pub struct QdrantSettings {
    pub url: String,
    pub collection: String,
    pub api_key: Option<String>,
    pub content_key: String,
    pub metadata_key: String,
    pub embedding_model: String,
}

pub struct QdrantRetriever {
    settings: QdrantSettings,
    embedder: Arc<dyn Provider>,
    client: reqwest::Client,
}

impl QdrantRetriever {
    pub fn new(settings: QdrantSettings, embedder: Arc<dyn Provider>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let mut settings = settings;
        settings.url = settings.url.trim_end_matches('/').to_string();

        Self {
            settings,
            embedder,
            client,
        }
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, RetrievalError> {
        let response = self
            .embedder
            .embed(EmbeddingRequest {
                model: self.settings.embedding_model.clone(),
                inputs: vec![query.to_string()],
            })
            .await
            .map_err(|e| RetrievalError::Embedding(e.to_string()))?;

        response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| RetrievalError::Embedding("no embedding returned".into()))
    }

    fn to_passage(&self, hit: SearchHit) -> Passage {
        let mut payload = hit.payload.unwrap_or_default();

        let content = match payload.remove(&self.settings.content_key) {
            Some(serde_json::Value::String(s)) => s,
            Some(other) => other.to_string(),
            None => String::new(),
        };

        let metadata = match payload.remove(&self.settings.metadata_key) {
            Some(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };

        Passage {
            content,
            metadata,
            score: hit.score,
        }
    }
}

#[async_trait]
impl Retriever for QdrantRetriever {
    fn name(&self) -> &str {
        "qdrant"
    }

    async fn search(&self, request: SearchRequest) -> Result<Vec<Passage>, RetrievalError> {
        let vector = self.embed_query(&request.query).await?;

        let url = format!(
            "{}/collections/{}/points/search",
            self.settings.url, self.settings.collection
        );
        let body = serde_json::json!({
            "vector": vector,
            "filter": to_qdrant(&request.filter),
            "limit": request.limit,
            "with_payload": true,
            "params": { "hnsw_ef": request.hnsw_ef },
        });

        debug!(collection = %self.settings.collection, limit = request.limit, "Searching Qdrant");

        let mut builder = self.client.post(&url).json(&body);
        if let Some(key) = &self.settings.api_key {
            builder = builder.header("api-key", key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RetrievalError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %message, "Qdrant search failed");
            return Err(RetrievalError::Backend {
                status_code: status.as_u16(),
                message,
            });
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::InvalidResponse(e.to_string()))?;

        Ok(parsed.result.into_iter().map(|hit| self.to_passage(hit)).collect())
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    score: f32,
    #[serde(default)]
    payload: Option<serde_json::Map<String, serde_json::Value>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::scope_filter;
    use axum::{Json, Router, extract::State, routing::post};
    use std::sync::Mutex;
    use syllabot_core::error::ProviderError;
    use syllabot_core::provider::{EmbeddingResponse, ProviderRequest, ProviderResponse};
    use syllabot_core::retrieval::Scope;

    struct FixedEmbedder;

    #[async_trait]
    impl Provider for FixedEmbedder {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, _: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Err(ProviderError::NotConfigured("embeddings only".into()))
        }

        async fn embed(&self, req: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
            Ok(EmbeddingResponse {
                embeddings: vec![vec![0.1, 0.2]],
                model: req.model,
                usage: None,
            })
        }
    }

    type Captured = Arc<Mutex<Option<serde_json::Value>>>;

    async fn fake_qdrant(status: u16, reply: serde_json::Value) -> (String, Captured) {
        let captured: Captured = Arc::new(Mutex::new(None));
        let app = Router::new()
            .route(
                "/collections/{name}/points/search",
                post(
                    move |State(cap): State<Captured>, Json(body): Json<serde_json::Value>| {
                        let reply = reply.clone();
                        async move {
                            *cap.lock().unwrap() = Some(body);
                            (
                                axum::http::StatusCode::from_u16(status).unwrap(),
                                Json(reply),
                            )
                        }
                    },
                ),
            )
            .with_state(captured.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), captured)
    }

    fn settings(url: String) -> QdrantSettings {
        QdrantSettings {
            url,
            collection: "rtu_curriculum".into(),
            api_key: None,
            content_key: "page_content".into(),
            metadata_key: "metadata".into(),
            embedding_model: "text-embedding-ada-002".into(),
        }
    }

    fn request() -> SearchRequest {
        SearchRequest {
            query: "bubble sort".into(),
            filter: scope_filter(&Scope::new(3, "aoa", 2)),
            limit: 6,
            hnsw_ef: 256,
        }
    }

    #[tokio::test]
    async fn search_sends_filter_and_maps_payload() {
        let (url, captured) = fake_qdrant(
            200,
            serde_json::json!({
                "result": [
                    { "id": 1, "score": 0.9, "payload": {
                        "page_content": "Bubble sort swaps neighbours.",
                        "metadata": { "semester": 3, "subject": "aoa", "unit": 2 } } },
                    { "id": 2, "score": 0.7, "payload": {
                        "page_content": "It runs in O(n^2).",
                        "metadata": { "semester": 3, "subject": "aoa", "unit": 2 } } }
                ],
                "status": "ok"
            }),
        )
        .await;

        let retriever = QdrantRetriever::new(settings(url), Arc::new(FixedEmbedder));
        let passages = retriever.search(request()).await.unwrap();

        assert_eq!(passages.len(), 2);
        assert_eq!(passages[0].content, "Bubble sort swaps neighbours.");
        assert_eq!(passages[1].content, "It runs in O(n^2).");
        assert_eq!(passages[0].metadata["subject"], "aoa");

        let body = captured.lock().unwrap().clone().unwrap();
        assert_eq!(body["limit"], 6);
        assert_eq!(body["params"]["hnsw_ef"], 256);
        assert_eq!(body["with_payload"], true);
        assert_eq!(body["filter"]["must"].as_array().unwrap().len(), 3);
        assert_eq!(body["filter"]["must"][0]["key"], "metadata.semester");
    }

    #[tokio::test]
    async fn backend_error_status_is_reported() {
        let (url, _) = fake_qdrant(500, serde_json::json!({ "status": "error" })).await;
        let retriever = QdrantRetriever::new(settings(url), Arc::new(FixedEmbedder));
        let err = retriever.search(request()).await.unwrap_err();
        assert!(matches!(err, RetrievalError::Backend { status_code: 500, .. }));
    }

    #[tokio::test]
    async fn unreachable_backend() {
        let retriever = QdrantRetriever::new(
            settings("http://127.0.0.1:9".into()),
            Arc::new(FixedEmbedder),
        );
        let err = retriever.search(request()).await.unwrap_err();
        assert!(matches!(err, RetrievalError::Unreachable(_)));
    }
}
