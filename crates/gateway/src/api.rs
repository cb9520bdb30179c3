//! Thread and query endpoints.
//!
//! - `GET    /threads`              — List threads, most recent first
//! - `GET    /threads/{id}`         — Dialogue history of a thread
//! - `DELETE /threads/{id}`         — Delete a thread and all its checkpoints
//! - `PATCH  /threads/{id}/rename`  — Set a thread's title
//! - `POST   /rag/query`            — Ask a question, get an SSE token stream

use axum::{
    Router,
    extract::rejection::JsonRejection,
    extract::{Path, State},
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    response::{IntoResponse, Json, Response},
    routing::{get, patch, post},
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

use syllabot_agent::{HistoryEntry, ThreadSummary, TurnEvent, TurnRequest};
use syllabot_core::error::ErrorKind;
use syllabot_core::message::ThreadId;
use syllabot_core::retrieval::Scope;

use crate::SharedState;
use crate::error::ApiError;

pub fn api_router(state: SharedState) -> Router {
    Router::new()
        .route("/threads", get(list_threads_handler))
        .route(
            "/threads/{id}",
            get(thread_history_handler).delete(delete_thread_handler),
        )
        .route("/threads/{id}/rename", patch(rename_thread_handler))
        .route("/rag/query", post(rag_query_handler))
        .with_state(state)
}

// ── Threads ───────────────────────────────────────────────────────────────

async fn list_threads_handler(
    State(state): State<SharedState>,
) -> Result<Json<Vec<ThreadSummary>>, ApiError> {
    Ok(Json(state.engine.registry().list_threads().await?))
}

async fn thread_history_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    let history = state.engine.registry().history(&ThreadId::from(id)).await?;
    Ok(Json(history))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub status: String,
    pub thread_id: String,
    pub removed: usize,
}

async fn delete_thread_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let report = state
        .engine
        .registry()
        .delete_thread(&ThreadId::from(id))
        .await?;
    Ok(Json(DeleteResponse {
        status: "deleted".into(),
        thread_id: report.thread_id,
        removed: report.removed,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub title: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

async fn rename_thread_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    payload: Result<Json<RenameRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Json(body) = payload?;
    state
        .engine
        .registry()
        .rename_thread(&ThreadId::from(id), &body.title)
        .await?;
    Ok(Json(StatusResponse {
        status: "ok".into(),
    }))
}

// ── Query ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RagQueryRequest {
    pub query: String,
    pub semester: u8,
    pub subject: String,
    pub unit: u8,
    /// A fresh thread is started when absent.
    #[serde(default)]
    pub thread_id: Option<String>,
}

/// `POST /rag/query`: run one turn, streaming the answer as SSE.
///
/// The first engine event decides the response: a failure before any token
/// becomes a plain JSON error, anything else opens the stream.
async fn rag_query_handler(
    State(state): State<SharedState>,
    payload: Result<Json<RagQueryRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = payload?;
    let thread_id = body.thread_id.map(ThreadId::from).unwrap_or_default();
    let request = TurnRequest::new(
        thread_id,
        body.query,
        Scope::new(body.semester, body.subject, body.unit),
    );
    request.validate()?;

    info!(
        thread_id = %request.thread_id,
        semester = request.scope.semester,
        subject = %request.scope.subject,
        unit = request.scope.unit,
        "rag query"
    );

    let mut rx = state.engine.run_turn(request);
    let first = rx
        .recv()
        .await
        .ok_or_else(|| ApiError::new(ErrorKind::Internal, "turn ended without a result"))?;
    if let TurnEvent::Failed { kind, message, .. } = first {
        return Err(ApiError::new(kind, message));
    }

    let stream = tokio_stream::once(first)
        .chain(ReceiverStream::new(rx))
        .map(|event| Ok::<_, Infallible>(to_sse(&event)));

    Ok(Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response())
}

fn to_sse(event: &TurnEvent) -> SseEvent {
    let data = serde_json::to_string(event).unwrap_or_default();
    SseEvent::default().event(event.event_type()).data(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GatewayState, build_router};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use syllabot_agent::ConversationEngine;
    use syllabot_agent::testing::RoutingMockProvider;
    use syllabot_checkpoint::InMemoryCheckpointStore;
    use syllabot_config::AppConfig;
    use syllabot_core::error::RetrievalError;
    use syllabot_core::retrieval::{Passage, Retriever, SearchRequest};
    use syllabot_retrieval::InMemoryRetriever;
    use tower::ServiceExt;

    struct DownRetriever;

    #[async_trait]
    impl Retriever for DownRetriever {
        fn name(&self) -> &str {
            "down"
        }

        async fn search(&self, _request: SearchRequest) -> Result<Vec<Passage>, RetrievalError> {
            Err(RetrievalError::Backend {
                status_code: 503,
                message: "collection unavailable".into(),
            })
        }
    }

    async fn curriculum() -> Arc<dyn Retriever> {
        let retriever = InMemoryRetriever::new();
        retriever
            .add(Passage::new("An algorithm is a finite set of instructions.").scoped(&Scope::new(1, "aoa", 1)))
            .await
            .unwrap();
        Arc::new(retriever)
    }

    fn state_with(provider: RoutingMockProvider, retriever: Arc<dyn Retriever>) -> SharedState {
        let engine = ConversationEngine::new(
            Arc::new(provider),
            retriever,
            Arc::new(InMemoryCheckpointStore::new()),
            &AppConfig::default(),
        );
        Arc::new(GatewayState::new(Arc::new(engine), AppConfig::default()))
    }

    async fn test_state() -> SharedState {
        state_with(RoutingMockProvider::new(), curriculum().await)
    }

    fn query(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/rag/query")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn ask(thread: &str, question: &str) -> Request<Body> {
        query(serde_json::json!({
            "query": question,
            "semester": 1,
            "subject": "aoa",
            "unit": 1,
            "thread_id": thread,
        }))
    }

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn rag_query_streams_tokens_then_done() {
        let app = build_router(test_state().await);
        let response = app.oneshot(ask("t1", "What is an algorithm?")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"].to_str().unwrap(),
            "text/event-stream"
        );
        let body = body_text(response).await;
        assert!(body.contains("event: token"));
        assert!(body.contains(r#""content":"An algorithm is ""#));
        assert!(body.contains("event: done"));
        assert!(body.contains(r#""message_count":2"#));
        assert!(body.find("event: token").unwrap() < body.find("event: done").unwrap());
    }

    #[tokio::test]
    async fn rag_query_validation_is_422() {
        let app = build_router(test_state().await);

        let bad_scope = query(serde_json::json!({
            "query": "q", "semester": 9, "subject": "aoa", "unit": 1, "thread_id": "t"
        }));
        let response = app.clone().oneshot(bad_scope).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["kind"], "invalid_request");

        let missing_field = query(serde_json::json!({ "query": "q", "semester": 1 }));
        let response = app.oneshot(missing_field).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn retrieval_failure_is_a_failed_request() {
        let app = build_router(state_with(RoutingMockProvider::new(), Arc::new(DownRetriever)));
        let response = app.oneshot(ask("t1", "What is an algorithm?")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["kind"], "retrieval_failure");
    }

    #[tokio::test]
    async fn mid_stream_failure_ends_stream_with_incomplete_error() {
        let provider = RoutingMockProvider::new()
            .with_answer(&["An ", "algorithm"])
            .failing_answer_after(1);
        let app = build_router(state_with(provider, curriculum().await));
        let response = app.oneshot(ask("t1", "What is an algorithm?")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("event: token"));
        assert!(body.contains("event: error"));
        assert!(body.contains(r#""incomplete":true"#));
        assert!(!body.contains("event: done"));
    }

    #[tokio::test]
    async fn thread_lifecycle() {
        let state = test_state().await;
        let app = build_router(state);

        let response = app.clone().oneshot(ask("t1", "What is an algorithm?")).await.unwrap();
        body_text(response).await;

        // list
        let req = Request::builder().uri("/threads").body(Body::empty()).unwrap();
        let response = app.clone().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let threads: Vec<ThreadSummary> =
            serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].title, "Algorithm Basics");

        // history
        let req = Request::builder().uri("/threads/t1").body(Body::empty()).unwrap();
        let response = app.clone().oneshot(req).await.unwrap();
        let history: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(history.as_array().unwrap().len(), 2);
        assert_eq!(history[0]["role"], "user");
        assert_eq!(history[1]["role"], "assistant");
        assert!(history[0].get("timestamp").is_none());

        // rename
        let req = Request::builder()
            .method("PATCH")
            .uri("/threads/t1/rename")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"title":"Exam Prep"}"#))
            .unwrap();
        let response = app.clone().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let req = Request::builder().uri("/threads").body(Body::empty()).unwrap();
        let threads: Vec<ThreadSummary> =
            serde_json::from_str(&body_text(app.clone().oneshot(req).await.unwrap()).await).unwrap();
        assert_eq!(threads[0].title, "Exam Prep");

        // delete
        let req = Request::builder()
            .method("DELETE")
            .uri("/threads/t1")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(req).await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["status"], "deleted");
        assert_eq!(json["removed"], 1);

        let req = Request::builder().uri("/threads").body(Body::empty()).unwrap();
        let threads: Vec<ThreadSummary> =
            serde_json::from_str(&body_text(app.clone().oneshot(req).await.unwrap()).await).unwrap();
        assert!(threads.is_empty());

        let req = Request::builder().uri("/threads/t1").body(Body::empty()).unwrap();
        let history = body_text(app.oneshot(req).await.unwrap()).await;
        assert_eq!(history, "[]");
    }

    #[tokio::test]
    async fn rename_errors() {
        let app = build_router(test_state().await);

        let req = Request::builder()
            .method("PATCH")
            .uri("/threads/missing/rename")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"title":"X"}"#))
            .unwrap();
        assert_eq!(app.clone().oneshot(req).await.unwrap().status(), StatusCode::NOT_FOUND);

        let response = app.clone().oneshot(ask("t1", "What is an algorithm?")).await.unwrap();
        body_text(response).await;

        let req = Request::builder()
            .method("PATCH")
            .uri("/threads/t1/rename")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"title":"   "}"#))
            .unwrap();
        assert_eq!(
            app.oneshot(req).await.unwrap().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[tokio::test]
    async fn delete_unknown_thread_is_idempotent() {
        let app = build_router(test_state().await);
        let req = Request::builder()
            .method("DELETE")
            .uri("/threads/never-existed")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["removed"], 0);
    }
}
