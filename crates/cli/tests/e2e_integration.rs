//! End-to-end integration tests for the Syllabot tutor.
//!
//! These tests drive whole turns through the engine against a SQLite
//! checkpoint store, an in-memory curriculum, and a scripted provider, and
//! then check what a student (or the HTTP surface) would observe.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tokio::sync::mpsc;
use tower::ServiceExt;

use syllabot_agent::prompts::REFUSAL_TEXT;
use syllabot_agent::testing::{RoutingMockProvider, Step};
use syllabot_agent::{ConversationEngine, TurnEvent, TurnOutcome, TurnRequest};
use syllabot_checkpoint::SqliteCheckpointStore;
use syllabot_config::AppConfig;
use syllabot_core::checkpoint::CheckpointStore;
use syllabot_core::message::{Role, ThreadId};
use syllabot_core::retrieval::{Passage, Retriever, Scope};
use syllabot_retrieval::InMemoryRetriever;

// ── Fixtures ─────────────────────────────────────────────────────────────

fn aoa_unit1() -> Scope {
    Scope::new(1, "aoa", 1)
}

async fn curriculum() -> Arc<InMemoryRetriever> {
    let retriever = InMemoryRetriever::new();
    let passages = [
        ("An algorithm is a finite sequence of unambiguous instructions.", aoa_unit1()),
        ("Time complexity counts basic operations as input size grows.", aoa_unit1()),
        ("Big-O notation gives an asymptotic upper bound.", aoa_unit1()),
        ("Dijkstra's algorithm finds single-source shortest paths.", Scope::new(1, "aoa", 4)),
        ("Normalization removes redundancy from relations.", Scope::new(3, "dbms", 2)),
    ];
    for (content, scope) in passages {
        retriever.add(Passage::new(content).scoped(&scope)).await.unwrap();
    }
    Arc::new(retriever)
}

struct Tutor {
    engine: Arc<ConversationEngine>,
    provider: Arc<RoutingMockProvider>,
    store: Arc<SqliteCheckpointStore>,
    _dir: tempfile::TempDir,
}

async fn open_store(dir: &tempfile::TempDir) -> Arc<SqliteCheckpointStore> {
    let path = format!("sqlite://{}", dir.path().join("checkpoints.sqlite").display());
    Arc::new(SqliteCheckpointStore::new(&path).await.unwrap())
}

async fn tutor_with(provider: RoutingMockProvider, retriever: Arc<dyn Retriever>) -> Tutor {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;
    let provider = Arc::new(provider);
    let engine = Arc::new(ConversationEngine::new(
        provider.clone(),
        retriever,
        store.clone(),
        &AppConfig::default(),
    ));
    Tutor {
        engine,
        provider,
        store,
        _dir: dir,
    }
}

async fn tutor() -> Tutor {
    tutor_with(RoutingMockProvider::new(), curriculum().await).await
}

/// Run a turn, returning the outcome and the streamed tokens.
async fn turn(tutor: &Tutor, thread: &str, question: &str) -> (TurnOutcome, Vec<String>) {
    let (tx, mut rx) = mpsc::channel(64);
    let outcome = tutor
        .engine
        .execute(TurnRequest::new(thread, question, aoa_unit1()), &tx)
        .await
        .unwrap();
    drop(tx);

    let mut tokens = Vec::new();
    while let Some(event) = rx.recv().await {
        if let TurnEvent::Token { content } = event {
            tokens.push(content);
        }
    }
    (outcome, tokens)
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_first_question_on_fresh_thread() {
    let tutor = tutor().await;
    let (outcome, tokens) = turn(&tutor, "student-1", "What is an algorithm?").await;

    assert!(outcome.title.is_some());
    assert!(!tokens.is_empty());
    assert!(tokens.iter().all(|t| !t.is_empty()));
    assert_eq!(tokens.concat(), outcome.answer);

    // Grounded in passages from the requested scope only.
    assert_eq!(outcome.passages.len(), 3);
    assert!(outcome.passages.iter().all(|p| p.metadata["unit"] == 1));

    let stored = tutor
        .store
        .latest(&ThreadId::from("student-1"))
        .await
        .unwrap()
        .unwrap()
        .state;
    assert_eq!(stored.messages.len(), 2);
    assert_eq!(stored.messages[0].role, Role::User);
    assert_eq!(stored.messages[1].content, outcome.answer);
    assert_eq!(stored.last_summarized_index, 0);
    assert!(stored.summary.is_none());
}

#[tokio::test]
async fn e2e_seven_turns_fold_into_summary() {
    let tutor = tutor().await;
    let mut previous_index = 0;

    for i in 1..=7 {
        let (outcome, _) = turn(&tutor, "long", &format!("follow-up {i}")).await;
        let state = &outcome.state;

        assert!(state.last_summarized_index >= previous_index);
        assert!(state.last_summarized_index <= state.messages.len());
        // summary and boundary move together
        assert_eq!(state.summary.is_some(), state.last_summarized_index > 0);

        if i == 3 {
            assert!(outcome.summarized);
            assert_eq!(state.last_summarized_index, 6);
        }
        previous_index = state.last_summarized_index;
    }

    let stored = tutor
        .store
        .latest(&ThreadId::from("long"))
        .await
        .unwrap()
        .unwrap()
        .state;
    assert_eq!(stored.messages.len(), 14);
    assert_eq!(stored.last_summarized_index, 12);
    assert!(stored.summary.is_some());
    assert_eq!(tutor.provider.calls(Step::Summary), 2);
}

#[tokio::test]
async fn e2e_title_survives_ordinary_turns_and_changes_on_rename() {
    let tutor = tutor().await;
    let (first, _) = turn(&tutor, "t", "What is an algorithm?").await;
    let generated = first.title.clone().unwrap();

    for _ in 0..3 {
        let (outcome, _) = turn(&tutor, "t", "and its complexity?").await;
        assert_eq!(outcome.title.as_deref(), Some(generated.as_str()));
    }
    assert_eq!(tutor.provider.calls(Step::Title), 1);

    let registry = tutor.engine.registry();
    registry
        .rename_thread(&ThreadId::from("t"), "Unit 1 revision")
        .await
        .unwrap();
    let threads = registry.list_threads().await.unwrap();
    assert_eq!(threads[0].title, "Unit 1 revision");

    let (after, _) = turn(&tutor, "t", "one more").await;
    assert_eq!(after.title.as_deref(), Some("Unit 1 revision"));
}

#[tokio::test]
async fn e2e_out_of_scope_question_gets_refusal() {
    let tutor = tutor_with(RoutingMockProvider::new(), curriculum().await).await;
    let (tx, mut rx) = mpsc::channel(64);
    let outcome = tutor
        .engine
        .execute(
            TurnRequest::new("t", "What is 3NF?", Scope::new(2, "dbms", 3)),
            &tx,
        )
        .await
        .unwrap();
    drop(tx);

    assert_eq!(outcome.answer, REFUSAL_TEXT);
    assert_eq!(tutor.provider.calls(Step::Answer), 0);
    assert_eq!(
        rx.recv().await,
        Some(TurnEvent::Token {
            content: REFUSAL_TEXT.into()
        })
    );
}

#[tokio::test]
async fn e2e_rename_list_delete_roundtrip() {
    let tutor = tutor().await;
    turn(&tutor, "a", "What is an algorithm?").await;
    turn(&tutor, "b", "What is Big-O?").await;

    let registry = tutor.engine.registry();
    registry.rename_thread(&ThreadId::from("a"), "T").await.unwrap();
    let threads = registry.list_threads().await.unwrap();
    assert!(threads.iter().any(|t| t.thread_id == "a" && t.title == "T"));

    let report = registry.delete_thread(&ThreadId::from("a")).await.unwrap();
    assert!(report.removed >= 2);

    let threads = registry.list_threads().await.unwrap();
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0].thread_id, "b");
    assert!(registry.history(&ThreadId::from("a")).await.unwrap().is_empty());

    // A new turn on the deleted id starts over.
    let (fresh, _) = turn(&tutor, "a", "What is an algorithm?").await;
    assert_eq!(fresh.state.messages.len(), 2);
}

#[tokio::test]
async fn e2e_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = open_store(&dir).await;
        let engine = ConversationEngine::new(
            Arc::new(RoutingMockProvider::new()),
            curriculum().await,
            store,
            &AppConfig::default(),
        );
        let (tx, _rx) = mpsc::channel(64);
        engine
            .execute(TurnRequest::new("persist", "What is an algorithm?", aoa_unit1()), &tx)
            .await
            .unwrap();
    }

    let provider = Arc::new(RoutingMockProvider::new());
    let engine = ConversationEngine::new(
        provider.clone(),
        curriculum().await,
        open_store(&dir).await,
        &AppConfig::default(),
    );
    let history = engine
        .registry()
        .history(&ThreadId::from("persist"))
        .await
        .unwrap();
    assert_eq!(history.len(), 2);

    let (tx, _rx) = mpsc::channel(64);
    let outcome = engine
        .execute(TurnRequest::new("persist", "Explain it again", aoa_unit1()), &tx)
        .await
        .unwrap();
    assert_eq!(outcome.state.messages.len(), 4);
    // Title came from the first process; not regenerated.
    assert_eq!(provider.calls(Step::Title), 0);
    // The rewriter saw the earlier turn.
    assert_eq!(provider.requests(Step::Rewrite)[0].messages.len(), 4);
}

#[tokio::test]
async fn e2e_mid_stream_failure_leaves_thread_untouched() {
    let tutor = tutor_with(
        RoutingMockProvider::new()
            .with_answer(&["An ", "algorithm ", "is"])
            .failing_answer_after(2),
        curriculum().await,
    )
    .await;

    let mut rx = tutor
        .engine
        .run_turn(TurnRequest::new("t", "What is an algorithm?", aoa_unit1()));
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    assert!(matches!(events.last(), Some(TurnEvent::Failed { incomplete: true, .. })));
    assert!(tutor
        .store
        .latest(&ThreadId::from("t"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn e2e_concurrent_turns_are_serialized() {
    let tutor = tutor().await;
    let n = 6;

    let mut handles = Vec::new();
    for i in 0..n {
        let engine = tutor.engine.clone();
        handles.push(tokio::spawn(async move {
            let (tx, _rx) = mpsc::channel(64);
            engine
                .execute(TurnRequest::new("busy", format!("q{i}"), aoa_unit1()), &tx)
                .await
        }));
    }
    for h in handles {
        h.await.unwrap().unwrap();
    }

    let state = tutor
        .store
        .latest(&ThreadId::from("busy"))
        .await
        .unwrap()
        .unwrap()
        .state;
    assert_eq!(state.messages.len(), 2 * n);
    assert!(state.last_summarized_index <= state.messages.len());
}

#[tokio::test]
async fn e2e_http_query_then_thread_listing() {
    let tutor = tutor().await;
    let app = syllabot_gateway::build_router(Arc::new(syllabot_gateway::GatewayState::new(
        tutor.engine.clone(),
        AppConfig::default(),
    )));

    let body = serde_json::json!({
        "query": "What is an algorithm?",
        "semester": 1,
        "subject": "aoa",
        "unit": 1,
        "thread_id": "web-1",
    });
    let req = Request::builder()
        .method("POST")
        .uri("/rag/query")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let sse = response.into_body().collect().await.unwrap().to_bytes();
    let sse = String::from_utf8(sse.to_vec()).unwrap();
    assert!(sse.contains("event: token"));
    assert!(sse.contains("event: done"));

    let req = Request::builder().uri("/threads").body(Body::empty()).unwrap();
    let response = app.oneshot(req).await.unwrap();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let threads: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(threads[0]["thread_id"], "web-1");
    assert_eq!(threads[0]["title"], "Algorithm Basics");
}
