//! HTTP gateway for Syllabot.
//!
//! Exposes the conversation engine over REST + SSE: a health check, thread
//! management, and the streaming `/rag/query` endpoint.
//!
//! Built on Axum for high performance async HTTP.

pub mod api;
pub mod error;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::{Router, response::Json, routing::get};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

use syllabot_agent::ConversationEngine;
use syllabot_config::AppConfig;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub engine: Arc<ConversationEngine>,
    pub config: AppConfig,
}

impl GatewayState {
    pub fn new(engine: Arc<ConversationEngine>, config: AppConfig) -> Self {
        Self { engine, config }
    }
}

pub type SharedState = Arc<GatewayState>;

/// Build the router with every route and the CORS, body-limit and trace
/// layers from `state.config.gateway`.
pub fn build_router(state: SharedState) -> Router {
    let gateway = &state.config.gateway;
    let cors = cors_layer(&gateway.cors_origins);
    let body_limit = gateway.max_body_bytes;

    Router::new()
        .route("/health", get(health_handler))
        .with_state(state.clone())
        .merge(api::api_router(state))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// `"*"` allows any origin; otherwise only the listed ones.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(std::time::Duration::from_secs(3600));

    if origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(allowed))
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let engine = Arc::new(ConversationEngine::from_config(&config).await?);
    let app = build_router(Arc::new(GatewayState::new(engine, config)));

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    checkpoints: &'static str,
}

/// 200 while the checkpoint store answers, 503 otherwise.
async fn health_handler(State(state): State<SharedState>) -> (StatusCode, Json<HealthResponse>) {
    let store = state.engine.store();
    let healthy = match store.health_check().await {
        Ok(healthy) => healthy,
        Err(e) => {
            warn!(store = store.name(), error = %e, "Checkpoint store health check failed");
            false
        }
    };

    let (code, status, checkpoints) = if healthy {
        (StatusCode::OK, "ok", "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded", "unavailable")
    };
    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            checkpoints,
        }),
    )
}
