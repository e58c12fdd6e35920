use crate::admin;
use crate::types::{
    ApiError, EndConversationResponse, MemoriesQuery, MessageRequest, MessageResponse,
};
use anyhow::Context;
use ava_core::config::GatewayConfig;
use ava_core::Memory;
use ava_runtime::{Orchestrator, SystemStatus};
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub type AppState = Arc<Orchestrator>;

/// The administrative HTTP server.
///
/// - `GET /health` liveness check
/// - `GET /status` full [`SystemStatus`]
/// - `POST /message` one conversation turn
/// - `POST /conversation/end` summarize and clear the open conversation
/// - `GET /memories` most recent memories, optionally by kind
/// - `/admin/*` operator routes, see [`crate::admin`]
pub struct GatewayServer {
    orchestrator: Arc<Orchestrator>,
    host: String,
    port: u16,
}

impl GatewayServer {
    pub fn new(orchestrator: Arc<Orchestrator>, config: &GatewayConfig) -> Self {
        Self {
            orchestrator,
            host: config.host.clone(),
            port: config.port,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn router(&self) -> Router {
        router(self.orchestrator.clone())
    }

    /// Bind and serve until `shutdown` resolves.
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.addr();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Gateway failed to bind {}", addr))?;
        tracing::info!("Gateway listening on {}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .context("Gateway server error")?;
        tracing::info!("Gateway stopped");
        Ok(())
    }
}

pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/message", post(handle_message))
        .route("/conversation/end", post(end_conversation))
        .route("/memories", get(list_memories))
        .merge(admin::routes())
        .layer(CorsLayer::permissive())
        .with_state(orchestrator)
}

// ============================================================================
// Route handlers
// ============================================================================

async fn health() -> &'static str {
    "ok"
}

async fn status(State(orchestrator): State<AppState>) -> Json<SystemStatus> {
    Json(orchestrator.get_system_status().await)
}

/// POST /message. Generation failures surface as the fallback reply,
/// so only a stopped runtime or an empty body is an error here.
async fn handle_message(
    State(orchestrator): State<AppState>,
    Json(req): Json<MessageRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if !orchestrator.is_running() {
        return Err(ApiError::unavailable("Ava is not running"));
    }
    let text = req.text.trim();
    if text.is_empty() {
        return Err(ApiError::bad_request("text must not be empty"));
    }
    let response = orchestrator.process_message(text).await;
    Ok(Json(MessageResponse { response }))
}

async fn end_conversation(State(orchestrator): State<AppState>) -> Json<EndConversationResponse> {
    let summary = orchestrator.end_conversation().await;
    Json(EndConversationResponse { summary })
}

async fn list_memories(
    State(orchestrator): State<AppState>,
    Query(query): Query<MemoriesQuery>,
) -> Result<Json<Vec<Memory>>, ApiError> {
    let memories = orchestrator
        .subsystems()
        .memory
        .get_memories(Some(query.into_filter()))
        .await
        .map_err(|e| {
            tracing::error!("Memory listing failed: {:#}", e);
            ApiError::internal(e)
        })?;
    Ok(Json(memories))
}
