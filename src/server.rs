//! HTTP front end for the chat pipeline
//!
//! ## Endpoints
//!
//! - `POST /chat` - Ask a question within a session
//! - `DELETE /sessions/:id` - Forget a session's history
//! - `GET /schema` - Schema text the pipeline works with
//! - `GET /health` - Liveness probe

use crate::agent::{ChatRequest, Pipeline, SessionStore};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use std::io;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};

pub const EMPTY_MESSAGE_REPLY: &str = "Please provide a message.";

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Pipeline,
    pub sessions: Arc<SessionStore>,
}

impl AppState {
    pub fn new(pipeline: Pipeline, max_sessions: usize) -> Self {
        let history_limit = pipeline.settings().history_limit;
        Self {
            pipeline,
            sessions: Arc::new(SessionStore::new(max_sessions, history_limit)),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub show_query: Option<bool>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ChatReply {
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthReply {
    pub status: String,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/sessions/:id", delete(clear_session))
        .route("/schema", get(schema))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn chat(State(state): State<AppState>, Json(body): Json<ChatBody>) -> impl IntoResponse {
    let message = body.message.unwrap_or_default();
    if message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ChatReply {
                response: EMPTY_MESSAGE_REPLY.to_string(),
                session_id: None,
            }),
        );
    }

    let session_id = body
        .session_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(SessionStore::new_session_id);
    let show_query = body
        .show_query
        .unwrap_or(state.pipeline.settings().show_query);

    // Held until the turn is stored so turns on one session never interleave
    let session = state.sessions.session(&session_id).await;
    let mut history = session.lock().await;
    debug!(
        "Session {} asks with {} history turns",
        session_id,
        history.len()
    );

    let result = state
        .pipeline
        .run(
            ChatRequest::new(message)
                .show_query(show_query)
                .history(history.clone()),
        )
        .await;
    if let Some(ref error) = result.error {
        warn!("Session {} turn failed: {}", session_id, error);
    }
    *history = result.chat_history;
    drop(history);

    (
        StatusCode::OK,
        Json(ChatReply {
            response: result.response,
            session_id: Some(session_id),
        }),
    )
}

async fn clear_session(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    if state.sessions.clear(&id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn schema(State(state): State<AppState>) -> String {
    state.pipeline.schema_prompt().to_string()
}

async fn health() -> Json<HealthReply> {
    Json(HealthReply {
        status: "ok".to_string(),
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutting down HTTP server");
}

/// Serve the router until Ctrl-C
pub async fn serve(state: AppState, bind_address: &str) -> io::Result<()> {
    let listener = TcpListener::bind(bind_address).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    println!("askdb server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}
