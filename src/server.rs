//! HTTP/SSE surface for the chat proxy.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::sse::{Event as SseEvent, Sse};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::Stream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::client::CompletionClient;
use crate::config::Config;
use crate::models::{ChatMessage, TurnFrame};
use crate::orchestrator::Orchestrator;
use crate::tools::ToolRegistry;

// === Types ===

#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<Orchestrator>,
}

impl AppState {
    #[must_use]
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct ChatStreamRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    message: &'static str,
}

// === Server ===

pub async fn run(config: Config, options: ServerOptions) -> Result<()> {
    let client = Arc::new(CompletionClient::new(&config)?);
    let registry = Arc::new(ToolRegistry::with_defaults());
    let orchestrator = Arc::new(Orchestrator::new(client, registry, config.pacing()));
    let state = AppState::new(orchestrator);
    let app = build_router(state, &config.static_dir());

    let addr: SocketAddr = format!("{}:{}", options.host, options.port)
        .parse()
        .with_context(|| format!("Invalid bind address '{}:{}'", options.host, options.port))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    println!("{}", "=".repeat(60));
    println!("MiniMax chat proxy listening on http://{addr}");
    println!("Health check: http://{addr}/api/health");
    println!("{}", "=".repeat(60));

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow!("Server error: {e}"))
}

pub fn build_router(state: AppState, static_dir: &Path) -> Router {
    Router::new()
        .route("/", get(index_redirect))
        .route("/api/health", get(health))
        .route("/api/chat/stream", post(chat_stream))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(cors_layer())
        .with_state(state)
}

// === Handlers ===

async fn index_redirect() -> Redirect {
    Redirect::temporary("/static/index.html")
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        message: "MiniMax chat proxy running",
    })
}

/// Streamed chat endpoint with tool-calling orchestration.
///
/// Validation happens before any stream is opened; past that point every
/// outcome is delivered in-band as SSE frames.
async fn chat_stream(
    State(state): State<AppState>,
    Json(request): Json<ChatStreamRequest>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    if request.messages.is_empty() {
        return Err(ApiError::bad_request("messages must not be empty"));
    }

    let frames = state.orchestrator.spawn_turn(request.messages);
    let stream = ReceiverStream::new(frames).map(|frame| Ok(frame_to_sse(frame)));
    Ok(Sse::new(stream))
}

/// Serialize one turn frame into its wire shape.
///
/// Success events are JSON; the terminal marker is the literal `[DONE]`;
/// the error frame is plain text. The asymmetry matches the upstream
/// service contract and is intentional.
fn frame_to_sse(frame: TurnFrame) -> SseEvent {
    match frame {
        TurnFrame::Event(event) => {
            let data = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
            SseEvent::default().data(data)
        }
        TurnFrame::Done => SseEvent::default().data("[DONE]"),
        TurnFrame::Error(message) => SseEvent::default().data(format!("错误: {message}")),
    }
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

// === Errors ===

#[derive(Debug, Clone)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({"error": self.message}))).into_response()
    }
}
