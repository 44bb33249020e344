//! HTTP transports: streamable HTTP on `POST /mcp` (JSON responses, no
//! sessions) and the legacy SSE pair `GET /sse` + `POST /message`.

use std::{
    collections::HashMap,
    convert::Infallible,
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use {
    axum::{
        Router,
        extract::{Query, State},
        http::StatusCode,
        response::{
            IntoResponse, Json, Response,
            sse::{Event, KeepAlive, Sse},
        },
        routing::{get, post},
    },
    futures::{Stream, StreamExt, stream},
    serde::Deserialize,
    serde_json::json,
    tokio::{net::TcpListener, sync::mpsc},
    tower_http::{
        cors::{Any, CorsLayer},
        limit::RequestBodyLimitLayer,
        trace::TraceLayer,
    },
    tracing::{debug, info, warn},
};

use crate::{
    error::{Context, Result},
    server::McpServer,
    types::{JsonRpcError, JsonRpcResponse},
};

/// Largest accepted JSON-RPC body.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Error code the SSE transport uses for requests naming no live session.
pub const UNKNOWN_SESSION: i64 = -32000;

/// Queued responses per SSE session before senders wait.
const SESSION_BUFFER: usize = 32;

type Sessions = Arc<Mutex<HashMap<String, mpsc::Sender<JsonRpcResponse>>>>;

#[derive(Clone)]
struct AppState {
    server: Arc<McpServer>,
    sessions: Sessions,
}

impl AppState {
    fn session_count(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or_default()
    }

    fn session(&self, id: &str) -> Option<mpsc::Sender<JsonRpcResponse>> {
        self.sessions.lock().ok()?.get(id).cloned()
    }
}

/// Build the MCP router (shared between production startup and tests).
pub fn build_router(server: Arc<McpServer>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let state = AppState {
        server,
        sessions: Arc::default(),
    };

    Router::new()
        .route("/", get(info_handler))
        .route("/health", get(health_handler))
        .route("/mcp", post(mcp_handler))
        .route("/sse", get(sse_handler))
        .route("/message", post(message_handler))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve MCP over HTTP until the process is stopped.
pub async fn serve(server: Arc<McpServer>, addr: SocketAddr) -> Result<()> {
    let tools = server.tool_count();
    let app = build_router(server);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, tools, "MCP server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn info_handler(State(state): State<AppState>) -> impl IntoResponse {
    let info = state.server.info();
    Json(json!({
        "name": info.name,
        "title": info.title,
        "version": info.version,
        "endpoints": {
            "mcp": "/mcp",
            "sse": "/sse",
            "message": "/message",
        },
        "tools": state.server.tool_count(),
        "activeConnections": state.session_count(),
    }))
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn mcp_handler(State(state): State<AppState>, body: String) -> Response {
    match state.server.handle_raw(&body).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// Removes its session from the table when the SSE stream is dropped.
struct SessionGuard {
    id: String,
    sessions: Sessions,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.remove(&self.id);
        }
        debug!(session = %self.id, "SSE session closed");
    }
}

async fn sse_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let id = uuid::Uuid::new_v4().to_string();
    let (tx, rx) = mpsc::channel(SESSION_BUFFER);
    if let Ok(mut sessions) = state.sessions.lock() {
        sessions.insert(id.clone(), tx);
    }
    info!(session = %id, "SSE session opened");

    let endpoint = Event::default()
        .event("endpoint")
        .data(format!("/message?sessionId={id}"));
    let guard = SessionGuard {
        id,
        sessions: Arc::clone(&state.sessions),
    };

    let messages = stream::unfold((rx, guard), |(mut rx, guard)| async move {
        loop {
            let response = rx.recv().await?;
            match serde_json::to_string(&response) {
                Ok(data) => {
                    let event = Event::default().event("message").data(data);
                    return Some((Ok(event), (rx, guard)));
                },
                Err(e) => warn!(session = %guard.id, error = %e, "dropping unserializable response"),
            }
        }
    });

    Sse::new(stream::once(async move { Ok(endpoint) }).chain(messages))
        .keep_alive(KeepAlive::default())
}

#[derive(Deserialize)]
struct MessageQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

async fn message_handler(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
    body: String,
) -> Response {
    let Some(sender) = query.session_id.as_deref().and_then(|id| state.session(id)) else {
        let error = JsonRpcResponse::failure(
            serde_json::Value::Null,
            JsonRpcError::new(UNKNOWN_SESSION, "Bad Request: Unknown or missing MCP session"),
        );
        return (StatusCode::BAD_REQUEST, Json(error)).into_response();
    };

    let Some(response) = state.server.handle_raw(&body).await else {
        return StatusCode::ACCEPTED.into_response();
    };
    if sender.send(response).await.is_err() {
        warn!("SSE session closed before the response was delivered");
        return StatusCode::GONE.into_response();
    }
    StatusCode::ACCEPTED.into_response()
}
