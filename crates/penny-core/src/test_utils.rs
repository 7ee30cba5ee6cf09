//! Test utilities for penny-core
//!
//! Provides an in-process mock model server speaking both the
//! OpenAI-compatible chat completions API and the Ollama generate API, so
//! gateway and engine tests can exercise real HTTP without a model.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::sync::oneshot;

/// What the mock server answers with
#[derive(Debug, Clone)]
pub enum MockReply {
    /// A well-formed completion with this text
    Text(String),
    /// A non-2xx status with this body
    Status(u16, String),
    /// A 200 response whose body is this raw string
    Raw(String),
}

impl MockReply {
    pub fn text(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

struct ServerState {
    reply: Mutex<MockReply>,
    delay: Duration,
    requests: Mutex<Vec<Value>>,
}

/// Mock model server for tests
pub struct MockModelServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockModelServer {
    /// Start the mock server on an available port
    pub async fn start(reply: MockReply) -> Self {
        Self::start_with_delay(reply, Duration::ZERO).await
    }

    /// Start a server that waits `delay` before answering each generation
    pub async fn start_with_delay(reply: MockReply, delay: Duration) -> Self {
        let state = Arc::new(ServerState {
            reply: Mutex::new(reply),
            delay,
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/v1/chat/completions", post(handle_chat_completion))
            .route("/v1/models", get(handle_models))
            .route("/api/generate", post(handle_generate))
            .route("/api/tags", get(handle_tags))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Replace the reply for subsequent requests
    pub fn set_reply(&self, reply: MockReply) {
        *self.state.reply.lock().unwrap() = reply;
    }

    /// Number of generation requests received
    pub fn request_count(&self) -> usize {
        self.state.requests.lock().unwrap().len()
    }

    /// Body of the most recent generation request
    pub fn last_request(&self) -> Option<Value> {
        self.state.requests.lock().unwrap().last().cloned()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockModelServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Record the request, wait, and hand back the configured reply
async fn next_reply(state: &ServerState, body: Value) -> MockReply {
    state.requests.lock().unwrap().push(body);
    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }
    state.reply.lock().unwrap().clone()
}

fn non_text_response(reply: MockReply) -> Response {
    match reply {
        MockReply::Status(code, body) => (
            StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body,
        )
            .into_response(),
        MockReply::Raw(body) => {
            ([(header::CONTENT_TYPE, "application/json")], body).into_response()
        }
        MockReply::Text(text) => text.into_response(),
    }
}

/// OpenAI-compatible chat completions endpoint
async fn handle_chat_completion(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<Value>,
) -> Response {
    let model = body["model"].as_str().unwrap_or("mock").to_string();
    match next_reply(&state, body).await {
        MockReply::Text(text) => Json(json!({
            "id": "chatcmpl-mock",
            "object": "chat.completion",
            "model": model,
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": text },
                "finish_reason": "stop"
            }]
        }))
        .into_response(),
        other => non_text_response(other),
    }
}

/// Ollama generate endpoint
async fn handle_generate(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<Value>,
) -> Response {
    let model = body["model"].as_str().unwrap_or("mock").to_string();
    match next_reply(&state, body).await {
        MockReply::Text(text) => Json(json!({
            "model": model,
            "response": text,
            "done": true
        }))
        .into_response(),
        other => non_text_response(other),
    }
}

/// OpenAI-compatible models endpoint (health check)
async fn handle_models() -> Json<Value> {
    Json(json!({ "object": "list", "data": [{ "id": "mock-model", "object": "model" }] }))
}

/// Ollama tags endpoint (health check)
async fn handle_tags() -> Json<Value> {
    Json(json!({ "models": [{ "name": "llama3.2:latest", "size": 4_000_000_000u64 }] }))
}
