//! Shared test utilities for integration tests.
//!
//! [`start_test_server`] serves a fake runnable host with axum:
//!
//! - `/chat/*` — a well-behaved chat runnable that echoes its input as an AI message
//! - `/broken/*` — endpoints that answer with errors or malformed bodies
//! - `/empty/*` — streaming endpoints that answer 204 with no body
//! - `/slow/invoke` — sleeps past any short client timeout
//!
//! Every request is recorded so tests can assert on what went over the wire.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use remote_runnable::client::{Transport, TransportResponse};
use remote_runnable::RemoteResult;
use serde_json::{json, Value};

/// One request received by the fake server.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub authorization: Option<String>,
    pub body: Value,
}

/// Requests received by the fake server, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct RequestLog {
    inner: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl RequestLog {
    fn record(&self, path: &str, headers: &HeaderMap, body: &Value) {
        let authorization = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.inner.lock().unwrap().push(RecordedRequest {
            path: path.to_string(),
            authorization,
            body: body.clone(),
        });
    }

    pub fn all(&self) -> Vec<RecordedRequest> {
        self.inner.lock().unwrap().clone()
    }

    pub fn last(&self) -> RecordedRequest {
        self.inner
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no request recorded")
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}

/// Install a test-friendly tracing subscriber. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Start the fake runnable host on a random port.
///
/// Returns the server's base URL (no trailing slash), the request log and
/// the server task handle.
pub async fn start_test_server() -> (String, RequestLog, tokio::task::JoinHandle<()>) {
    init_tracing();

    let log = RequestLog::default();
    let app = Router::new()
        .route("/chat/invoke", post(chat_invoke))
        .route("/chat/batch", post(chat_batch))
        .route("/chat/stream", post(chat_stream))
        .route("/chat/stream_log", post(chat_stream_log))
        .route("/broken/invoke", post(broken_invoke))
        .route("/broken/batch", post(broken_batch))
        .route("/broken/stream", post(broken_stream))
        .route("/broken/stream_log", post(broken_stream_log))
        .route("/empty/stream", post(empty_stream))
        .route("/empty/stream_log", post(empty_stream))
        .route("/slow/invoke", post(slow_invoke))
        .with_state(log.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{}", addr);

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Brief wait for the server to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (base_url, log, handle)
}

// ---------------------------------------------------------------------------
// Canned payloads
// ---------------------------------------------------------------------------

/// The AI message the chat runnable answers `input` with.
pub fn echo_message(input: &Value) -> Value {
    let text = match input {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    json!({
        "content": format!("echo: {}", text),
        "type": "ai",
        "additional_kwargs": {},
    })
}

fn ai_chunk(content: &str) -> Value {
    json!({
        "content": content,
        "type": "AIMessageChunk",
        "additional_kwargs": {},
    })
}

/// Format one Server-Sent Event.
pub fn sse_event(event: &str, data: &Value) -> String {
    format!("event: {}\ndata: {}\n\n", event, data)
}

fn event_stream(body: String) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/event-stream")],
        body,
    )
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn chat_invoke(
    State(log): State<RequestLog>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    log.record("/chat/invoke", &headers, &body);
    Json(json!({
        "output": echo_message(&body["input"]),
        "metadata": {"run_id": "00000000-0000-0000-0000-000000000001"},
    }))
}

async fn chat_batch(
    State(log): State<RequestLog>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    log.record("/chat/batch", &headers, &body);
    let outputs: Vec<Value> = body["inputs"]
        .as_array()
        .map(|inputs| inputs.iter().map(echo_message).collect())
        .unwrap_or_default();
    Json(json!({ "output": outputs, "metadata": {} }))
}

async fn chat_stream(
    State(log): State<RequestLog>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    log.record("/chat/stream", &headers, &body);
    let mut sse = sse_event("metadata", &json!({"run_id": "r-1"}));
    for piece in ["Hel", "lo", "!"] {
        sse.push_str(&sse_event("data", &ai_chunk(piece)));
    }
    sse.push_str("event: end\n\n");
    event_stream(sse)
}

async fn chat_stream_log(
    State(log): State<RequestLog>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    log.record("/chat/stream_log", &headers, &body);
    let patches = [
        json!({"ops": [{
            "op": "replace",
            "path": "",
            "value": {"id": "r-1", "streamed_output": [], "final_output": null, "logs": {}},
        }]}),
        json!({"ops": [{
            "op": "add",
            "path": "/streamed_output/-",
            "value": ai_chunk("Hi"),
        }]}),
        json!({"ops": [{
            "op": "replace",
            "path": "/final_output",
            "value": {"output": echo_message(&body["input"])},
        }]}),
    ];
    let mut sse = sse_event("metadata", &json!({"run_id": "r-1"}));
    for patch in &patches {
        sse.push_str(&sse_event("data", patch));
    }
    sse.push_str("event: end\n\n");
    event_stream(sse)
}

async fn broken_invoke(
    State(log): State<RequestLog>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    log.record("/broken/invoke", &headers, &body);
    Json(json!({ "metadata": {} }))
}

async fn broken_batch(
    State(log): State<RequestLog>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    log.record("/broken/batch", &headers, &body);
    Json(json!({ "output": {"not": "an array"} }))
}

async fn broken_stream(
    State(log): State<RequestLog>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    log.record("/broken/stream", &headers, &body);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"message": "boom"})),
    )
}

async fn broken_stream_log(
    State(log): State<RequestLog>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    log.record("/broken/stream_log", &headers, &body);
    let mut sse = sse_event(
        "data",
        &json!({"ops": [{"op": "add", "path": "/logs/a", "value": 1}]}),
    );
    sse.push_str(&sse_event(
        "error",
        &json!({"status_code": 503, "message": "model overloaded"}),
    ));
    event_stream(sse)
}

async fn empty_stream(
    State(log): State<RequestLog>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    log.record("/empty/stream", &headers, &body);
    StatusCode::NO_CONTENT
}

async fn slow_invoke(
    State(log): State<RequestLog>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    log.record("/slow/invoke", &headers, &body);
    tokio::time::sleep(Duration::from_secs(2)).await;
    Json(json!({ "output": "too late" }))
}

// ---------------------------------------------------------------------------
// Spy transport
// ---------------------------------------------------------------------------

type Responder = dyn Fn(&str, &Value) -> TransportResponse + Send + Sync;

/// A [`Transport`] that records every call and answers from a closure,
/// without touching the network.
pub struct SpyTransport {
    base_url: String,
    calls: Arc<Mutex<Vec<(String, Value)>>>,
    respond: Box<Responder>,
}

impl SpyTransport {
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(&str, &Value) -> TransportResponse + Send + Sync + 'static,
    {
        Self {
            base_url: "http://spy".to_string(),
            calls: Arc::new(Mutex::new(Vec::new())),
            respond: Box::new(respond),
        }
    }

    /// A handle to the recorded `(path, body)` pairs that outlives the
    /// transport once it has been moved into a client.
    pub fn calls(&self) -> Arc<Mutex<Vec<(String, Value)>>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Transport for SpyTransport {
    async fn post(&self, path: &str, body: &Value) -> RemoteResult<TransportResponse> {
        self.calls
            .lock()
            .unwrap()
            .push((path.to_string(), body.clone()));
        Ok((self.respond)(path, body))
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}
