//! Transport layer for remote runnable calls.
//!
//! Provides the [`Transport`] trait for abstracting over how a JSON body is
//! POSTed to a runnable endpoint, and [`HttpTransport`], the reqwest-backed
//! implementation used by default.

use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde_json::Value;

use crate::error::{RemoteError, RemoteResult};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// A response body delivered as a stream of byte chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = RemoteResult<Bytes>> + Send>>;

/// Transport abstraction for remote runnable communication.
///
/// Implementations POST a JSON body to `base_url + path` and hand back the
/// raw response without judging its status; callers decide what a non-2xx
/// status means for their endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `body` as JSON to the endpoint at `path` (e.g. `"/invoke"`).
    async fn post(&self, path: &str, body: &Value) -> RemoteResult<TransportResponse>;

    /// The normalized base URL requests are sent under.
    fn base_url(&self) -> &str;

    /// Close the transport and release any held resources.
    ///
    /// The default implementation is a no-op.
    async fn close(&self) -> RemoteResult<()> {
        Ok(())
    }
}

/// A raw response: status code plus an optional streamed body.
pub struct TransportResponse {
    status: u16,
    body: Option<ByteStream>,
}

impl TransportResponse {
    /// Create a response from a status and an optional body stream.
    pub fn new(status: u16, body: Option<ByteStream>) -> Self {
        Self { status, body }
    }

    /// Create a response whose body arrives in the given chunks, in order.
    pub fn from_chunks<I, B>(status: u16, chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        let chunks: Vec<RemoteResult<Bytes>> = chunks.into_iter().map(|c| Ok(c.into())).collect();
        Self::new(status, Some(Box::pin(stream::iter(chunks))))
    }

    /// Create a response with a single-chunk body.
    pub fn from_bytes(status: u16, body: impl Into<Bytes>) -> Self {
        Self::from_chunks(status, [body.into()])
    }

    /// HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether a body is present.
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// Take the body stream.
    pub fn into_body(self) -> Option<ByteStream> {
        self.body
    }

    /// Read the whole body. A missing body reads as empty.
    pub async fn bytes(self) -> RemoteResult<Bytes> {
        let Some(mut body) = self.body else {
            return Ok(Bytes::new());
        };
        let mut buf = BytesMut::new();
        while let Some(chunk) = body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }

    /// Read the whole body as (lossy) UTF-8 text.
    pub async fn text(self) -> RemoteResult<String> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read the whole body and parse it as JSON.
    pub async fn json(self) -> RemoteResult<Value> {
        let bytes = self.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| RemoteError::InvalidJson(format!("failed to parse response body: {e}")))
    }

    /// Turn a non-2xx response into an [`RemoteError::Http`], reading the
    /// body for the server's message. 2xx responses pass through.
    pub async fn error_for_status(self) -> RemoteResult<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let status = self.status;
        let body = self.text().await.unwrap_or_default();
        Err(RemoteError::from_http_body(status, body))
    }
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// Configuration for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Per-request timeout, covering the streamed body too. Defaults to 60 seconds.
    pub timeout: Duration,
    /// Additional HTTP headers to include on every request.
    pub headers: HashMap<String, String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            headers: HashMap::new(),
        }
    }
}

/// JSON over HTTP transport using `reqwest`.
///
/// Every request carries `Content-Type: application/json` merged with the
/// configured headers (configured headers win) and is bound to the
/// configured timeout. When the timeout fires the in-flight request, or the
/// body being streamed, is aborted and reported as [`RemoteError::Timeout`].
///
/// # Example
///
/// ```
/// use remote_runnable::client::{HttpTransport, Transport};
///
/// let transport = HttpTransport::new("http://localhost:8000/chain/");
/// assert_eq!(transport.base_url(), "http://localhost:8000/chain");
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    headers: HeaderMap,
    timeout: Duration,
}

impl HttpTransport {
    /// Create a transport for the given base URL with default configuration.
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_config(url, TransportConfig::default())
    }

    /// Create a transport with custom configuration.
    pub fn with_config(url: impl Into<String>, config: TransportConfig) -> Self {
        Self::with_client(url, reqwest::Client::new(), config)
    }

    /// Create a transport with an existing `reqwest::Client`.
    ///
    /// Useful to share a connection pool or configure TLS externally.
    pub fn with_client(
        url: impl Into<String>,
        client: reqwest::Client,
        config: TransportConfig,
    ) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (key, value) in &config.headers {
            match (
                HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(val)) => {
                    headers.insert(name, val);
                }
                _ => tracing::warn!("skipping invalid header {key:?}"),
            }
        }

        Self {
            client,
            base_url: normalize_base_url(url.into()),
            headers,
            timeout: config.timeout,
        }
    }

    /// The per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The headers sent with every request.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

/// Strip a single trailing slash so `base + "/invoke"` never doubles up.
fn normalize_base_url(url: String) -> String {
    match url.strip_suffix('/') {
        Some(stripped) => stripped.to_string(),
        None => url,
    }
}

fn map_reqwest_error(err: reqwest::Error, context: &str) -> RemoteError {
    if err.is_timeout() {
        RemoteError::Timeout(format!("{context} timed out: {err}"))
    } else if err.is_connect() {
        RemoteError::Transport(format!("{context}: connection failed: {err}"))
    } else {
        RemoteError::Transport(format!("{context} failed: {err}"))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, path: &str, body: &Value) -> RemoteResult<TransportResponse> {
        let url = format!("{}{}", self.base_url, path);
        let payload = serde_json::to_vec(body)
            .map_err(|e| RemoteError::Transport(format!("failed to serialize request: {e}")))?;

        tracing::debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .headers(self.headers.clone())
            .timeout(self.timeout)
            .body(payload)
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, "request"))?;

        let status = response.status().as_u16();
        // A 204 or an explicit zero length means there is nothing to stream.
        if status == 204 || response.content_length() == Some(0) {
            return Ok(TransportResponse::new(status, None));
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| map_reqwest_error(e, "reading response body")));
        Ok(TransportResponse::new(status, Some(Box::pin(body))))
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}
