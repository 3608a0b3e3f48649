//! Error types for remote runnable calls.
//!
//! Every failure surfaces to the immediate caller; nothing here is retried.
//! The variants split along the lines a caller usually cares about:
//! - transport failures (connect, send, body read, timeout)
//! - HTTP-level rejections (non-2xx status, with the server message attached)
//! - protocol violations (a well-formed response missing what the endpoint owes)
//! - caller mistakes caught before any network call (unsupported modes, bad options)

// ---------------------------------------------------------------------------
// RemoteError enum
// ---------------------------------------------------------------------------

/// Unified error type for all remote runnable operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RemoteError {
    /// Transport-level error (connection failed, request failed, body read failed).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The per-request timeout fired, either before the response headers
    /// arrived or while a streamed body was being read.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Non-2xx HTTP response.
    #[error("RemoteRunnable call failed with status code {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// The server's `message` field if the body was JSON, otherwise the body text.
        message: String,
        /// Raw response body, attached for caller inspection.
        body: String,
    },

    /// A well-formed response that is missing something the endpoint must
    /// provide (an `output` field, a response body, a parseable event).
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// The caller asked for a mode the remote transport cannot honor.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// The caller's options cannot be applied to the given inputs.
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// Invalid JSON received from the remote (body or event payload).
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    /// The server reported an error as an event in the middle of a stream.
    #[error("Remote stream error {status}: {message}")]
    Server {
        /// Status code reported in the event payload (500 when absent).
        status: u16,
        /// Message reported in the event payload.
        message: String,
    },
}

/// Convenience result type for remote runnable operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

impl RemoteError {
    /// Create a `Protocol` error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Create an `Unsupported` error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    /// Create an `InvalidOptions` error.
    pub fn invalid_options(message: impl Into<String>) -> Self {
        Self::InvalidOptions(message.into())
    }

    /// Build an `Http` error from a status code and the raw body text.
    ///
    /// When the body is a JSON object carrying a string `message` (or
    /// `detail`, as some servers emit) that string becomes the error message;
    /// otherwise the body text itself is used.
    pub fn from_http_body(status: u16, body: String) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|value| {
                value
                    .get("message")
                    .or_else(|| value.get("detail"))
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| body.clone());
        Self::Http {
            status,
            message,
            body,
        }
    }

    /// Returns the HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Http { status, .. } | RemoteError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether this error came from the request timeout firing.
    pub fn is_timeout(&self) -> bool {
        matches!(self, RemoteError::Timeout(_))
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(err: serde_json::Error) -> Self {
        RemoteError::InvalidJson(err.to_string())
    }
}
