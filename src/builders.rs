//! Builder for ergonomic construction of a [`RemoteRunnable`].
//!
//! [`RemoteRunnable`]: crate::client::RemoteRunnable

use std::collections::HashMap;
use std::time::Duration;

/// Builder for a [`crate::client::RemoteRunnable`].
///
/// # Example
///
/// ```
/// use remote_runnable::builders::RemoteRunnableBuilder;
/// use std::time::Duration;
///
/// let chain = RemoteRunnableBuilder::new("http://localhost:8000/chain/")
///     .with_timeout(Duration::from_secs(30))
///     .with_bearer_token("secret")
///     .build();
/// assert_eq!(chain.url(), "http://localhost:8000/chain");
/// ```
#[derive(Debug, Clone)]
pub struct RemoteRunnableBuilder {
    url: String,
    timeout: Option<Duration>,
    headers: HashMap<String, String>,
}

impl RemoteRunnableBuilder {
    /// Create a new builder for the runnable at `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: None,
            headers: HashMap::new(),
        }
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the per-request timeout in milliseconds.
    pub fn with_timeout_ms(self, timeout_ms: u64) -> Self {
        self.with_timeout(Duration::from_millis(timeout_ms))
    }

    /// Add a custom HTTP header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Add an Authorization header with a bearer token.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.headers.insert(
            "Authorization".to_string(),
            format!("Bearer {}", token.into()),
        );
        self
    }

    /// Add an API key header.
    pub fn with_api_key(
        mut self,
        header_name: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        self.headers.insert(header_name.into(), api_key.into());
        self
    }

    /// Build the client.
    #[cfg(feature = "client")]
    pub fn build(self) -> crate::client::RemoteRunnable {
        use crate::client::{RemoteRunnable, TransportConfig};

        let mut config = TransportConfig {
            headers: self.headers,
            ..TransportConfig::default()
        };
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        RemoteRunnable::with_config(self.url, config)
    }
}
