//! Client for a runnable served over HTTP.
//!
//! Four endpoints are supported under the runnable's base URL:
//! - `POST /invoke` — one input, one output
//! - `POST /batch` — many inputs, many outputs
//! - `POST /stream` — one input, an SSE stream of output chunks
//! - `POST /stream_log` — one input, an SSE stream of run log patches

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::builders::RemoteRunnableBuilder;
use crate::callbacks::{append_handler, LogStreamCallbackHandler};
use crate::error::{RemoteError, RemoteResult};
use crate::options::{
    split_call_options, BatchCallOptions, BatchOptions, CallOptions, RunnableConfig,
    StreamLogOptions,
};
use crate::types::{JsonMap, RunLogPatch};

use super::sse::{MetadataEvents, SseStream};
use super::transport::{HttpTransport, Transport, TransportConfig, TransportResponse};

/// Client for a remotely hosted runnable.
///
/// Generic per call over the input (`Serialize`) and output
/// (`DeserializeOwned`) types. Ask for [`crate::Revived`] to get the
/// reviver's reconstruction of whatever the server returned, for a domain
/// type such as [`crate::types::Message`] directly, or for
/// `serde_json::Value` to skip reviving.
///
/// The client holds only immutable configuration; concurrent calls on one
/// instance each use their own request.
///
/// # Example
///
/// ```no_run
/// use remote_runnable::{RemoteRunnable, Revived};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let chain = RemoteRunnable::new("http://localhost:8000/joke/");
///
/// let joke: Revived = chain.invoke(&serde_json::json!({"topic": "bears"}), None).await?;
/// println!("{:?}", joke);
///
/// let mut stream = chain
///     .stream::<_, Revived>(&serde_json::json!({"topic": "cats"}), None)
///     .await?;
/// while let Some(chunk) = stream.next().await {
///     println!("{:?}", chunk?);
/// }
/// # Ok(())
/// # }
/// ```
pub struct RemoteRunnable {
    transport: Box<dyn Transport>,
}

impl std::fmt::Debug for RemoteRunnable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteRunnable")
            .field("url", &self.transport.base_url())
            .finish_non_exhaustive()
    }
}

impl RemoteRunnable {
    /// Create a client for the runnable at `url` with default configuration
    /// (60 s timeout, no extra headers).
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_transport(Box::new(HttpTransport::new(url)))
    }

    /// Create a client with custom transport configuration.
    pub fn with_config(url: impl Into<String>, config: TransportConfig) -> Self {
        Self::with_transport(Box::new(HttpTransport::with_config(url, config)))
    }

    /// Create a client with a custom transport.
    pub fn with_transport(transport: Box<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Start building a client for `url`.
    pub fn builder(url: impl Into<String>) -> RemoteRunnableBuilder {
        RemoteRunnableBuilder::new(url)
    }

    /// The normalized base URL (no trailing slash).
    pub fn url(&self) -> &str {
        self.transport.base_url()
    }

    /// Run the remote runnable on one input (`POST /invoke`).
    pub async fn invoke<I, O>(&self, input: &I, options: Option<&CallOptions>) -> RemoteResult<O>
    where
        I: Serialize + ?Sized,
        O: DeserializeOwned,
    {
        let (config, kwargs) = split_call_options(options);
        let body = request_body(input, &config, kwargs)?;
        let response = self.post("/invoke", body).await?;
        let mut body = response.error_for_status().await?.json().await?;
        let output = take_output(&mut body, "/invoke")?;
        decode_output(output)
    }

    /// Run the remote runnable on many inputs in one request (`POST /batch`).
    ///
    /// `options` applies to every input ([`BatchCallOptions::Shared`]) or
    /// pairs with the inputs by position ([`BatchCallOptions::PerInput`]).
    /// `batch_options` is merged into every per-input config.
    ///
    /// # Errors
    ///
    /// Fails before any network call with [`RemoteError::Unsupported`] when
    /// `return_exceptions` is requested, and with
    /// [`RemoteError::InvalidOptions`] when a per-input list has the wrong
    /// length. A response without an `output` array is a
    /// [`RemoteError::Protocol`] error.
    pub async fn batch<I, O>(
        &self,
        inputs: &[I],
        options: Option<&BatchCallOptions>,
        batch_options: Option<&BatchOptions>,
    ) -> RemoteResult<Vec<O>>
    where
        I: Serialize,
        O: DeserializeOwned,
    {
        if batch_options.is_some_and(|b| b.return_exceptions) {
            return Err(RemoteError::unsupported(
                "returnExceptions is not supported for remote clients",
            ));
        }

        let per_input = options_per_input(options, inputs.len())?;
        let mut configs = Vec::with_capacity(inputs.len());
        let mut kwargs = Vec::with_capacity(inputs.len());
        for opts in &per_input {
            let (config, extra) = split_call_options(Some(opts));
            let mut config = config.to_wire()?;
            if let Some(batch_options) = batch_options {
                batch_options.merge_into(&mut config)?;
            }
            configs.push(Value::Object(config));
            kwargs.push(Value::Object(extra));
        }

        let mut body = JsonMap::new();
        body.insert("inputs".into(), serde_json::to_value(inputs)?);
        body.insert("config".into(), Value::Array(configs));
        body.insert("kwargs".into(), Value::Array(kwargs));

        let response = self.post("/batch", Value::Object(body)).await?;
        let mut body = response.error_for_status().await?.json().await?;
        let output = take_output(&mut body, "/batch")?;
        if !output.is_array() {
            return Err(RemoteError::protocol(
                "Invalid response from remote runnable: /batch output is not an array",
            ));
        }
        decode_output(output)
    }

    /// Stream output chunks for one input (`POST /stream`).
    ///
    /// The returned stream yields every event carrying data, in the order the
    /// server flushes them, and ends at the server's end event. That includes
    /// the run metadata (`{"run_id": ...}`) a server may send first, so ask
    /// for an output type that can hold it, such as [`crate::Revived`].
    ///
    /// # Errors
    ///
    /// A non-2xx response is [`RemoteError::Http`] carrying the status, the
    /// server's message and the raw body. A response without a body is
    /// [`RemoteError::Protocol`]. In both cases no stream is returned.
    pub async fn stream<I, O>(
        &self,
        input: &I,
        options: Option<&CallOptions>,
    ) -> RemoteResult<SseStream<O>>
    where
        I: Serialize + ?Sized,
        O: DeserializeOwned + Send + 'static,
    {
        let (config, kwargs) = split_call_options(options);
        let body = request_body(input, &config, kwargs)?;
        let response = self.post("/stream", body).await?;
        open_event_stream(
            response,
            MetadataEvents::Deliver,
            "Could not begin remote stream. Please check the given URL and try again.",
        )
        .await
    }

    /// Stream run log patches for one input (`POST /stream_log`).
    ///
    /// A [`LogStreamCallbackHandler`] is added to a copy of the call's
    /// callbacks; the caller's own callbacks are left untouched. Callbacks
    /// never leave the process, so the handler only lives for the duration
    /// of building the request. The server is always asked for full
    /// snapshots (`diff: false`). `metadata` events are skipped.
    pub async fn stream_log<I>(
        &self,
        input: &I,
        options: Option<&CallOptions>,
        stream_options: Option<&StreamLogOptions>,
    ) -> RemoteResult<SseStream<RunLogPatch>>
    where
        I: Serialize + ?Sized,
    {
        let stream_options = stream_options.cloned().unwrap_or_default();
        let (config, kwargs) = log_stream_config(options, &stream_options);
        let body = stream_log_body(input, &config, kwargs, &stream_options)?;
        let response = self.post("/stream_log", body).await?;
        open_event_stream(
            response,
            MetadataEvents::Skip,
            "Could not begin remote stream log. Please check the given URL and try again.",
        )
        .await
    }

    /// Close the client and release any held resources.
    pub async fn close(self) -> RemoteResult<()> {
        self.transport.close().await
    }

    async fn post(&self, path: &str, body: Value) -> RemoteResult<TransportResponse> {
        tracing::debug!("calling remote runnable {}{}", self.transport.base_url(), path);
        self.transport.post(path, &body).await
    }
}

// ──────────────────────────────────────────────────
// Internal helpers
// ──────────────────────────────────────────────────

/// `{input, config, kwargs}` with callbacks stripped from `config`.
fn request_body<I>(input: &I, config: &RunnableConfig, kwargs: JsonMap) -> RemoteResult<Value>
where
    I: Serialize + ?Sized,
{
    let mut body = JsonMap::new();
    body.insert("input".into(), serde_json::to_value(input)?);
    body.insert("config".into(), Value::Object(config.to_wire()?));
    body.insert("kwargs".into(), Value::Object(kwargs));
    Ok(Value::Object(body))
}

/// Split config and kwargs for `/stream_log`, with a log handler appended to
/// a copy of the caller's callbacks.
fn log_stream_config(
    options: Option<&CallOptions>,
    stream_options: &StreamLogOptions,
) -> (RunnableConfig, JsonMap) {
    let (mut config, kwargs) = split_call_options(options);
    let handler = Arc::new(LogStreamCallbackHandler::new(stream_options.clone(), false));
    config.callbacks = Some(append_handler(config.callbacks.as_ref(), handler));
    (config, kwargs)
}

/// `{input, config, kwargs}` plus the filters and `diff: false`.
fn stream_log_body<I>(
    input: &I,
    config: &RunnableConfig,
    kwargs: JsonMap,
    stream_options: &StreamLogOptions,
) -> RemoteResult<Value>
where
    I: Serialize + ?Sized,
{
    let mut body = match request_body(input, config, kwargs)? {
        Value::Object(body) => body,
        _ => JsonMap::new(),
    };
    body.extend(stream_options.to_wire()?);
    body.insert("diff".into(), Value::Bool(false));
    Ok(Value::Object(body))
}

fn options_per_input(
    options: Option<&BatchCallOptions>,
    len: usize,
) -> RemoteResult<Vec<CallOptions>> {
    match options {
        None => Ok(vec![CallOptions::default(); len]),
        Some(BatchCallOptions::Shared(options)) => Ok(vec![options.clone(); len]),
        Some(BatchCallOptions::PerInput(list)) if list.len() == len => Ok(list.clone()),
        Some(BatchCallOptions::PerInput(list)) => Err(RemoteError::invalid_options(format!(
            "passed {} options for {} inputs; options must be a single value or one per input",
            list.len(),
            len
        ))),
    }
}

fn take_output(body: &mut Value, endpoint: &str) -> RemoteResult<Value> {
    body.as_object_mut()
        .and_then(|obj| obj.remove("output"))
        .ok_or_else(|| {
            RemoteError::protocol(format!(
                "Invalid response from remote runnable: {endpoint} response has no output"
            ))
        })
}

fn decode_output<O: DeserializeOwned>(output: Value) -> RemoteResult<O> {
    serde_json::from_value(output)
        .map_err(|e| RemoteError::InvalidJson(format!("failed to decode output: {e}")))
}

async fn open_event_stream<T>(
    response: TransportResponse,
    metadata: MetadataEvents,
    missing_body: &str,
) -> RemoteResult<SseStream<T>>
where
    T: DeserializeOwned + Send + 'static,
{
    let response = response.error_for_status().await?;
    let body = response
        .into_body()
        .ok_or_else(|| RemoteError::protocol(missing_body))?;
    Ok(SseStream::with_metadata_events(body, metadata))
}
