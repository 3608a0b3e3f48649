//! Remote runnable client — call runnables served over HTTP.
//!
//! - [`RemoteRunnable`] — `invoke`, `batch`, `stream` and `stream_log`
//! - [`Transport`] / [`HttpTransport`] — pluggable transport layer
//! - [`SseStream`] / [`SseParser`] — server-sent event parsing for the
//!   streaming endpoints
//!
//! # Quick Start
//!
//! ```no_run
//! use remote_runnable::client::RemoteRunnable;
//! use remote_runnable::Revived;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let chain = RemoteRunnable::new("http://localhost:8000/chain");
//!
//! let output: Revived = chain.invoke("tell me a joke", None).await?;
//! println!("{:?}", output);
//!
//! let mut log = chain.stream_log("tell me a joke", None, None).await?;
//! while let Some(patch) = log.next().await {
//!     for op in patch?.ops {
//!         println!("{}", op.path());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod remote_runnable;
mod sse;
mod transport;

pub use remote_runnable::RemoteRunnable;
pub use sse::{EventSourceMessage, MetadataEvents, SseParser, SseStream};
pub use transport::{
    ByteStream, HttpTransport, Transport, TransportConfig, TransportResponse, DEFAULT_TIMEOUT_MS,
};
