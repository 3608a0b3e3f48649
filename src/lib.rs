//! # remote-runnable — Rust client for runnables served over HTTP
//!
//! This crate calls a runnable (a chain, model or agent) that a server
//! exposes under a base URL with four JSON endpoints:
//!
//! - `POST {url}/invoke` — one input, one output
//! - `POST {url}/batch` — many inputs, one output per input
//! - `POST {url}/stream` — output chunks as Server-Sent Events
//! - `POST {url}/stream_log` — run log patches as Server-Sent Events
//!
//! Responses are rebuilt into structured values by a structural reviver
//! ([`revive`]) that recognizes documents, messages, generations, agent
//! steps, LLM results and prompt values by the fields they carry.
//!
//! ## Feature flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `client` | yes     | HTTP client for calling remote runnables (reqwest + SSE) |
//! | `full`   | no      | Enable all features |
//!
//! ## Quick Start
//!
//! ```no_run
//! use remote_runnable::options::CallOptions;
//! use remote_runnable::{RemoteRunnable, Revived};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let chain = RemoteRunnable::builder("http://localhost:8000/chain")
//!         .with_timeout_ms(30_000)
//!         .build();
//!
//!     // One call
//!     let options = CallOptions::new().with_tag("docs");
//!     let output: Revived = chain.invoke("What is Rust?", Some(&options)).await?;
//!     if let Some(message) = output.as_message() {
//!         println!("{}", message.text());
//!     }
//!
//!     // Many inputs
//!     let outputs: Vec<Revived> = chain.batch(&["a", "b"], None, None).await?;
//!     println!("{} outputs", outputs.len());
//!
//!     // Streamed chunks
//!     let mut stream = chain.stream::<_, Revived>("Tell me a story", None).await?;
//!     while let Some(chunk) = stream.next().await {
//!         println!("{:?}", chunk?);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`client::RemoteRunnable`] — `invoke`, `batch`, `stream` and `stream_log`
//! - [`client::Transport`] — pluggable POST transport, [`client::HttpTransport`] by default
//! - [`client::SseStream`] — decoded Server-Sent Events
//! - [`revive`] / [`Revived`] — structural JSON reviver
//! - [`options`] — call options, config splitting and batch options
//! - [`callbacks`] — callback handlers attached to a call
//! - [`types`] — documents, messages, generations, prompt values and log patches

pub mod builders;
pub mod callbacks;
pub mod error;
pub mod options;
pub mod revive;
pub mod types;

#[cfg(feature = "client")]
pub mod client;

pub use error::{RemoteError, RemoteResult};
pub use revive::{revive, Revived};

pub use builders::RemoteRunnableBuilder;

#[cfg(feature = "client")]
pub use client::RemoteRunnable;

/// Commonly used types, for glob import.
pub mod prelude {
    pub use crate::callbacks::{CallbackHandler, CallbackManager, Callbacks};
    pub use crate::error::{RemoteError, RemoteResult};
    pub use crate::options::{
        BatchCallOptions, BatchOptions, CallOptions, RunnableConfig, StreamLogOptions,
    };
    pub use crate::revive::{revive, Revived};
    pub use crate::types::{
        AgentAction, AgentFinish, ChatGeneration, Document, Generation, LlmResult, Message,
        MessageKind, PatchOperation, PromptValue, RunLogPatch,
    };

    #[cfg(feature = "client")]
    pub use crate::client::{RemoteRunnable, SseStream};
}
