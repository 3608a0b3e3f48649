//! `invoke` against a live (fake) runnable host.

mod common;

use std::sync::Arc;

use common::{start_test_server, SpyTransport};
use remote_runnable::callbacks::CallbackHandler;
use remote_runnable::client::TransportResponse;
use remote_runnable::options::CallOptions;
use remote_runnable::types::{Message, MessageKind};
use remote_runnable::{RemoteError, RemoteRunnable, Revived};
use serde_json::{json, Value};

struct Recorder;

impl CallbackHandler for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }
}

#[tokio::test]
async fn invoke_returns_revived_message() {
    let (base_url, _log, _h) = start_test_server().await;
    let chain = RemoteRunnable::new(format!("{}/chat", base_url));

    let output: Revived = chain.invoke("hi", None).await.unwrap();
    let message = output.as_message().expect("output should revive to a message");
    assert_eq!(message.kind, MessageKind::Ai);
    assert_eq!(message.text(), "echo: hi");
}

#[tokio::test]
async fn invoke_decodes_into_a_domain_type() {
    let (base_url, _log, _h) = start_test_server().await;
    let chain = RemoteRunnable::new(format!("{}/chat", base_url));

    let message: Message = chain.invoke("typed", None).await.unwrap();
    assert_eq!(message.text(), "echo: typed");
    assert!(!message.chunk);
}

#[tokio::test]
async fn invoke_sends_split_config_and_kwargs() {
    let (base_url, log, _h) = start_test_server().await;
    let chain = RemoteRunnable::new(format!("{}/chat", base_url));

    let options = CallOptions::new()
        .with_tag("t1")
        .with_metadata("user", "u-1")
        .with_callbacks(vec![Arc::new(Recorder) as Arc<dyn CallbackHandler>])
        .with_extra("temperature", 0.5);
    let _: Revived = chain.invoke("hi", Some(&options)).await.unwrap();

    let request = log.last();
    assert_eq!(request.path, "/chat/invoke");
    assert_eq!(request.body["input"], "hi");
    assert_eq!(request.body["config"]["tags"], json!(["t1"]));
    assert_eq!(request.body["config"]["metadata"]["user"], "u-1");
    assert!(request.body["config"].get("callbacks").is_none());
    assert_eq!(request.body["kwargs"], json!({"temperature": 0.5}));
}

#[tokio::test]
async fn invoke_without_options_sends_empty_config_and_kwargs() {
    let (base_url, log, _h) = start_test_server().await;
    let chain = RemoteRunnable::new(format!("{}/chat", base_url));

    let _: Value = chain.invoke(&json!({"q": 1}), None).await.unwrap();

    let body = log.last().body;
    assert_eq!(body["input"], json!({"q": 1}));
    assert_eq!(body["config"], json!({}));
    assert_eq!(body["kwargs"], json!({}));
}

#[tokio::test]
async fn trailing_slash_is_not_doubled() {
    let (base_url, log, _h) = start_test_server().await;
    let chain = RemoteRunnable::new(format!("{}/chat/", base_url));

    let _: Revived = chain.invoke("hi", None).await.unwrap();
    assert_eq!(log.last().path, "/chat/invoke");
}

#[tokio::test]
async fn configured_headers_are_sent() {
    let (base_url, log, _h) = start_test_server().await;
    let chain = RemoteRunnable::builder(format!("{}/chat", base_url))
        .with_bearer_token("secret")
        .build();

    let _: Revived = chain.invoke("hi", None).await.unwrap();
    assert_eq!(log.last().authorization.as_deref(), Some("Bearer secret"));
}

#[tokio::test]
async fn invoke_without_output_is_protocol_error() {
    let (base_url, _log, _h) = start_test_server().await;
    let chain = RemoteRunnable::new(format!("{}/broken", base_url));

    let err = chain.invoke::<_, Revived>("hi", None).await.unwrap_err();
    assert!(matches!(err, RemoteError::Protocol(_)), "got {err:?}");
}

#[tokio::test]
async fn invoke_non_2xx_is_http_error() {
    let transport = SpyTransport::new(|_, _| {
        TransportResponse::from_bytes(422, r#"{"detail":"bad input"}"#)
    });
    let chain = RemoteRunnable::with_transport(Box::new(transport));

    let err = chain.invoke::<_, Revived>("hi", None).await.unwrap_err();
    match err {
        RemoteError::Http {
            status,
            message,
            body,
        } => {
            assert_eq!(status, 422);
            assert_eq!(message, "bad input");
            assert!(body.contains("detail"));
        }
        other => panic!("expected Http error, got {other:?}"),
    }
}

#[tokio::test]
async fn invoke_times_out() {
    let (base_url, _log, _h) = start_test_server().await;
    let chain = RemoteRunnable::builder(format!("{}/slow", base_url))
        .with_timeout_ms(100)
        .build();

    let err = chain.invoke::<_, Revived>("hi", None).await.unwrap_err();
    assert!(err.is_timeout(), "got {err:?}");
}

#[tokio::test]
async fn unreachable_host_is_transport_error() {
    // Port 9 (discard) is almost never listening on loopback.
    let chain = RemoteRunnable::new("http://127.0.0.1:9/chat");

    let err = chain.invoke::<_, Revived>("hi", None).await.unwrap_err();
    assert!(
        matches!(err, RemoteError::Transport(_) | RemoteError::Timeout(_)),
        "got {err:?}"
    );
}
