//! `batch` against a live (fake) runnable host and a spy transport.

mod common;

use common::{start_test_server, SpyTransport};
use remote_runnable::client::TransportResponse;
use remote_runnable::options::{BatchCallOptions, BatchOptions, CallOptions};
use remote_runnable::types::Message;
use remote_runnable::{RemoteError, RemoteRunnable, Revived};
use serde_json::json;

#[tokio::test]
async fn batch_returns_outputs_in_input_order() {
    let (base_url, _log, _h) = start_test_server().await;
    let chain = RemoteRunnable::new(format!("{}/chat", base_url));

    let outputs: Vec<Message> = chain.batch(&["a", "b", "c"], None, None).await.unwrap();
    let texts: Vec<String> = outputs.iter().map(Message::text).collect();
    assert_eq!(texts, vec!["echo: a", "echo: b", "echo: c"]);
}

#[tokio::test]
async fn shared_options_are_repeated_per_input() {
    let (base_url, log, _h) = start_test_server().await;
    let chain = RemoteRunnable::new(format!("{}/chat", base_url));

    let options = BatchCallOptions::from(CallOptions::new().with_tag("x").with_extra("k", 1));
    let _: Vec<Revived> = chain
        .batch(&["a", "b"], Some(&options), None)
        .await
        .unwrap();

    let body = log.last().body;
    assert_eq!(body["inputs"], json!(["a", "b"]));
    assert_eq!(body["config"], json!([{"tags": ["x"]}, {"tags": ["x"]}]));
    assert_eq!(body["kwargs"], json!([{"k": 1}, {"k": 1}]));
}

#[tokio::test]
async fn per_input_options_pair_by_position() {
    let (base_url, log, _h) = start_test_server().await;
    let chain = RemoteRunnable::new(format!("{}/chat", base_url));

    let options = BatchCallOptions::from(vec![
        CallOptions::new().with_tag("first"),
        CallOptions::new().with_tag("second"),
    ]);
    let batch_options = BatchOptions {
        max_concurrency: Some(2),
        ..BatchOptions::default()
    };
    let _: Vec<Revived> = chain
        .batch(&["a", "b"], Some(&options), Some(&batch_options))
        .await
        .unwrap();

    let body = log.last().body;
    assert_eq!(
        body["config"],
        json!([
            {"tags": ["first"], "max_concurrency": 2},
            {"tags": ["second"], "max_concurrency": 2},
        ])
    );
}

#[tokio::test]
async fn empty_batch_round_trips() {
    let (base_url, log, _h) = start_test_server().await;
    let chain = RemoteRunnable::new(format!("{}/chat", base_url));

    let inputs: [&str; 0] = [];
    let outputs: Vec<Revived> = chain.batch(&inputs, None, None).await.unwrap();
    assert!(outputs.is_empty());
    assert_eq!(log.last().body["inputs"], json!([]));
}

#[tokio::test]
async fn return_exceptions_is_rejected_before_any_request() {
    let transport = SpyTransport::new(|_, _| TransportResponse::from_bytes(200, "{}"));
    let calls = transport.calls();
    let chain = RemoteRunnable::with_transport(Box::new(transport));

    let batch_options = BatchOptions {
        return_exceptions: true,
        ..BatchOptions::default()
    };
    let err = chain
        .batch::<_, Revived>(&["a"], None, Some(&batch_options))
        .await
        .unwrap_err();

    match err {
        RemoteError::Unsupported(message) => {
            assert_eq!(message, "returnExceptions is not supported for remote clients")
        }
        other => panic!("expected Unsupported, got {other:?}"),
    }
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn mismatched_per_input_options_are_rejected_before_any_request() {
    let transport = SpyTransport::new(|_, _| TransportResponse::from_bytes(200, "{}"));
    let calls = transport.calls();
    let chain = RemoteRunnable::with_transport(Box::new(transport));

    let options = BatchCallOptions::from(vec![CallOptions::new()]);
    let err = chain
        .batch::<_, Revived>(&["a", "b"], Some(&options), None)
        .await
        .unwrap_err();

    assert!(matches!(err, RemoteError::InvalidOptions(_)), "got {err:?}");
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn non_array_output_is_protocol_error() {
    let (base_url, _log, _h) = start_test_server().await;
    let chain = RemoteRunnable::new(format!("{}/broken", base_url));

    let err = chain
        .batch::<_, Revived>(&["a"], None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Protocol(_)), "got {err:?}");
}

#[tokio::test]
async fn batch_posts_to_batch_endpoint() {
    let transport = SpyTransport::new(|_, _| {
        TransportResponse::from_bytes(200, r#"{"output": [1, 2]}"#)
    });
    let calls = transport.calls();
    let chain = RemoteRunnable::with_transport(Box::new(transport));

    let outputs: Vec<i64> = chain.batch(&[1, 2], None, None).await.unwrap();
    assert_eq!(outputs, vec![1, 2]);

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "/batch");
}
