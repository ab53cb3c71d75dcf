//! One-shot calls through the callback, async, raw and reactive facades.

mod support;

use std::sync::{Arc, Mutex};

use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use siumai_exec::prelude::*;
use support::{MockTransport, Reply, client, get, post, settle};
use tokio::sync::oneshot;

#[derive(Debug, Deserialize, PartialEq)]
struct Model {
    id: String,
}

#[tokio::test]
async fn async_facade_decodes_success() {
    let client = client(MockTransport::single(Reply::json(200, r#"{"id":"abc"}"#)));
    let model: Model = client
        .perform_async(get(&client, "/models/abc"))
        .await
        .unwrap();
    assert_eq!(model.id, "abc");
}

#[tokio::test]
async fn non_2xx_is_api_error_with_status() {
    let client = client(MockTransport::single(Reply::json(404, r#"{"error":"not_found"}"#)));
    let err = client
        .perform_async::<Model>(get(&client, "/models/missing"))
        .await
        .unwrap_err();
    match err {
        ClientError::ApiError { code, message, .. } => {
            assert_eq!(code, 404);
            assert_eq!(message, "not_found");
        }
        other => panic!("expected ApiError, got {other:?}"),
    }
}

#[tokio::test]
async fn schema_mismatch_is_decode_error() {
    let client = client(MockTransport::single(Reply::json(200, r#"{"name":"abc"}"#)));
    let err = client
        .perform_async::<Model>(get(&client, "/models/abc"))
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Decode);
}

#[tokio::test]
async fn transport_failure_is_transport_error() {
    let client = client(MockTransport::single(Reply::Error(ClientError::ConnectionError(
        "refused".into(),
    ))));
    let err = client
        .perform_async::<Model>(get(&client, "/models"))
        .await
        .unwrap_err();
    assert!(err.is_transport());
}

#[tokio::test]
async fn callback_runs_once_on_the_serializer_thread() {
    let client = client(MockTransport::single(Reply::json(200, r#"{"id":"abc"}"#)));
    let calls = Arc::new(Mutex::new(Vec::new()));
    let (tx, rx) = oneshot::channel();

    let seen = calls.clone();
    let handle = client.perform(
        get(&client, "/models/abc"),
        move |result: Result<Model, ClientError>| {
            let thread = std::thread::current().name().unwrap_or("").to_string();
            seen.lock().unwrap().push(result.map(|m| m.id).ok());
            let _ = tx.send(thread);
        },
    );

    let thread = rx.await.unwrap();
    settle(&client).await;
    assert_eq!(thread, "test-serializer");
    assert_eq!(*calls.lock().unwrap(), vec![Some("abc".to_string())]);
    assert_eq!(handle.state(), HandleState::Completed);
    assert!(!handle.cancel());
}

#[tokio::test]
async fn default_headers_and_json_body_reach_the_transport() {
    let transport = MockTransport::single(Reply::json(200, r#"{"id":"c1"}"#));
    let client = client(transport.clone());
    let _: Model = client
        .perform_async(post(&client, "/chat/completions", json!({"model": "m"})))
        .await
        .unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    let req = &requests[0];
    assert_eq!(req.method(), &Method::POST);
    assert_eq!(req.url().as_str(), "https://api.test.local/v1/chat/completions");
    assert_eq!(req.headers()["authorization"], "Bearer sk-test-0123456789");
    assert_eq!(req.headers()["content-type"], "application/json");
    assert_eq!(req.body().unwrap().as_ref(), br#"{"model":"m"}"#);
}

#[tokio::test]
async fn raw_facade_returns_bytes_and_still_rejects_errors() {
    let transport = MockTransport::new(vec![
        Reply::Body {
            status: 200,
            content_type: Some("audio/mpeg"),
            steps: vec![support::Step::chunk("ID3...")],
        },
        Reply::json(500, "upstream exploded"),
    ]);
    let client = client(transport);

    let raw = client
        .perform_raw_async(get(&client, "/audio/speech"))
        .await
        .unwrap();
    assert_eq!(raw.body.as_ref(), b"ID3...");
    assert_eq!(raw.content_type(), Some("audio/mpeg"));

    let err = client
        .perform_raw_async(get(&client, "/audio/speech"))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), Some(500));
}

#[tokio::test]
async fn reactive_one_shot_emits_single_item() {
    let client = client(MockTransport::single(Reply::json(200, r#"{"id":"abc"}"#)));
    let items: Vec<Result<Model, ClientError>> =
        client.observe(get(&client, "/models/abc")).collect().await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].as_ref().unwrap().id, "abc");
}

#[tokio::test]
async fn facades_agree_on_errors() {
    let reply = Reply::json(429, r#"{"error":{"message":"slow down","type":"rate_limit"}}"#);
    let client = client(MockTransport::single(reply));

    let from_async = client
        .perform_async::<Model>(get(&client, "/models"))
        .await
        .unwrap_err();

    let (tx, rx) = oneshot::channel();
    client.perform(get(&client, "/models"), move |r: Result<Model, ClientError>| {
        let _ = tx.send(r);
    });
    let from_callback = rx.await.unwrap().unwrap_err();

    let from_stream = client
        .observe::<Model>(get(&client, "/models"))
        .next()
        .await
        .unwrap()
        .unwrap_err();

    for err in [&from_async, &from_callback, &from_stream] {
        assert_eq!(err.to_string(), "API error 429: slow down");
        assert_eq!(err.details().unwrap()["error"]["type"], "rate_limit");
    }
}

#[tokio::test]
async fn concurrent_calls_complete_independently() {
    let client = client(MockTransport::single(Reply::json(200, r#"{"id":"same"}"#)));
    let calls = (0..16).map(|_| client.perform_async::<Model>(get(&client, "/models/same")));
    let results = futures::future::join_all(calls).await;
    assert!(results.iter().all(|r| r.as_ref().is_ok_and(|m| m.id == "same")));
}
