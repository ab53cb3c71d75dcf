//! The reqwest transport against a local mock server.

use std::time::Duration;

use futures::StreamExt;
use reqwest::Url;
use serde::Deserialize;
use serde_json::json;
use siumai_exec::execution::ReqwestTransport;
use siumai_exec::prelude::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

#[derive(Debug, Deserialize)]
struct Model {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Delta {
    n: u32,
}

fn client_for(server: &mockito::Server) -> ApiClient {
    let host_port = server.host_with_port();
    let (host, port) = host_port.rsplit_once(':').expect("host:port");
    let config = ClientConfig::builder()
        .scheme("http")
        .host(host)
        .port(port.parse().expect("port"))
        .token("sk-mock-0123456789")
        .organization("org-mock")
        .build();
    ApiClient::new(config).expect("client")
}

#[tokio::test]
async fn one_shot_call_sends_default_headers() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v1/models/gpt-4o")
        .match_header("authorization", "Bearer sk-mock-0123456789")
        .match_header("openai-organization", "org-mock")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"gpt-4o","object":"model"}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let request = client
        .request(Method::GET, "/models/{model}", &[("model", "gpt-4o")])
        .unwrap()
        .build();
    let model: Model = client.perform_async(request).await.unwrap();

    assert_eq!(model.id, "gpt-4o");
    mock.assert_async().await;
}

#[tokio::test]
async fn error_status_becomes_api_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":{"message":"Invalid model","type":"invalid_request_error","code":"model_not_found"}}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let err = client
        .perform_async::<Model>(client.post_json("/chat/completions", &[], &json!({})).unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), Some(400));
    assert_eq!(err.details().unwrap()["error"]["code"], "model_not_found");
}

#[tokio::test]
async fn event_stream_is_framed_and_completed() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("accept", "text/event-stream")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body("data: {\"n\":1}\n\ndata: {\"n\":2}\n\ndata: [DONE]\n\n")
        .create_async()
        .await;

    let client = client_for(&server);
    let frames = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = frames.clone();
    let (tx, rx) = oneshot::channel();
    client.perform_streaming(
        client
            .post_json("/chat/completions", &[], &json!({"stream": true}))
            .unwrap(),
        move |item: Result<Delta, ClientError>| sink.lock().unwrap().push(item.unwrap().n),
        move |result| {
            let _ = tx.send(result);
        },
    );

    rx.await.unwrap().unwrap();
    assert_eq!(*frames.lock().unwrap(), vec![1, 2]);
    mock.assert_async().await;
}

#[tokio::test]
async fn unreachable_server_is_transport_error() {
    let config = ClientConfig::builder()
        .scheme("http")
        .host("127.0.0.1")
        .port(1)
        .build();
    let client = ApiClient::new(config).unwrap();
    let err = client
        .perform_async::<Model>(client.request(Method::GET, "/models", &[]).unwrap().build())
        .await
        .unwrap_err();
    assert!(err.is_transport(), "{err:?}");
}

#[tokio::test]
async fn stalled_stream_body_keeps_timeout_classification() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4096];
        let _ = socket.read(&mut buf).await;
        let first = "data: {\"n\":1}\n\n";
        let head = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\n\r\n{:x}\r\n{first}\r\n",
            first.len()
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    // Total timeout on the client covers the body; the handshake limit does not fire.
    let http = reqwest::Client::builder()
        .timeout(Duration::from_millis(300))
        .build()
        .unwrap();
    let transport = ReqwestTransport::with_client(http, Duration::from_secs(5));
    let url = Url::parse(&format!("http://{addr}/v1/events")).unwrap();
    let request = RequestDescriptor::builder(Method::GET, url).build();

    let mut response = transport.open_stream(&request).await.unwrap();
    assert_eq!(response.status, 200);
    let first = response.body.next().await.unwrap().unwrap();
    assert_eq!(&first[..], b"data: {\"n\":1}\n\n");

    let err = response.body.next().await.unwrap().unwrap_err();
    assert!(matches!(err, ClientError::TimeoutError(_)), "{err:?}");
}
