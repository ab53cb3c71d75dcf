//! Shared test helpers: a scripted in-memory transport and client builders.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use siumai_exec::prelude::*;

/// One step of a scripted response body.
#[derive(Debug, Clone)]
pub enum Step {
    Chunk(Bytes),
    Delay(Duration),
    Fail(ClientError),
    /// Never yields again (the connection stays open).
    Hang,
}

impl Step {
    pub fn chunk(text: &str) -> Self {
        Self::Chunk(Bytes::copy_from_slice(text.as_bytes()))
    }
}

/// Scripted reaction to one call.
#[derive(Debug, Clone)]
pub enum Reply {
    Body {
        status: u16,
        content_type: Option<&'static str>,
        steps: Vec<Step>,
    },
    Error(ClientError),
    /// The response head never arrives.
    Hang,
}

impl Reply {
    pub fn json(status: u16, body: &str) -> Self {
        Self::Body {
            status,
            content_type: Some("application/json"),
            steps: vec![Step::chunk(body)],
        }
    }

    pub fn sse(steps: Vec<Step>) -> Self {
        Self::Body {
            status: 200,
            content_type: Some("text/event-stream"),
            steps,
        }
    }

    pub fn sse_chunks(chunks: &[&str]) -> Self {
        Self::sse(chunks.iter().map(|c| Step::chunk(c)).collect())
    }
}

/// Sets a flag when dropped; used to observe that the transport future or
/// body stream was released.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// In-memory transport replaying scripted replies in order. The last reply
/// is repeated once the script runs out.
#[derive(Clone)]
pub struct MockTransport {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    last: Arc<Mutex<Option<Reply>>>,
    requests: Arc<Mutex<Vec<RequestDescriptor>>>,
    released: Arc<AtomicBool>,
}

impl MockTransport {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            last: Arc::new(Mutex::new(None)),
            requests: Arc::new(Mutex::new(Vec::new())),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn single(reply: Reply) -> Self {
        Self::new(vec![reply])
    }

    /// Requests as seen by the transport (after request middleware).
    pub fn requests(&self) -> Vec<RequestDescriptor> {
        self.requests.lock().unwrap().clone()
    }

    /// Whether a hanging send or an open body stream has been dropped.
    pub fn released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    fn next_reply(&self, request: &RequestDescriptor) -> Reply {
        self.requests.lock().unwrap().push(request.clone());
        let mut replies = self.replies.lock().unwrap();
        let mut last = self.last.lock().unwrap();
        match replies.pop_front() {
            Some(reply) => {
                *last = Some(reply.clone());
                reply
            }
            None => last
                .clone()
                .unwrap_or_else(|| Reply::Error(ClientError::ConnectionError("no reply scripted".into()))),
        }
    }

    fn headers(content_type: Option<&'static str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(ct) = content_type {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(ct));
        }
        headers
    }

    async fn hang(&self) {
        let _flag = DropFlag(self.released.clone());
        futures::future::pending::<()>().await;
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &RequestDescriptor) -> Result<RawResponse, ClientError> {
        match self.next_reply(request) {
            Reply::Error(e) => Err(e),
            Reply::Hang => {
                self.hang().await;
                unreachable!("pending future resolved")
            }
            Reply::Body {
                status,
                content_type,
                steps,
            } => {
                let mut body = Vec::new();
                for step in steps {
                    match step {
                        Step::Chunk(bytes) => body.extend_from_slice(&bytes),
                        Step::Delay(d) => tokio::time::sleep(d).await,
                        Step::Fail(e) => return Err(e),
                        Step::Hang => self.hang().await,
                    }
                }
                Ok(RawResponse {
                    status,
                    headers: Self::headers(content_type),
                    body: Bytes::from(body),
                })
            }
        }
    }

    async fn open_stream(
        &self,
        request: &RequestDescriptor,
    ) -> Result<StreamingResponse, ClientError> {
        match self.next_reply(request) {
            Reply::Error(e) => Err(e),
            Reply::Hang => {
                self.hang().await;
                unreachable!("pending future resolved")
            }
            Reply::Body {
                status,
                content_type,
                steps,
            } => {
                let flag = self.released.clone();
                let body = async_stream::stream! {
                    let _flag = DropFlag(flag);
                    for step in steps {
                        match step {
                            Step::Chunk(bytes) => yield Ok(bytes),
                            Step::Delay(d) => tokio::time::sleep(d).await,
                            Step::Fail(e) => yield Err(e),
                            Step::Hang => futures::future::pending::<()>().await,
                        }
                    }
                };
                Ok(StreamingResponse {
                    status,
                    headers: Self::headers(content_type),
                    body: Box::pin(body),
                })
            }
        }
    }
}

pub fn test_config() -> ClientConfig {
    ClientConfig::builder()
        .token("sk-test-0123456789")
        .host("api.test.local")
        .build()
}

/// Client over `transport` with its own serializer.
pub fn client_with(transport: MockTransport, config: ClientConfig) -> ApiClient {
    ApiClient::builder()
        .config(config)
        .transport(transport)
        .serializer(ExecutionSerializer::new("test-serializer").expect("serializer"))
        .build()
        .expect("client")
}

pub fn client(transport: MockTransport) -> ApiClient {
    client_with(transport, test_config())
}

pub fn get(client: &ApiClient, template: &'static str) -> RequestDescriptor {
    client
        .request(Method::GET, template, &[])
        .expect("request")
        .build()
}

pub fn post(client: &ApiClient, template: &'static str, body: serde_json::Value) -> RequestDescriptor {
    client.post_json(template, &[], &body).expect("request")
}

/// Give queued deliveries a chance to run, then drain the serializer.
pub async fn settle(client: &ApiClient) {
    tokio::time::sleep(Duration::from_millis(50)).await;
    client.core().serializer().flush().await;
}
