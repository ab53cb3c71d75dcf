//! `reqwest`-backed transport.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use crate::error::ClientError;
use crate::execution::http::transport::{RawResponse, StreamingResponse, Transport};
use crate::execution::request::RequestDescriptor;
use crate::types::ClientConfig;

/// Default transport issuing real HTTP calls.
///
/// One-shot calls use the configured request timeout for the whole exchange;
/// streaming calls apply it to the handshake only, the body may stay open.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Build an HTTP client from the client configuration.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(connect_timeout) = config.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }
        let client = builder.build().map_err(|e| {
            ClientError::ConfigurationError(format!("Failed to create HTTP client: {e}"))
        })?;
        Ok(Self {
            client,
            timeout: config.timeout,
        })
    }

    /// Use a caller-provided `reqwest::Client` (proxies, TLS settings, pools).
    pub fn with_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    fn build(&self, request: &RequestDescriptor) -> reqwest::RequestBuilder {
        let mut rb = self
            .client
            .request(request.method().clone(), request.url().clone())
            .headers(request.headers().clone());
        if let Some(body) = request.body() {
            rb = rb.body(body.clone());
        }
        rb
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &RequestDescriptor) -> Result<RawResponse, ClientError> {
        let resp = self.build(request).timeout(self.timeout).send().await?;
        let status = resp.status().as_u16();
        let headers = resp.headers().clone();
        let body = resp.bytes().await?;
        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }

    async fn open_stream(
        &self,
        request: &RequestDescriptor,
    ) -> Result<StreamingResponse, ClientError> {
        let resp = tokio::time::timeout(self.timeout, self.build(request).send())
            .await
            .map_err(|_| {
                ClientError::TimeoutError(format!(
                    "No response headers within {}ms",
                    self.timeout.as_millis()
                ))
            })??;
        let status = resp.status().as_u16();
        let headers = resp.headers().clone();
        let body = resp
            .bytes_stream()
            .map(|chunk| chunk.map_err(ClientError::from));
        Ok(StreamingResponse {
            status,
            headers,
            body: Box::pin(body),
        })
    }
}
