//! API client
//!
//! `ApiClient` owns the shared [`ExecutionCore`]. The facades
//! (`perform`, `perform_async`, `observe`, `perform_streaming`, ...) are
//! implemented in [`crate::facade`] as thin adapters over it.

use std::sync::Arc;

use reqwest::header::HeaderMap;
use reqwest::{Method, Url};
use serde::Serialize;
use tokio::runtime::Handle;

use crate::error::ClientError;
use crate::execution::core::{ExecutionCore, IoRuntime};
use crate::execution::http::{ReqwestTransport, Transport, headers::default_headers};
use crate::execution::middleware::{Middleware, MiddlewarePipeline};
use crate::execution::request::{RequestDescriptor, RequestDescriptorBuilder};
use crate::execution::serializer::ExecutionSerializer;
use crate::execution::url::{EndpointTemplate, UrlBuilder};
use crate::types::ClientConfig;

/// Handle to a configured execution core. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ApiClient {
    core: Arc<ExecutionCore>,
}

impl ApiClient {
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::new()
    }

    /// Client with the default transport, no middleware and the global
    /// serializer.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        Self::builder().config(config).build()
    }

    /// Client configured from `OPENAI_*` environment variables.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn config(&self) -> &ClientConfig {
        self.core.config()
    }

    pub fn core(&self) -> &ExecutionCore {
        &self.core
    }

    /// Headers every request starts with (auth, organization, user agent,
    /// then custom overrides).
    pub fn default_headers(&self) -> Result<HeaderMap, ClientError> {
        default_headers(self.config())
    }

    /// Resolve an endpoint template against the configured origin.
    pub fn url(
        &self,
        template: impl Into<EndpointTemplate>,
        params: &[(&str, &str)],
    ) -> Result<Url, ClientError> {
        UrlBuilder::new(self.config()).resolve(&template.into(), params)
    }

    /// Start a request descriptor for `template`, pre-populated with the
    /// default headers.
    pub fn request(
        &self,
        method: Method,
        template: impl Into<EndpointTemplate>,
        params: &[(&str, &str)],
    ) -> Result<RequestDescriptorBuilder, ClientError> {
        let url = self.url(template, params)?;
        Ok(RequestDescriptor::builder(method, url).headers(self.default_headers()?))
    }

    /// Shorthand for a `POST` with a JSON body.
    pub fn post_json<B: Serialize + ?Sized>(
        &self,
        template: impl Into<EndpointTemplate>,
        params: &[(&str, &str)],
        body: &B,
    ) -> Result<RequestDescriptor, ClientError> {
        Ok(self.request(Method::POST, template, params)?.json(body)?.build())
    }
}

/// Builder for [`ApiClient`].
#[derive(Default)]
pub struct ApiClientBuilder {
    config: Option<ClientConfig>,
    transport: Option<Arc<dyn Transport>>,
    http_client: Option<reqwest::Client>,
    middlewares: Vec<Arc<dyn Middleware>>,
    serializer: Option<ExecutionSerializer>,
    runtime: Option<Handle>,
}

impl ApiClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replace the network layer (tests, custom stacks).
    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn transport_arc(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use a pre-configured `reqwest::Client` with the default transport.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Append a middleware; hooks run in the order middleware are added.
    pub fn middleware<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    pub fn middleware_arc(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// Deliver results on a dedicated serializer instead of the global one.
    pub fn serializer(mut self, serializer: ExecutionSerializer) -> Self {
        self.serializer = Some(serializer);
        self
    }

    /// Spawn I/O tasks on this runtime.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn build(self) -> Result<ApiClient, ClientError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let transport: Arc<dyn Transport> = match (self.transport, self.http_client) {
            (Some(transport), _) => transport,
            (None, Some(client)) => Arc::new(ReqwestTransport::with_client(client, config.timeout)),
            (None, None) => Arc::new(ReqwestTransport::from_config(&config)?),
        };
        let serializer = match self.serializer {
            Some(serializer) => serializer,
            None => ExecutionSerializer::global()?,
        };
        let runtime = match self.runtime {
            Some(handle) => IoRuntime::from_handle(handle),
            None => IoRuntime::current_or_owned()?,
        };

        tracing::debug!(
            host = %config.host,
            middlewares = self.middlewares.len(),
            serializer = serializer.name(),
            "api client created"
        );

        let core = ExecutionCore::new(
            Arc::new(config),
            transport,
            MiddlewarePipeline::new(self.middlewares),
            serializer,
            runtime,
        );
        Ok(ApiClient {
            core: Arc::new(core),
        })
    }
}

impl std::fmt::Debug for ApiClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClientBuilder")
            .field("config", &self.config)
            .field("custom_transport", &self.transport.is_some())
            .field("middlewares", &self.middlewares.len())
            .finish_non_exhaustive()
    }
}
