//! Client Configuration
//!
//! `ClientConfig` is built once, wrapped in an `Arc` by the client and shared
//! read-only by every facade and in-flight call.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::header::{HeaderName, HeaderValue};
use secrecy::{ExposeSecret, SecretString};

use crate::defaults;
use crate::error::ClientError;
use crate::types::ParsingOptions;

/// Immutable client configuration.
///
/// # Example
/// ```rust,ignore
/// use siumai_exec::types::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::builder()
///     .token("sk-...")
///     .host("localhost")
///     .port(8080)
///     .scheme("http")
///     .timeout(Duration::from_secs(5))
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bearer token (securely stored)
    pub token: Option<SecretString>,
    /// Organization id sent as `OpenAI-Organization`
    pub organization: Option<String>,
    pub host: String,
    /// Explicit port; `None` uses the scheme default
    pub port: Option<u16>,
    pub scheme: String,
    /// Path prefix for every endpoint template (e.g. `/v1`)
    pub base_path: String,
    /// Per-request timeout (handshake only for streaming calls)
    pub timeout: Duration,
    pub connect_timeout: Option<Duration>,
    pub user_agent: String,
    /// Headers applied last, overriding the defaults
    pub custom_headers: HashMap<String, String>,
    pub parsing_options: ParsingOptions,
    /// Terminal marker of streaming responses
    pub done_marker: String,
    /// Report a successful `cancel()` as a `ClientError::Cancelled` terminal event
    pub cancellation_is_error: bool,
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Load configuration from `OPENAI_*` environment variables on top of the defaults.
    ///
    /// Recognized: `OPENAI_API_KEY`, `OPENAI_ORGANIZATION`, `OPENAI_HOST`,
    /// `OPENAI_PORT`, `OPENAI_SCHEME`, `OPENAI_BASE_PATH`, `OPENAI_TIMEOUT_SECS`,
    /// `OPENAI_PARSING_OPTIONS` (comma separated flag names).
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = ClientConfigBuilder::new();
        if let Some(token) = lookup("OPENAI_API_KEY").filter(|v| !v.trim().is_empty()) {
            builder = builder.token(token.trim());
        }
        if let Some(org) = lookup("OPENAI_ORGANIZATION").filter(|v| !v.trim().is_empty()) {
            builder = builder.organization(org.trim());
        }
        if let Some(host) = lookup("OPENAI_HOST") {
            builder = builder.host(host.trim());
        }
        if let Some(port) = lookup("OPENAI_PORT") {
            let port = port.trim().parse::<u16>().map_err(|e| {
                ClientError::ConfigurationError(format!("Invalid OPENAI_PORT '{port}': {e}"))
            })?;
            builder = builder.port(port);
        }
        if let Some(scheme) = lookup("OPENAI_SCHEME") {
            builder = builder.scheme(scheme.trim());
        }
        if let Some(path) = lookup("OPENAI_BASE_PATH") {
            builder = builder.base_path(path.trim());
        }
        if let Some(secs) = lookup("OPENAI_TIMEOUT_SECS") {
            let secs = secs.trim().parse::<u64>().map_err(|e| {
                ClientError::ConfigurationError(format!("Invalid OPENAI_TIMEOUT_SECS '{secs}': {e}"))
            })?;
            builder = builder.timeout(Duration::from_secs(secs));
        }
        if let Some(list) = lookup("OPENAI_PARSING_OPTIONS") {
            let opts = ParsingOptions::parse_list(&list).map_err(|name| {
                ClientError::ConfigurationError(format!("Unknown parsing option '{name}'"))
            })?;
            builder = builder.parsing_options(opts);
        }
        let config = builder.build();
        config.validate()?;
        Ok(config)
    }

    /// Authorization header value, when a token is configured.
    pub fn auth_header(&self) -> Option<String> {
        self.token
            .as_ref()
            .map(|t| format!("Bearer {}", t.expose_secret()))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.host.trim().is_empty() {
            return Err(ClientError::ConfigurationError(
                "Host cannot be empty".to_string(),
            ));
        }

        if self.scheme != "http" && self.scheme != "https" {
            return Err(ClientError::ConfigurationError(format!(
                "Scheme must be http or https, got '{}'",
                self.scheme
            )));
        }

        if let Some(token) = &self.token
            && token.expose_secret().trim().is_empty()
        {
            return Err(ClientError::ConfigurationError(
                "Token cannot be empty when set".to_string(),
            ));
        }

        for (k, v) in &self.custom_headers {
            HeaderName::from_bytes(k.as_bytes()).map_err(|e| {
                ClientError::ConfigurationError(format!("Invalid header name '{k}': {e}"))
            })?;
            HeaderValue::from_str(v).map_err(|e| {
                ClientError::ConfigurationError(format!("Invalid header value for '{k}': {e}"))
            })?;
        }

        if self.done_marker.trim().is_empty() {
            return Err(ClientError::ConfigurationError(
                "Stream terminal marker cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            token: None,
            organization: None,
            host: defaults::endpoint::HOST.to_string(),
            port: None,
            scheme: defaults::endpoint::SCHEME.to_string(),
            base_path: defaults::endpoint::BASE_PATH.to_string(),
            timeout: defaults::http::REQUEST_TIMEOUT,
            connect_timeout: Some(defaults::http::CONNECT_TIMEOUT),
            user_agent: defaults::http::USER_AGENT.to_string(),
            custom_headers: HashMap::new(),
            parsing_options: ParsingOptions::NONE,
            done_marker: defaults::streaming::DONE_MARKER.to_string(),
            cancellation_is_error: false,
        }
    }
}

/// Builder for `ClientConfig`
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bearer token
    pub fn token<S: Into<String>>(mut self, token: S) -> Self {
        self.config.token = Some(SecretString::from(token.into()));
        self
    }

    pub fn organization<S: Into<String>>(mut self, organization: S) -> Self {
        self.config.organization = Some(organization.into());
        self
    }

    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.host = host.into();
        self
    }

    pub const fn port(mut self, port: u16) -> Self {
        self.config.port = Some(port);
        self
    }

    pub fn scheme<S: Into<String>>(mut self, scheme: S) -> Self {
        self.config.scheme = scheme.into();
        self
    }

    pub fn base_path<S: Into<String>>(mut self, base_path: S) -> Self {
        self.config.base_path = base_path.into();
        self
    }

    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub const fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Add a header override
    pub fn header<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.config.custom_headers.insert(key.into(), value.into());
        self
    }

    pub fn headers(mut self, headers: HashMap<String, String>) -> Self {
        self.config.custom_headers.extend(headers);
        self
    }

    pub const fn parsing_options(mut self, options: ParsingOptions) -> Self {
        self.config.parsing_options = options;
        self
    }

    pub fn done_marker<S: Into<String>>(mut self, marker: S) -> Self {
        self.config.done_marker = marker.into();
        self
    }

    pub const fn cancellation_is_error(mut self, enabled: bool) -> Self {
        self.config.cancellation_is_error = enabled;
        self
    }

    /// Build the configuration. Call `ClientConfig::validate` (done by the
    /// client builder) to check it.
    pub fn build(self) -> ClientConfig {
        self.config
    }
}
