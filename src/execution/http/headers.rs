//! HTTP Headers Utility
//!
//! Builds the default header set every request descriptor starts from.

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use std::collections::HashMap;

use crate::error::ClientError;
use crate::types::ClientConfig;

/// Organization header of the API family.
pub const ORGANIZATION_HEADER: &str = "openai-organization";

/// HTTP header builder for API requests
#[derive(Debug, Default)]
pub struct HttpHeaderBuilder {
    headers: HeaderMap,
}

impl HttpHeaderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add Bearer token authorization
    pub fn with_bearer_auth(mut self, token: &str) -> Result<Self, ClientError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
            ClientError::ConfigurationError(format!("Invalid token format: {e}"))
        })?;
        value.set_sensitive(true);
        self.headers.insert(AUTHORIZATION, value);
        Ok(self)
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Result<Self, ClientError> {
        self.headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent)
                .map_err(|e| ClientError::ConfigurationError(format!("Invalid user agent: {e}")))?,
        );
        Ok(self)
    }

    /// Add a custom header
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, ClientError> {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            ClientError::ConfigurationError(format!("Invalid header name '{name}': {e}"))
        })?;
        self.headers.insert(
            header_name,
            HeaderValue::from_str(value).map_err(|e| {
                ClientError::ConfigurationError(format!("Invalid header value for '{name}': {e}"))
            })?,
        );
        Ok(self)
    }

    /// Add multiple custom headers; they replace earlier values.
    pub fn with_custom_headers(
        mut self,
        custom_headers: &HashMap<String, String>,
    ) -> Result<Self, ClientError> {
        for (key, value) in custom_headers {
            self = self.with_header(key, value)?;
        }
        Ok(self)
    }

    pub fn build(self) -> HeaderMap {
        self.headers
    }
}

/// Default headers derived from the configuration: authorization,
/// organization and user agent, then the custom overrides.
pub fn default_headers(config: &ClientConfig) -> Result<HeaderMap, ClientError> {
    use secrecy::ExposeSecret;

    let mut builder = HttpHeaderBuilder::new().with_user_agent(&config.user_agent)?;
    if let Some(token) = &config.token {
        builder = builder.with_bearer_auth(token.expose_secret())?;
    }
    if let Some(org) = &config.organization {
        builder = builder.with_header(ORGANIZATION_HEADER, org)?;
    }
    Ok(builder.with_custom_headers(&config.custom_headers)?.build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_auth_and_org_headers() {
        let config = ClientConfig::builder()
            .token("sk-test")
            .organization("org-1")
            .build();
        let headers = default_headers(&config).unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer sk-test");
        assert!(headers[AUTHORIZATION].is_sensitive());
        assert_eq!(headers[ORGANIZATION_HEADER], "org-1");
        assert!(headers.contains_key(USER_AGENT));
    }

    #[test]
    fn custom_headers_override_defaults() {
        let config = ClientConfig::builder()
            .token("sk-test")
            .header("Authorization", "Bearer override")
            .header("x-extra", "1")
            .build();
        let headers = default_headers(&config).unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer override");
        assert_eq!(headers["x-extra"], "1");
    }

    #[test]
    fn no_token_means_no_authorization() {
        let headers = default_headers(&ClientConfig::default()).unwrap();
        assert!(!headers.contains_key(AUTHORIZATION));
    }

    #[test]
    fn invalid_custom_header_is_configuration_error() {
        let config = ClientConfig::builder().header("bad name", "x").build();
        assert!(matches!(
            default_headers(&config),
            Err(ClientError::ConfigurationError(_))
        ));
    }
}
