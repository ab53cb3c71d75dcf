//! Request descriptors
//!
//! A `RequestDescriptor` is built once per call and never mutated. Middleware
//! that needs to change it produces a new descriptor (`with_header`,
//! `into_builder`).

use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Url};
use serde::Serialize;

use crate::error::ClientError;

/// Method, absolute URL, headers and encoded body of one call.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl RequestDescriptor {
    pub fn builder(method: Method, url: Url) -> RequestDescriptorBuilder {
        RequestDescriptorBuilder::new(method, url)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Return a copy with `name` set to `value` (replacing existing values).
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Return a copy targeting another URL.
    pub fn with_url(mut self, url: Url) -> Self {
        self.url = url;
        self
    }

    /// Reopen the descriptor for larger rewrites.
    pub fn into_builder(self) -> RequestDescriptorBuilder {
        RequestDescriptorBuilder { request: self }
    }
}

/// Builder for `RequestDescriptor`
#[derive(Debug, Clone)]
pub struct RequestDescriptorBuilder {
    request: RequestDescriptor,
}

impl RequestDescriptorBuilder {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            request: RequestDescriptor {
                method,
                url,
                headers: HeaderMap::new(),
                body: None,
            },
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.request.method = method;
        self
    }

    /// Add a header, validating name and value.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self, ClientError> {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            ClientError::InvalidInput(format!("Invalid header name '{name}': {e}"))
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| {
            ClientError::InvalidInput(format!("Invalid header value for '{name}': {e}"))
        })?;
        self.request.headers.insert(header_name, header_value);
        Ok(self)
    }

    pub fn typed_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.request.headers.insert(name, value);
        self
    }

    /// Merge headers; entries in `headers` replace existing values.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        for (name, value) in headers.iter() {
            self.request.headers.insert(name.clone(), value.clone());
        }
        self
    }

    /// Raw body bytes. The caller sets `content-type`.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.request.body = Some(body.into());
        self
    }

    /// Serialize `body` as JSON and set `content-type: application/json`.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ClientError> {
        let bytes = serde_json::to_vec(body)
            .map_err(|e| ClientError::InvalidInput(format!("Failed to encode JSON body: {e}")))?;
        self.request.body = Some(Bytes::from(bytes));
        self.request
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(self)
    }

    pub fn build(self) -> RequestDescriptor {
        self.request
    }
}
