//! URL / path building
//!
//! Resolves endpoint templates such as `/threads/{thread_id}/runs/{run_id}`
//! against the configured scheme, host, port and base path. Parameter values
//! are percent-encoded, so a value can never introduce extra path segments.

use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;

use reqwest::Url;

use crate::error::ClientError;
use crate::types::ClientConfig;

/// Endpoint path template with `{name}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointTemplate(Cow<'static, str>);

impl EndpointTemplate {
    pub const fn new(template: &'static str) -> Self {
        Self(Cow::Borrowed(template))
    }

    pub fn owned(template: impl Into<String>) -> Self {
        Self(Cow::Owned(template.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Placeholder names in order of appearance.
    pub fn placeholders(&self) -> Result<Vec<&str>, ClientError> {
        let mut names = Vec::new();
        for segment in self.segments()? {
            if let Segment::Param(name) = segment {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Substitute every placeholder. Missing or unknown parameters are errors.
    pub fn render(&self, params: &[(&str, &str)]) -> Result<String, ClientError> {
        let mut out = String::with_capacity(self.0.len());
        let mut used = HashSet::new();
        for segment in self.segments()? {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Param(name) => {
                    let value = params
                        .iter()
                        .find(|(k, _)| *k == name)
                        .map(|(_, v)| *v)
                        .ok_or_else(|| {
                            ClientError::InvalidInput(format!(
                                "Missing path parameter '{name}' for '{}'",
                                self.0
                            ))
                        })?;
                    if value.is_empty() {
                        return Err(ClientError::InvalidInput(format!(
                            "Path parameter '{name}' cannot be empty"
                        )));
                    }
                    out.push_str(&urlencoding::encode(value));
                    used.insert(name);
                }
            }
        }
        if let Some((unknown, _)) = params.iter().find(|(k, _)| !used.contains(k)) {
            return Err(ClientError::InvalidInput(format!(
                "Unknown path parameter '{unknown}' for '{}'",
                self.0
            )));
        }
        Ok(out)
    }

    fn segments(&self) -> Result<Vec<Segment<'_>>, ClientError> {
        let template: &str = &self.0;
        let mut segments = Vec::new();
        let mut rest = template;
        while !rest.is_empty() {
            match rest.find(['{', '}']) {
                None => {
                    segments.push(Segment::Literal(rest));
                    break;
                }
                Some(pos) if rest.as_bytes()[pos] == b'}' => {
                    return Err(ClientError::InvalidInput(format!(
                        "Unbalanced '}}' in endpoint template '{template}'"
                    )));
                }
                Some(pos) => {
                    if pos > 0 {
                        segments.push(Segment::Literal(&rest[..pos]));
                    }
                    let after = &rest[pos + 1..];
                    let end = after.find('}').ok_or_else(|| {
                        ClientError::InvalidInput(format!(
                            "Unclosed '{{' in endpoint template '{template}'"
                        ))
                    })?;
                    let name = &after[..end];
                    if name.is_empty() || name.contains('{') {
                        return Err(ClientError::InvalidInput(format!(
                            "Invalid placeholder in endpoint template '{template}'"
                        )));
                    }
                    segments.push(Segment::Param(name));
                    rest = &after[end + 1..];
                }
            }
        }
        Ok(segments)
    }
}

impl From<&'static str> for EndpointTemplate {
    fn from(template: &'static str) -> Self {
        Self::new(template)
    }
}

impl From<String> for EndpointTemplate {
    fn from(template: String) -> Self {
        Self::owned(template)
    }
}

impl fmt::Display for EndpointTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

enum Segment<'a> {
    Literal(&'a str),
    Param(&'a str),
}

/// Builds absolute URLs from a `ClientConfig`.
#[derive(Debug, Clone, Copy)]
pub struct UrlBuilder<'a> {
    config: &'a ClientConfig,
}

impl<'a> UrlBuilder<'a> {
    pub fn new(config: &'a ClientConfig) -> Self {
        Self { config }
    }

    /// `scheme://host[:port]/base_path`
    pub fn base_url(&self) -> Result<Url, ClientError> {
        let mut url = self.origin()?;
        url.set_path(&normalize_base_path(&self.config.base_path));
        Ok(url)
    }

    /// Resolve `template` with `params` under the base path.
    ///
    /// Templates that are already absolute `http(s)://` URLs bypass the
    /// configured origin and base path.
    pub fn resolve(
        &self,
        template: &EndpointTemplate,
        params: &[(&str, &str)],
    ) -> Result<Url, ClientError> {
        let rendered = template.render(params)?;
        if rendered.starts_with("http://") || rendered.starts_with("https://") {
            return Url::parse(&rendered).map_err(|e| {
                ClientError::InvalidInput(format!("Invalid endpoint URL '{rendered}': {e}"))
            });
        }

        let mut url = self.origin()?;
        let base = normalize_base_path(&self.config.base_path);
        let path = rendered.trim_start_matches('/');
        let joined = match (base.as_str(), path.is_empty()) {
            ("/", _) => format!("/{path}"),
            (base, true) => base.to_string(),
            (base, false) => format!("{base}/{path}"),
        };
        url.set_path(&joined);
        Ok(url)
    }

    /// Like [`resolve`](Self::resolve), appending percent-encoded query pairs.
    pub fn resolve_with_query(
        &self,
        template: &EndpointTemplate,
        params: &[(&str, &str)],
        query: &[(&str, &str)],
    ) -> Result<Url, ClientError> {
        let mut url = self.resolve(template, params)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter());
        }
        Ok(url)
    }

    fn origin(&self) -> Result<Url, ClientError> {
        let raw = format!("{}://{}", self.config.scheme, self.config.host.trim());
        let mut url = Url::parse(&raw).map_err(|e| {
            ClientError::ConfigurationError(format!("Invalid host/scheme '{raw}': {e}"))
        })?;
        if let Some(port) = self.config.port {
            url.set_port(Some(port)).map_err(|_| {
                ClientError::ConfigurationError(format!("Cannot set port {port} on '{raw}'"))
            })?;
        }
        Ok(url)
    }
}

fn normalize_base_path(base_path: &str) -> String {
    let trimmed = base_path.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}")
    }
}
