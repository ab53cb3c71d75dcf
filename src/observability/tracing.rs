//! Tracing setup and log formatting helpers.

use reqwest::header::HeaderMap;
use tracing_subscriber::EnvFilter;

use crate::error::ClientError;

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

/// Subscriber configuration used by [`init_tracing`].
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Filter directive used when `RUST_LOG` is not set (e.g. `siumai_exec=debug`)
    pub level: String,
    pub format: OutputFormat,
    /// Include the emitting thread name (shows I/O workers vs the serializer)
    pub thread_names: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: "siumai_exec=info".to_string(),
            format: OutputFormat::Compact,
            thread_names: true,
        }
    }
}

impl TracingConfig {
    pub fn debug() -> Self {
        Self {
            level: "siumai_exec=debug".to_string(),
            ..Default::default()
        }
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }
}

/// Install a global fmt subscriber. Fails (without panicking) when a global
/// subscriber is already set or the filter directive is invalid.
pub fn init_tracing(config: &TracingConfig) -> Result<(), ClientError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            ClientError::ConfigurationError(format!("Invalid tracing filter '{}': {e}", config.level))
        })?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(config.thread_names);

    let result = match config.format {
        OutputFormat::Compact => builder.compact().try_init(),
        OutputFormat::Pretty => builder.pretty().try_init(),
        OutputFormat::Json => builder.json().try_init(),
    };
    result.map_err(|e| ClientError::ConfigurationError(format!("Failed to install tracing subscriber: {e}")))
}

/// Mask a credential, keeping a short prefix and suffix for correlation.
pub fn mask_sensitive_value(value: &str) -> String {
    if let Some(token) = value.strip_prefix("Bearer ") {
        return format!("Bearer {}", mask_token(token));
    }
    mask_token(value)
}

fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        return "***".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// Render headers as JSON for a log record, masking credentials.
pub fn format_headers_for_logging(headers: &HeaderMap) -> String {
    let map: std::collections::BTreeMap<&str, String> = headers
        .iter()
        .map(|(k, v)| {
            let value = v.to_str().unwrap_or("<binary>");
            let name = k.as_str();
            let masked = if v.is_sensitive()
                || name.contains("authorization")
                || name.contains("key")
                || name.contains("token")
            {
                mask_sensitive_value(value)
            } else {
                value.to_string()
            };
            (name, masked)
        })
        .collect();
    serde_json::to_string(&map).unwrap_or_else(|_| format!("{map:?}"))
}
