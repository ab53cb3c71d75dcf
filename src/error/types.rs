//! Core error types.

use thiserror::Error;

/// Coarse classification of a [`ClientError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Connection failure, timeout, DNS or other network-level failure.
    Transport,
    /// Non-2xx response from the API.
    Api,
    /// Body did not match the expected schema.
    Decode,
    /// Malformed stream or abrupt close without the terminal marker.
    Stream,
    /// Cancellation reported as an error (opt-in).
    Cancellation,
    /// Invalid configuration or request construction input.
    Configuration,
    /// Invariant violation inside the core.
    Internal,
}

/// Errors surfaced by the execution core.
///
/// Nothing in this core is fatal to the process: every failure is delivered
/// to the caller as one of these values.
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    /// Could not reach the server (DNS, refused, reset during connect).
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The request did not complete within the configured timeout.
    #[error("Timeout error: {0}")]
    TimeoutError(String),

    /// Any other transport-level failure (broken body stream, protocol error).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Non-2xx response, carrying the original status code.
    #[error("API error {code}: {message}")]
    ApiError {
        code: u16,
        message: String,
        /// Parsed JSON body (or raw text) when available.
        details: Option<serde_json::Value>,
    },

    /// A 2xx body (or stream frame) that does not match the expected schema.
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Stream framing failure, terminal for the session.
    #[error("Stream error: {0}")]
    StreamError(String),

    /// The call was cancelled and the client asked for cancellation to be
    /// reported as an error.
    #[error("Request cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ClientError {
    /// Build an API error without details.
    pub fn api_error(code: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Build an API error carrying the response body.
    pub fn api_error_with_details(
        code: u16,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self::ApiError {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConnectionError(_) | Self::TimeoutError(_) | Self::HttpError(_) => {
                ErrorCategory::Transport
            }
            Self::ApiError { .. } => ErrorCategory::Api,
            Self::DecodeError(_) => ErrorCategory::Decode,
            Self::StreamError(_) => ErrorCategory::Stream,
            Self::Cancelled => ErrorCategory::Cancellation,
            Self::ConfigurationError(_) | Self::InvalidInput(_) => ErrorCategory::Configuration,
            Self::InternalError(_) => ErrorCategory::Internal,
        }
    }

    /// HTTP status of an API error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::ApiError { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        self.category() == ErrorCategory::Transport
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Details attached to an API error.
    pub fn details(&self) -> Option<&serde_json::Value> {
        match self {
            Self::ApiError { details, .. } => details.as_ref(),
            _ => None,
        }
    }
}
