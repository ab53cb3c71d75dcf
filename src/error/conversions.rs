//! Type Conversions for ClientError
//!
//! From implementations for the error types of the crates the core builds on.

use super::types::ClientError;

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::TimeoutError(err.to_string())
        } else if err.is_connect() {
            Self::ConnectionError(err.to_string())
        } else {
            Self::HttpError(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_reqwest_connect_error() {
        let err: ClientError = reqwest::get("http://127.0.0.1:1/").await.unwrap_err().into();
        assert!(matches!(err, ClientError::ConnectionError(_)), "{err:?}");
    }

    #[test]
    fn test_from_reqwest_builder_error() {
        let err: ClientError = reqwest::Client::new()
            .get("not a url")
            .build()
            .unwrap_err()
            .into();
        assert!(matches!(err, ClientError::HttpError(_)), "{err:?}");
    }
}
