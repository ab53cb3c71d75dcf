//! Response decoding
//!
//! Turns status + headers + bytes into `Result<T, ClientError>`:
//! - non-2xx is always an `ApiError` carrying the status, whatever the body;
//! - a 2xx body that does not match `T` is a `DecodeError`, never a success.
//!
//! `ParsingOptions` relax content-type, empty-body and `null` handling but
//! never make a missing required field decode.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ClientError;
use crate::execution::http::RawResponse;
use crate::streaming::Frame;
use crate::types::ParsingOptions;

const MAX_ERROR_MESSAGE_CHARS: usize = 512;

/// Error object of the `{"error": {...}}` envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorPayload {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub param: Option<Value>,
    #[serde(default)]
    pub code: Option<Value>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Detailed(ApiErrorPayload),
    Message(String),
}

impl ApiErrorPayload {
    /// Extract the payload from an error envelope, if `value` is one.
    pub fn from_value(value: &Value) -> Option<Self> {
        value.get("error")?;
        let envelope: ErrorEnvelope = serde_json::from_value(value.clone()).ok()?;
        Some(match envelope.error {
            ErrorBody::Detailed(payload) => payload,
            ErrorBody::Message(message) => Self {
                message: Some(message),
                ..Default::default()
            },
        })
    }
}

/// Stateless decoder configured with the client's parsing options.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseDecoder {
    options: ParsingOptions,
}

impl ResponseDecoder {
    pub fn new(options: ParsingOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> ParsingOptions {
        self.options
    }

    /// Decode a post-processed one-shot response.
    pub fn decode<T: DeserializeOwned>(&self, response: &RawResponse) -> Result<T, ClientError> {
        let response = self.ensure_success(response)?;
        self.check_content_type(response.content_type())?;
        self.decode_bytes(&response.body)
    }

    /// Pass 2xx responses through, turn anything else into an `ApiError`.
    pub fn ensure_success<'r>(&self, response: &'r RawResponse) -> Result<&'r RawResponse, ClientError> {
        if response.is_success() {
            Ok(response)
        } else {
            Err(Self::api_error(response.status, &response.body))
        }
    }

    /// Decode one stream frame.
    ///
    /// A frame that does not decode as `T` but carries an error envelope is
    /// reported as an `ApiError` with the stream's status.
    pub fn decode_frame<T: DeserializeOwned>(
        &self,
        status: u16,
        frame: &Frame,
    ) -> Result<T, ClientError> {
        match self.decode_bytes(frame.data.as_bytes()) {
            Ok(value) => Ok(value),
            Err(err) => match Self::api_error_in(status, frame.data.as_bytes()) {
                Some(api) => Err(api),
                None => Err(err),
            },
        }
    }

    /// Build the `ApiError` for a non-2xx status from whatever body came back.
    pub fn api_error(status: u16, body: &[u8]) -> ClientError {
        let text = String::from_utf8_lossy(body);
        let trimmed = text.trim();
        let json: Option<Value> = serde_json::from_slice(body).ok();
        let payload = json.as_ref().and_then(ApiErrorPayload::from_value);

        let message = payload
            .and_then(|p| p.message)
            .filter(|m| !m.trim().is_empty())
            .or_else(|| {
                (!trimmed.is_empty())
                    .then(|| trimmed.chars().take(MAX_ERROR_MESSAGE_CHARS).collect())
            })
            .or_else(|| {
                reqwest::StatusCode::from_u16(status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| format!("HTTP {status}"));

        let details = json.or_else(|| (!trimmed.is_empty()).then(|| Value::String(text.to_string())));

        ClientError::ApiError {
            code: status,
            message,
            details,
        }
    }

    /// `Some(ApiError)` when `body` is an error envelope.
    pub(crate) fn api_error_in(status: u16, body: &[u8]) -> Option<ClientError> {
        let json: Value = serde_json::from_slice(body).ok()?;
        ApiErrorPayload::from_value(&json)?;
        Some(Self::api_error(status, body))
    }

    fn check_content_type(&self, content_type: Option<&str>) -> Result<(), ClientError> {
        if self.options.contains(ParsingOptions::LENIENT_CONTENT_TYPE) {
            return Ok(());
        }
        match content_type {
            Some(ct) if !ct.to_ascii_lowercase().contains("json") => Err(
                ClientError::DecodeError(format!("Unexpected content-type '{ct}' for JSON response")),
            ),
            _ => Ok(()),
        }
    }

    pub(crate) fn decode_bytes<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, ClientError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            if self.options.contains(ParsingOptions::EMPTY_BODY_AS_NULL) {
                return serde_json::from_value(Value::Null).map_err(decode_error);
            }
            return Err(ClientError::DecodeError("Empty response body".to_string()));
        }

        if self.options.contains(ParsingOptions::STRIP_NULL_FIELDS) {
            let mut value: Value = serde_json::from_slice(bytes).map_err(decode_error)?;
            strip_null_fields(&mut value);
            return serde_json::from_value(value).map_err(decode_error);
        }

        serde_json::from_slice(bytes).map_err(decode_error)
    }
}

fn decode_error(err: serde_json::Error) -> ClientError {
    ClientError::DecodeError(format!("Failed to decode response: {err}"))
}

fn strip_null_fields(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(strip_null_fields);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_null_fields),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{CONTENT_TYPE, HeaderValue};

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: String,
        #[serde(default)]
        tags: Vec<String>,
    }

    fn json_response(status: u16, body: &str) -> RawResponse {
        let mut resp = RawResponse::new(status, body.to_string());
        resp.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        resp
    }

    #[test]
    fn decodes_success_payload() {
        let item: Item = ResponseDecoder::default()
            .decode(&json_response(200, r#"{"id":"abc"}"#))
            .unwrap();
        assert_eq!(item.id, "abc");
    }

    #[test]
    fn missing_required_field_is_decode_error() {
        let err = ResponseDecoder::default()
            .decode::<Item>(&json_response(200, r#"{"name":"abc"}"#))
            .unwrap_err();
        assert!(matches!(err, ClientError::DecodeError(_)), "{err:?}");
    }

    #[test]
    fn relaxed_options_never_hide_missing_required_fields() {
        let all = ParsingOptions::LENIENT_CONTENT_TYPE
            | ParsingOptions::EMPTY_BODY_AS_NULL
            | ParsingOptions::STRIP_NULL_FIELDS;
        let err = ResponseDecoder::new(all)
            .decode::<Item>(&json_response(200, r#"{"id":null}"#))
            .unwrap_err();
        assert!(matches!(err, ClientError::DecodeError(_)));
    }

    #[test]
    fn non_2xx_is_api_error_regardless_of_body() {
        for body in [r#"{"error":"not_found"}"#, "<html>oops</html>", "", r#"{"id":"abc"}"#] {
            let err = ResponseDecoder::default()
                .decode::<Item>(&json_response(404, body))
                .unwrap_err();
            assert_eq!(err.status_code(), Some(404), "body: {body}");
        }
    }

    #[test]
    fn api_error_message_sources() {
        let err = ResponseDecoder::api_error(404, br#"{"error":"not_found"}"#);
        assert!(matches!(&err, ClientError::ApiError { message, .. } if message == "not_found"));

        let err = ResponseDecoder::api_error(
            400,
            br#"{"error":{"message":"bad model","type":"invalid_request_error","code":null}}"#,
        );
        assert!(matches!(&err, ClientError::ApiError { message, .. } if message == "bad model"));
        assert_eq!(err.details().unwrap()["error"]["type"], "invalid_request_error");

        let err = ResponseDecoder::api_error(502, b"");
        assert!(matches!(&err, ClientError::ApiError { message, details: None, .. } if message == "Bad Gateway"));

        let err = ResponseDecoder::api_error(500, b"upstream exploded");
        assert_eq!(err.details(), Some(&Value::String("upstream exploded".into())));
    }

    #[test]
    fn content_type_is_checked_unless_lenient() {
        let mut resp = RawResponse::new(200, r#"{"id":"abc"}"#);
        resp.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("text/html"));
        assert!(matches!(
            ResponseDecoder::default().decode::<Item>(&resp),
            Err(ClientError::DecodeError(_))
        ));
        let item: Item = ResponseDecoder::new(ParsingOptions::LENIENT_CONTENT_TYPE)
            .decode(&resp)
            .unwrap();
        assert_eq!(item.id, "abc");

        // No content-type header at all is accepted.
        let item: Item = ResponseDecoder::default()
            .decode(&RawResponse::new(200, r#"{"id":"x"}"#))
            .unwrap();
        assert_eq!(item.id, "x");
    }

    #[test]
    fn empty_body_policy() {
        let resp = json_response(200, "");
        assert!(ResponseDecoder::default().decode::<Option<Item>>(&resp).is_err());
        let out: Option<Item> = ResponseDecoder::new(ParsingOptions::EMPTY_BODY_AS_NULL)
            .decode(&resp)
            .unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn strip_null_fields_lets_defaults_apply() {
        let resp = json_response(200, r#"{"id":"a","tags":null}"#);
        assert!(ResponseDecoder::default().decode::<Item>(&resp).is_err());
        let item: Item = ResponseDecoder::new(ParsingOptions::STRIP_NULL_FIELDS)
            .decode(&resp)
            .unwrap();
        assert_eq!(item, Item { id: "a".into(), tags: vec![] });
    }

    #[test]
    fn frame_with_error_envelope_is_api_error() {
        let frame = Frame::new(r#"{"error":{"message":"overloaded","type":"server_error"}}"#);
        let err = ResponseDecoder::default()
            .decode_frame::<Item>(200, &frame)
            .unwrap_err();
        assert_eq!(err.status_code(), Some(200));

        let err = ResponseDecoder::default()
            .decode_frame::<Item>(200, &Frame::new("{not json"))
            .unwrap_err();
        assert!(matches!(err, ClientError::DecodeError(_)));
    }
}
