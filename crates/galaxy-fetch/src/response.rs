//! Fetch response types

use std::fmt;

use bytes::Bytes;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::json::Decoded;
use crate::transport::BodyStream;

static JSON_CONTENT_TYPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^application/(?:[A-Za-z0-9_!#$%&*.^`~-]*\+)?json(;.+)?$")
        .expect("valid content type regex")
});

/// Media types decoded as text besides `text/*`
const TEXT_TYPES: [&str; 4] = [
    "image/svg",
    "application/xml",
    "application/xhtml",
    "application/html",
];

/// Statuses that never carry a body
pub const NULL_BODY_STATUSES: [u16; 4] = [101, 204, 205, 304];

/// How the response body is decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    /// Text run through the safe JSON decoder
    Json,
    /// UTF-8 text
    Text,
    /// Opaque bytes
    Blob,
    /// Opaque bytes
    ArrayBuffer,
    /// The body byte stream, not read
    Stream,
}

/// Pick the decoding for a `content-type` header value
///
/// A missing content type is decoded as JSON; the decoder hands back plain
/// text when the body is not JSON.
pub fn detect_response_type(content_type: &str) -> ResponseType {
    if content_type.is_empty() {
        return ResponseType::Json;
    }
    let media_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if JSON_CONTENT_TYPE_RE.is_match(&media_type) {
        return ResponseType::Json;
    }

    let is_text_type = TEXT_TYPES.iter().any(|text_type| {
        media_type
            .strip_prefix(text_type)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('+'))
    });
    if is_text_type || media_type.starts_with("text/") {
        return ResponseType::Text;
    }

    ResponseType::Blob
}

/// Decoded response body
#[derive(Default)]
pub enum ResponseData {
    /// No body was read (null-body status or `HEAD`)
    #[default]
    None,
    /// Output of the JSON decoder or a custom parser
    Json(Decoded),
    /// Text body
    Text(String),
    /// Binary body
    Blob(Bytes),
    /// Unread body stream
    Stream(BodyStream),
}

impl fmt::Debug for ResponseData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseData::None => f.write_str("None"),
            ResponseData::Json(decoded) => f.debug_tuple("Json").field(decoded).finish(),
            ResponseData::Text(text) => f.debug_tuple("Text").field(text).finish(),
            ResponseData::Blob(bytes) => f.debug_tuple("Blob").field(&bytes.len()).finish(),
            ResponseData::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl ResponseData {
    /// The body as a JSON value
    ///
    /// Text bodies become JSON strings; binary bodies and streams have no JSON
    /// form.
    pub fn to_json(&self) -> Option<Value> {
        match self {
            ResponseData::None => Some(Value::Null),
            ResponseData::Json(decoded) => Some(decoded.to_value()),
            ResponseData::Text(text) => Some(Value::String(text.clone())),
            ResponseData::Blob(_) | ResponseData::Stream(_) => None,
        }
    }

    /// Deserialize the body into `R`
    pub fn deserialize<R: DeserializeOwned>(&self) -> Result<R, serde_json::Error> {
        match self.to_json() {
            Some(value) => serde_json::from_value(value),
            None => Err(serde::de::Error::custom(
                "binary or streamed body cannot be deserialized",
            )),
        }
    }

    /// Text of a text or decoded JSON string body
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseData::Text(text) => Some(text),
            ResponseData::Json(decoded) => decoded.as_str(),
            _ => None,
        }
    }

    /// Bytes of a binary body
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            ResponseData::Blob(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Whether no body was read
    pub fn is_none(&self) -> bool {
        matches!(self, ResponseData::None)
    }
}

/// Response with its decoded body
pub struct FetchResponse {
    status: StatusCode,
    status_text: String,
    headers: HeaderMap,
    url: String,
    data: ResponseData,
}

impl fmt::Debug for FetchResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchResponse")
            .field("status", &self.status)
            .field("url", &self.url)
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}

impl FetchResponse {
    /// Create a new response
    pub fn new(status: StatusCode, headers: HeaderMap, url: String, data: ResponseData) -> Self {
        Self {
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            status,
            headers,
            url,
            data,
        }
    }

    /// HTTP status
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Reason phrase of the status
    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Response headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// `content-type` header, if present and valid text
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    /// URL the response came from
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Decoded body
    pub fn data(&self) -> &ResponseData {
        &self.data
    }

    /// Mutable decoded body, for response hooks
    pub fn data_mut(&mut self) -> &mut ResponseData {
        &mut self.data
    }

    /// Take the decoded body, leaving [`ResponseData::None`]
    pub fn take_data(&mut self) -> ResponseData {
        std::mem::take(&mut self.data)
    }

    /// Consume the response and return the decoded body
    pub fn into_data(self) -> ResponseData {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_detect_json_family() {
        assert_eq!(detect_response_type(""), ResponseType::Json);
        assert_eq!(detect_response_type("application/json"), ResponseType::Json);
        assert_eq!(
            detect_response_type("application/json; charset=utf-8"),
            ResponseType::Json
        );
        assert_eq!(
            detect_response_type("application/vnd.api+json"),
            ResponseType::Json
        );
        assert_eq!(detect_response_type("Application/JSON"), ResponseType::Json);
    }

    #[test]
    fn test_detect_text_family() {
        assert_eq!(detect_response_type("text/plain"), ResponseType::Text);
        assert_eq!(detect_response_type("text/html; charset=utf-8"), ResponseType::Text);
        assert_eq!(detect_response_type("application/xml"), ResponseType::Text);
        assert_eq!(detect_response_type("image/svg+xml"), ResponseType::Text);
        assert_eq!(detect_response_type("application/xhtml+xml"), ResponseType::Text);
    }

    #[test]
    fn test_detect_blob() {
        assert_eq!(detect_response_type("application/octet-stream"), ResponseType::Blob);
        assert_eq!(detect_response_type("image/png"), ResponseType::Blob);
        assert_eq!(detect_response_type("application/xmlfoo"), ResponseType::Blob);
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Version {
        version_major: String,
    }

    #[test]
    fn test_response_data_deserialize() {
        let data = ResponseData::Json(Decoded::Value(json!({"version_major": "24.1"})));
        let version: Version = data.deserialize().expect("valid body");
        assert_eq!(version.version_major, "24.1");

        let data = ResponseData::Text("plain".to_string());
        let text: String = data.deserialize().expect("text body");
        assert_eq!(text, "plain");

        let data = ResponseData::Blob(Bytes::from_static(b"\x00\x01"));
        assert!(data.deserialize::<Value>().is_err());
    }

    #[test]
    fn test_fetch_response_accessors() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, "text/plain".parse().expect("valid header"));
        let mut response = FetchResponse::new(
            StatusCode::OK,
            headers,
            "http://localhost/".to_string(),
            ResponseData::Text("ok".to_string()),
        );
        assert!(response.is_success());
        assert_eq!(response.status_text(), "OK");
        assert_eq!(response.content_type(), Some("text/plain"));
        assert_eq!(response.data().as_text(), Some("ok"));
        assert!(matches!(response.take_data(), ResponseData::Text(_)));
        assert!(response.data().is_none());
    }
}
