//! Fetch error types

use std::time::Duration;

use reqwest::Method;
use serde_json::Value;
use thiserror::Error;

use crate::response::{FetchResponse, ResponseData};

/// Errors raised by a [`Transport`](crate::Transport) before a response was received
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),
    /// The attempt exceeded the configured timeout
    #[error("The operation was aborted due to timeout ({}ms)", .0.as_millis())]
    Timeout(Duration),
    /// Cancelled through the caller's cancellation token
    #[error("The operation was aborted")]
    Aborted,
    /// Reading or writing a body failed
    #[error("Body error: {0}")]
    Body(String),
    /// Proxy error
    #[error("Proxy error: {0}")]
    Proxy(String),
    /// The request could not be built (invalid URL, header or method)
    #[error("Request build error: {0}")]
    Build(String),
    /// Other error
    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(Duration::ZERO)
        } else if err.is_builder() {
            TransportError::Build(err.to_string())
        } else if err.is_connect() {
            TransportError::Connection(err.to_string())
        } else if err.is_body() || err.is_decode() {
            TransportError::Body(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

/// Errors from strict JSON decoding
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The text does not look like JSON
    #[error("Invalid JSON")]
    InvalidJson,
    /// The text contains a `__proto__` or `constructor` key
    #[error("Possible prototype pollution")]
    PrototypePollution,
    /// The text looks like JSON but does not parse
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// What made a fetch fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// The network call failed
    Transport,
    /// The attempt timed out
    Timeout,
    /// The caller cancelled the request
    Aborted,
    /// The server answered with a 4xx or 5xx status
    Status,
    /// The body could not be turned into the requested type
    Decode,
}

/// Underlying cause of a [`FetchError`]
#[derive(Debug, Error)]
pub enum FetchErrorCause {
    /// Transport failure
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Deserialization failure
    #[error(transparent)]
    Decode(#[from] serde_json::Error),
}

/// A failed fetch
///
/// Network failures and error statuses produce the same shape. The message
/// reads `[METHOD] "url": <status> <status text> <cause>`, with
/// `<no response>` in place of the status when nothing was received.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct FetchError {
    kind: FetchErrorKind,
    message: String,
    method: Method,
    request: String,
    response: Option<FetchResponse>,
    #[source]
    cause: Option<FetchErrorCause>,
}

impl FetchError {
    pub(crate) fn new(
        method: Method,
        request: String,
        response: Option<FetchResponse>,
        cause: Option<FetchErrorCause>,
    ) -> Self {
        let kind = match &cause {
            Some(FetchErrorCause::Transport(TransportError::Timeout(_))) => FetchErrorKind::Timeout,
            Some(FetchErrorCause::Transport(TransportError::Aborted)) => FetchErrorKind::Aborted,
            Some(FetchErrorCause::Transport(_)) => FetchErrorKind::Transport,
            Some(FetchErrorCause::Decode(_)) => FetchErrorKind::Decode,
            None => FetchErrorKind::Status,
        };

        let status = match &response {
            Some(response) => format!("{} {}", response.status().as_u16(), response.status_text()),
            None => "<no response>".to_string(),
        };
        let detail = cause
            .as_ref()
            .map(|cause| format!(" {cause}"))
            .unwrap_or_default();
        let message = format!(
            "[{}] {}: {}{}",
            method,
            Value::String(request.clone()),
            status,
            detail
        );

        Self {
            kind,
            message,
            method,
            request,
            response,
            cause,
        }
    }

    /// What made the fetch fail
    pub fn kind(&self) -> FetchErrorKind {
        self.kind
    }

    /// Full error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Request method
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Final request URL
    pub fn request(&self) -> &str {
        &self.request
    }

    /// The response, when one was received
    pub fn response(&self) -> Option<&FetchResponse> {
        self.response.as_ref()
    }

    /// Take ownership of the response
    pub fn into_response(self) -> Option<FetchResponse> {
        self.response
    }

    /// Underlying cause
    pub fn cause(&self) -> Option<&FetchErrorCause> {
        self.cause.as_ref()
    }

    /// HTTP status code, when a response was received
    pub fn status(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.status().as_u16())
    }

    /// HTTP status text, when a response was received
    pub fn status_text(&self) -> Option<&str> {
        self.response.as_ref().map(FetchResponse::status_text)
    }

    /// Decoded error body, when a response was received
    pub fn data(&self) -> Option<&ResponseData> {
        self.response.as_ref().map(FetchResponse::data)
    }
}
