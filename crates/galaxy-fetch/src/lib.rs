//! Fetch pipeline for HTTP APIs
//!
//! A [`Fetch`] client merges per-call [`FetchOptions`] with its defaults,
//! composes the request URL from a base URL and query parameters, serializes
//! JSON bodies, sends the request through a [`Transport`] under an optional
//! timeout, and decodes the response according to its content type. Failed
//! attempts are retried according to the retry policy; once retries are
//! exhausted, every failure surfaces as a [`FetchError`] of the same shape.
//!
//! JSON bodies go through a lenient decoder ([`json::decode`]) that falls
//! back to plain text and drops `__proto__` keys.
//!
//! # Example
//!
//! ```no_run
//! use galaxy_fetch::{Fetch, FetchError, FetchOptions};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Version {
//!     version_major: String,
//! }
//!
//! async fn example() -> Result<Version, FetchError> {
//!     let fetch = Fetch::new().create(FetchOptions::new().base_url("https://usegalaxy.org"));
//!     fetch.fetch("api/version", FetchOptions::new().retry(2)).await
//! }
//! ```

mod backends;
mod client;
mod context;
mod error;
pub mod json;
mod options;
mod response;
pub mod retry;
mod transport;
pub mod url;

pub use backends::ReqwestTransport;
pub use client::{Fetch, FetchBuilder};
pub use context::{FetchContext, FnHook, Hook};
pub use error::{DecodeError, FetchError, FetchErrorCause, FetchErrorKind, TransportError};
pub use json::Decoded;
pub use options::{merge_headers, Body, FetchOptions, ResponseParser, StreamBody};
pub use response::{detect_response_type, FetchResponse, ResponseData, ResponseType};
pub use retry::Retry;
pub use transport::{
    BodyStream, Duplex, RequestBody, ResponseBody, Transport, TransportRequest, TransportResponse,
};

pub use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
pub use reqwest::{Method, StatusCode};
pub use tokio_util::sync::CancellationToken;
