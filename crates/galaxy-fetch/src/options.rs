//! Request options and how they merge with client defaults

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::context::{FnHook, FetchContext, Hook};
use crate::json::Decoded;
use crate::response::ResponseType;
use crate::retry::Retry;
use crate::transport::{BodyStream, Duplex};
use crate::url::{Query, QueryValue};

/// Custom response parser; forces the JSON decoding path
pub type ResponseParser = Arc<dyn Fn(&str) -> Decoded + Send + Sync>;

/// Streamed request body
///
/// The stream is consumed by the first attempt that sends it. Clones share
/// the same stream.
#[derive(Clone)]
pub struct StreamBody(Arc<Mutex<Option<BodyStream>>>);

impl StreamBody {
    /// Wrap a stream
    pub fn new(stream: BodyStream) -> Self {
        Self(Arc::new(Mutex::new(Some(stream))))
    }

    /// Take the stream; `None` once an attempt has consumed it
    pub fn take(&self) -> Option<BodyStream> {
        self.0.lock().ok().and_then(|mut stream| stream.take())
    }

    /// Whether an attempt already took the stream
    pub fn is_consumed(&self) -> bool {
        self.0.lock().map_or(true, |stream| stream.is_none())
    }
}

impl fmt::Debug for StreamBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StreamBody(..)")
    }
}

/// Request body
#[derive(Debug, Clone)]
pub enum Body {
    /// Text, sent as-is
    Text(String),
    /// Value serialized to JSON text on payload methods
    Json(Value),
    /// Binary body, sent as-is
    Bytes(Bytes),
    /// Streamed body
    Stream(StreamBody),
}

impl Body {
    /// Serialize `value` into a JSON body
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Body::Json(serde_json::to_value(value)?))
    }

    /// Form-urlencoded text body
    pub fn form<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_urlencoded::ser::Error> {
        Ok(Body::Text(serde_urlencoded::to_string(value)?))
    }

    /// An empty string, `null`, `false` or `0` does not count as a body
    pub(crate) fn is_present(&self) -> bool {
        match self {
            Body::Text(text) => !text.is_empty(),
            Body::Json(Value::Null) | Body::Json(Value::Bool(false)) => false,
            Body::Json(Value::String(s)) => !s.is_empty(),
            Body::Json(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
            _ => true,
        }
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Json(value)
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(Bytes::from(bytes))
    }
}

impl From<BodyStream> for Body {
    fn from(stream: BodyStream) -> Self {
        Body::Stream(StreamBody::new(stream))
    }
}

/// Request descriptor
///
/// Every field is optional so call options can be layered over client
/// defaults with [`FetchOptions::merge`].
#[derive(Clone, Default)]
pub struct FetchOptions {
    /// HTTP method; `GET` when unset
    pub method: Option<Method>,
    /// Base URL prepended to relative targets
    pub base_url: Option<String>,
    /// Headers
    pub headers: HeaderMap,
    /// Query parameters; win over `params`
    pub query: Option<Query>,
    /// Query parameters
    pub params: Option<Query>,
    /// Body
    pub body: Option<Body>,
    /// Explicit body decoding
    pub response_type: Option<ResponseType>,
    /// Custom response parser
    pub parse_response: Option<ResponseParser>,
    /// Per-attempt timeout; ignored when `signal` is set
    pub timeout: Option<Duration>,
    /// Retry count
    pub retry: Option<Retry>,
    /// Delay between attempts
    pub retry_delay: Option<Duration>,
    /// Statuses that are retried instead of the defaults
    pub retry_status_codes: Option<Vec<u16>>,
    /// Return 4xx and 5xx responses instead of failing
    pub ignore_response_error: Option<bool>,
    /// Runs before the request is built
    pub on_request: Option<Arc<dyn Hook>>,
    /// Runs when the transport fails
    pub on_request_error: Option<Arc<dyn Hook>>,
    /// Runs after the response body is decoded
    pub on_response: Option<Arc<dyn Hook>>,
    /// Runs when the response has an error status
    pub on_response_error: Option<Arc<dyn Hook>>,
    /// Stream transmission mode
    pub duplex: Option<Duplex>,
    /// Caller cancellation
    pub signal: Option<CancellationToken>,
    /// Set when a builder call was given an invalid method or header
    pub(crate) invalid: Option<String>,
}

impl fmt::Debug for FetchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchOptions")
            .field("method", &self.method)
            .field("base_url", &self.base_url)
            .field("headers", &self.headers)
            .field("query", &self.query)
            .field("params", &self.params)
            .field("body", &self.body)
            .field("response_type", &self.response_type)
            .field("parse_response", &self.parse_response.is_some())
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("retry_delay", &self.retry_delay)
            .field("retry_status_codes", &self.retry_status_codes)
            .field("ignore_response_error", &self.ignore_response_error)
            .field("duplex", &self.duplex)
            .field("signal", &self.signal.is_some())
            .finish_non_exhaustive()
    }
}

impl FetchOptions {
    /// Empty options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the method; lowercase names are uppercased
    pub fn method(mut self, method: impl AsRef<str>) -> Self {
        let upper = method.as_ref().to_ascii_uppercase();
        match Method::from_bytes(upper.as_bytes()) {
            Ok(method) => self.method = Some(method),
            Err(err) => self.invalid = Some(format!("invalid method {upper:?}: {err}")),
        }
        self
    }

    /// Set the base URL
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set a header, replacing previous values of the same name
    pub fn header(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let name = HeaderName::from_bytes(key.as_ref().as_bytes());
        let value = HeaderValue::from_str(value.as_ref());
        match (name, value) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            (Err(err), _) => self.invalid = Some(format!("invalid header name: {err}")),
            (_, Err(err)) => self.invalid = Some(format!("invalid header value: {err}")),
        }
        self
    }

    /// Set one query parameter
    pub fn query(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.query.get_or_insert_with(Query::new).insert(key, value);
        self
    }

    /// Set one `params` parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.params.get_or_insert_with(Query::new).insert(key, value);
        self
    }

    /// Set the body
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set a JSON body from any serializable value
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match Body::json(value) {
            Ok(body) => self.body = Some(body),
            Err(err) => self.invalid = Some(format!("body serialization failed: {err}")),
        }
        self
    }

    /// Set a form-urlencoded body and its content type
    pub fn form<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match Body::form(value) {
            Ok(body) => {
                self.body = Some(body);
                self = self.header("content-type", "application/x-www-form-urlencoded");
            }
            Err(err) => self.invalid = Some(format!("form serialization failed: {err}")),
        }
        self
    }

    /// Set the response type
    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = Some(response_type);
        self
    }

    /// Set a custom response parser
    pub fn parse_response<F>(mut self, parser: F) -> Self
    where
        F: Fn(&str) -> Decoded + Send + Sync + 'static,
    {
        self.parse_response = Some(Arc::new(parser));
        self
    }

    /// Set the per-attempt timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the retry count, or [`Retry::Disabled`]
    pub fn retry(mut self, retry: impl Into<Retry>) -> Self {
        self.retry = Some(retry.into());
        self
    }

    /// Set the delay between attempts
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Replace the retryable statuses
    pub fn retry_status_codes(mut self, codes: impl Into<Vec<u16>>) -> Self {
        self.retry_status_codes = Some(codes.into());
        self
    }

    /// Return error statuses as responses
    pub fn ignore_response_error(mut self, ignore: bool) -> Self {
        self.ignore_response_error = Some(ignore);
        self
    }

    /// Set the `on_request` hook
    pub fn on_request<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut FetchContext) + Send + Sync + 'static,
    {
        self.on_request = Some(Arc::new(FnHook(hook)));
        self
    }

    /// Set the `on_request_error` hook
    pub fn on_request_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut FetchContext) + Send + Sync + 'static,
    {
        self.on_request_error = Some(Arc::new(FnHook(hook)));
        self
    }

    /// Set the `on_response` hook
    pub fn on_response<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut FetchContext) + Send + Sync + 'static,
    {
        self.on_response = Some(Arc::new(FnHook(hook)));
        self
    }

    /// Set the `on_response_error` hook
    pub fn on_response_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut FetchContext) + Send + Sync + 'static,
    {
        self.on_response_error = Some(Arc::new(FnHook(hook)));
        self
    }

    /// Set the stream transmission mode
    pub fn duplex(mut self, duplex: Duplex) -> Self {
        self.duplex = Some(duplex);
        self
    }

    /// Cancel the request through `signal`
    pub fn signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Layer these options over `defaults`
    ///
    /// Fields set here win. `query` and `params` are merged key by key, and
    /// so are headers (names compared case-insensitively); in both cases the
    /// values set here replace the defaults.
    pub fn merge(self, defaults: &FetchOptions) -> FetchOptions {
        FetchOptions {
            method: self.method.or_else(|| defaults.method.clone()),
            base_url: self.base_url.or_else(|| defaults.base_url.clone()),
            headers: merge_headers(&defaults.headers, self.headers),
            query: merge_query(defaults.query.as_ref(), self.query),
            params: merge_query(defaults.params.as_ref(), self.params),
            body: self.body.or_else(|| defaults.body.clone()),
            response_type: self.response_type.or(defaults.response_type),
            parse_response: self
                .parse_response
                .or_else(|| defaults.parse_response.clone()),
            timeout: self.timeout.or(defaults.timeout),
            retry: self.retry.or(defaults.retry),
            retry_delay: self.retry_delay.or(defaults.retry_delay),
            retry_status_codes: self
                .retry_status_codes
                .or_else(|| defaults.retry_status_codes.clone()),
            ignore_response_error: self
                .ignore_response_error
                .or(defaults.ignore_response_error),
            on_request: self.on_request.or_else(|| defaults.on_request.clone()),
            on_request_error: self
                .on_request_error
                .or_else(|| defaults.on_request_error.clone()),
            on_response: self.on_response.or_else(|| defaults.on_response.clone()),
            on_response_error: self
                .on_response_error
                .or_else(|| defaults.on_response_error.clone()),
            duplex: self.duplex.or(defaults.duplex),
            signal: self.signal.or_else(|| defaults.signal.clone()),
            invalid: self.invalid.or_else(|| defaults.invalid.clone()),
        }
    }

    /// `params` then `query`, or `None` when neither is set
    pub(crate) fn combined_query(&self) -> Option<Query> {
        match (&self.params, &self.query) {
            (None, None) => None,
            (params, query) => {
                let mut combined = params.clone().unwrap_or_default();
                if let Some(query) = query {
                    combined.merge(query);
                }
                Some(combined)
            }
        }
    }
}

fn merge_query(defaults: Option<&Query>, input: Option<Query>) -> Option<Query> {
    match (defaults, input) {
        (Some(defaults), Some(input)) => {
            let mut merged = defaults.clone();
            merged.merge(&input);
            Some(merged)
        }
        (defaults, input) => input.or_else(|| defaults.cloned()),
    }
}

/// Headers of `input` replace same-named headers of `defaults`
pub fn merge_headers(defaults: &HeaderMap, input: HeaderMap) -> HeaderMap {
    let mut merged = defaults.clone();
    for name in input.keys() {
        merged.remove(name);
    }
    let mut current: Option<HeaderName> = None;
    for (name, value) in input {
        if let Some(name) = name {
            current = Some(name);
        }
        if let Some(name) = &current {
            merged.append(name.clone(), value);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use reqwest::header::{ACCEPT, CONTENT_TYPE};
    use serde_json::json;

    use super::*;

    #[test]
    fn test_method_is_uppercased() {
        let options = FetchOptions::new().method("post");
        assert_eq!(options.method, Some(Method::POST));
        let options = FetchOptions::new().method("purge");
        assert_eq!(options.method.as_ref().map(Method::as_str), Some("PURGE"));
    }

    #[test]
    fn test_invalid_header_is_recorded() {
        let options = FetchOptions::new().header("bad header", "x");
        assert!(options.invalid.is_some());
    }

    #[test]
    fn test_merge_plain_fields_call_wins() {
        let defaults = FetchOptions::new()
            .base_url("https://usegalaxy.org")
            .timeout(Duration::from_secs(5))
            .retry(3);
        let merged = FetchOptions::new().retry(0).merge(&defaults);
        assert_eq!(merged.base_url.as_deref(), Some("https://usegalaxy.org"));
        assert_eq!(merged.timeout, Some(Duration::from_secs(5)));
        assert_eq!(merged.retry, Some(Retry::Count(0)));
    }

    #[test]
    fn test_merge_query_union() {
        let defaults = FetchOptions::new().query("a", "1").query("b", "2");
        let merged = FetchOptions::new()
            .query("b", "3")
            .query("c", "4")
            .merge(&defaults);
        let query = merged.query.expect("merged query");
        assert_eq!(query.len(), 3);
        assert_eq!(query.get("a"), Some(&QueryValue::from("1")));
        assert_eq!(query.get("b"), Some(&QueryValue::from("3")));
        assert_eq!(query.get("c"), Some(&QueryValue::from("4")));
    }

    #[test]
    fn test_merge_query_only_in_defaults() {
        let defaults = FetchOptions::new().param("V", "dev");
        let merged = FetchOptions::new().merge(&defaults);
        assert_eq!(
            merged.params.and_then(|p| p.get("V").cloned()),
            Some(QueryValue::from("dev"))
        );
    }

    #[test]
    fn test_merge_headers_case_insensitive() {
        let defaults = FetchOptions::new()
            .header("X-API-Key", "default-key")
            .header("Accept", "application/json");
        let merged = FetchOptions::new()
            .header("x-api-key", "call-key")
            .header("Content-Type", "text/plain")
            .merge(&defaults);

        assert_eq!(merged.headers.len(), 3);
        assert_eq!(merged.headers["x-api-key"], "call-key");
        assert_eq!(merged.headers[ACCEPT], "application/json");
        assert_eq!(merged.headers[CONTENT_TYPE], "text/plain");
    }

    #[test]
    fn test_merge_headers_keeps_repeated_values() {
        let mut input = HeaderMap::new();
        input.append("x-tag", HeaderValue::from_static("a"));
        input.append("x-tag", HeaderValue::from_static("b"));
        let mut defaults = HeaderMap::new();
        defaults.insert("x-tag", HeaderValue::from_static("z"));

        let merged = merge_headers(&defaults, input);
        let values: Vec<_> = merged.get_all("x-tag").iter().collect();
        assert_eq!(values, vec!["a", "b"]);
    }

    #[test]
    fn test_combined_query_prefers_query() {
        let options = FetchOptions::new().param("a", "1").param("b", "1").query("a", "2");
        let combined = options.combined_query().expect("combined");
        assert_eq!(combined.get("a"), Some(&QueryValue::from("2")));
        assert_eq!(combined.get("b"), Some(&QueryValue::from("1")));
        assert!(FetchOptions::new().combined_query().is_none());
    }

    #[test]
    fn test_body_presence() {
        assert!(!Body::from("").is_present());
        assert!(!Body::Json(Value::Null).is_present());
        assert!(!Body::Json(json!(0)).is_present());
        assert!(Body::Json(json!({})).is_present());
        assert!(Body::from("name=x").is_present());
    }

    #[test]
    fn test_form_body() {
        let options = FetchOptions::new().form(&[("name", "my history")]);
        assert!(matches!(options.body, Some(Body::Text(ref t)) if t == "name=my+history"));
        assert_eq!(
            options.headers[CONTENT_TYPE],
            "application/x-www-form-urlencoded"
        );
    }

    #[test]
    fn test_stream_body_is_taken_once() {
        let stream: BodyStream = Box::pin(futures::stream::empty());
        let body = StreamBody::new(stream);
        let clone = body.clone();
        assert!(body.take().is_some());
        assert!(clone.take().is_none());
    }
}
