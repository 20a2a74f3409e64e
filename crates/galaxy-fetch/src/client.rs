//! Fetch client: the request pipeline

use std::sync::Arc;

use bytes::Bytes;
use reqwest::header::{HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;

use crate::backends::{ConnectionSettings, ReqwestTransport};
use crate::context::FetchContext;
use crate::error::{FetchError, TransportError};
use crate::json;
use crate::options::{Body, FetchOptions};
use crate::response::{
    detect_response_type, FetchResponse, ResponseData, ResponseType, NULL_BODY_STATUSES,
};
use crate::retry::{self, is_payload_method, Retry, RetryDecision};
use crate::transport::{Duplex, RequestBody, Transport, TransportRequest, TransportResponse};
use crate::url::{with_base, with_query};

/// Fetch client
///
/// Holds a transport and a set of default options applied to every call.
/// Cloning is cheap and clones share both.
#[derive(Debug, Clone)]
pub struct Fetch {
    transport: Arc<dyn Transport>,
    defaults: Arc<FetchOptions>,
}

impl Default for Fetch {
    fn default() -> Self {
        Self::new()
    }
}

/// A settled call, before the decoded body is handed out
struct Completed {
    method: Method,
    request: String,
    response: FetchResponse,
}

impl Fetch {
    /// Fetch client over a default reqwest transport
    pub fn new() -> Self {
        Self::with_transport(ReqwestTransport::new())
    }

    /// Create a new fetch client builder
    pub fn builder() -> FetchBuilder {
        FetchBuilder::default()
    }

    /// Fetch client over `transport`
    pub fn with_transport(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
            defaults: Arc::new(FetchOptions::default()),
        }
    }

    /// Default options of this client
    pub fn defaults(&self) -> &FetchOptions {
        &self.defaults
    }

    /// New client whose defaults are `defaults` layered over this client's
    ///
    /// This client is left untouched.
    pub fn create(&self, defaults: FetchOptions) -> Fetch {
        Fetch {
            transport: Arc::clone(&self.transport),
            defaults: Arc::new(defaults.merge(&self.defaults)),
        }
    }

    /// Send `request` straight to the transport, bypassing the pipeline
    pub async fn native(
        &self,
        request: TransportRequest,
    ) -> Result<TransportResponse, TransportError> {
        self.transport.send(request).await
    }

    /// Run the pipeline and return the response with its decoded body
    pub async fn fetch_raw(
        &self,
        target: impl Into<String>,
        options: FetchOptions,
    ) -> Result<FetchResponse, FetchError> {
        Ok(self.execute(target.into(), options).await?.response)
    }

    /// Run the pipeline and return only the decoded body
    pub async fn fetch_data(
        &self,
        target: impl Into<String>,
        options: FetchOptions,
    ) -> Result<ResponseData, FetchError> {
        Ok(self.fetch_raw(target, options).await?.into_data())
    }

    /// Run the pipeline and deserialize the decoded body into `R`
    pub async fn fetch<R>(
        &self,
        target: impl Into<String>,
        options: FetchOptions,
    ) -> Result<R, FetchError>
    where
        R: DeserializeOwned,
    {
        let Completed {
            method,
            request,
            response,
        } = self.execute(target.into(), options).await?;

        match response.data().deserialize() {
            Ok(data) => Ok(data),
            Err(err) => Err(FetchError::new(
                method,
                request,
                Some(response),
                Some(err.into()),
            )),
        }
    }

    async fn execute(
        &self,
        target: String,
        options: FetchOptions,
    ) -> Result<Completed, FetchError> {
        let mut request = target;
        let mut options = options.merge(&self.defaults);

        loop {
            let mut context = FetchContext::new(request, options);

            if let Some(hook) = context.options.on_request.clone() {
                hook.call(&mut context).await;
            }

            let failed = match self.attempt(&mut context).await {
                Ok(response) => {
                    context.response = Some(response);
                    if let Some(hook) = context.options.on_response.clone() {
                        hook.call(&mut context).await;
                    }
                    let error_status = context.response.as_ref().is_some_and(|response| {
                        (400..600).contains(&response.status().as_u16())
                    });
                    let failed =
                        error_status && !context.options.ignore_response_error.unwrap_or(false);
                    if failed {
                        if let Some(hook) = context.options.on_response_error.clone() {
                            hook.call(&mut context).await;
                        }
                    }
                    failed
                }
                Err(error) => {
                    tracing::debug!(url = %context.request, error = %error, "Request failed");
                    context.error = Some(error);
                    if let Some(hook) = context.options.on_request_error.clone() {
                        hook.call(&mut context).await;
                    }
                    true
                }
            };

            let method = context.options.method.clone().unwrap_or_default();

            if !failed {
                if let Some(response) = context.response.take() {
                    return Ok(Completed {
                        method,
                        request: context.request,
                        response,
                    });
                }
                context.error = Some(TransportError::Other(
                    "response was removed by a hook".to_string(),
                ));
            }

            match retry::decide(&context) {
                RetryDecision::Retry { remaining, delay } => {
                    tracing::warn!(
                        method = %method,
                        url = %context.request,
                        status = context.response.as_ref().map(|r| r.status().as_u16()),
                        remaining,
                        delay_ms = delay.map(|d| d.as_millis() as u64),
                        "Retrying request"
                    );
                    retry::backoff(delay).await;
                    request = context.request;
                    options = context.options;
                    options.retry = Some(Retry::Count(remaining));
                }
                RetryDecision::GiveUp => {
                    return Err(FetchError::new(
                        method,
                        context.request,
                        context.response,
                        context.error.map(Into::into),
                    ));
                }
            }
        }
    }

    /// Compose the URL, prepare the body, send and decode
    async fn attempt(&self, context: &mut FetchContext) -> Result<FetchResponse, TransportError> {
        if let Some(invalid) = &context.options.invalid {
            return Err(TransportError::Build(invalid.clone()));
        }

        let options = &mut context.options;
        let method = options.method.clone().unwrap_or_default();

        if let Some(base_url) = &options.base_url {
            context.request = with_base(&context.request, base_url);
        }
        if let Some(query) = options.combined_query() {
            context.request = with_query(&context.request, &query);
        }

        let body = if is_payload_method(&method) {
            prepare_body(options)?
        } else {
            None
        };

        let request = TransportRequest {
            method: method.clone(),
            url: context.request.clone(),
            headers: options.headers.clone(),
            body,
            duplex: options.duplex,
        };

        tracing::debug!(method = %method, url = %request.url, "Sending request");

        let response = retry::with_deadline(
            self.transport.send(request),
            options.signal.as_ref(),
            options.timeout,
        )
        .await?;

        // The timeout ends with the headers; the signal still covers the body
        retry::with_deadline(
            decode_response(response, &method, options, &context.request),
            options.signal.as_ref(),
            None,
        )
        .await
    }
}

/// Serialize JSON bodies and set the headers that go with them
fn prepare_body(options: &mut FetchOptions) -> Result<Option<RequestBody>, TransportError> {
    let Some(body) = options.body.as_ref().filter(|body| body.is_present()) else {
        return Ok(None);
    };

    let text = match body {
        Body::Text(text) => text.clone(),
        Body::Json(value) => {
            serde_json::to_string(value).map_err(|err| TransportError::Build(err.to_string()))?
        }
        Body::Bytes(bytes) => return Ok(Some(RequestBody::Bytes(bytes.clone()))),
        Body::Stream(stream) => {
            let stream = stream
                .take()
                .ok_or_else(|| TransportError::Body("stream body already consumed".to_string()))?;
            options.duplex.get_or_insert(Duplex::Half);
            return Ok(Some(RequestBody::Stream(stream)));
        }
    };

    if !options.headers.contains_key(CONTENT_TYPE) {
        options
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }
    if !options.headers.contains_key(ACCEPT) {
        options
            .headers
            .insert(ACCEPT, HeaderValue::from_static("application/json"));
    }
    options.body = Some(Body::Text(text.clone()));
    Ok(Some(RequestBody::Bytes(Bytes::from(text))))
}

/// Decode the body according to the response type
async fn decode_response(
    response: TransportResponse,
    method: &Method,
    options: &FetchOptions,
    request: &str,
) -> Result<FetchResponse, TransportError> {
    let TransportResponse {
        status,
        headers,
        url,
        body,
    } = response;
    let url = url.unwrap_or_else(|| request.to_string());

    let has_body = !body.is_empty()
        && !NULL_BODY_STATUSES.contains(&status.as_u16())
        && *method != Method::HEAD;
    if !has_body {
        return Ok(FetchResponse::new(status, headers, url, ResponseData::None));
    }

    let response_type = if options.parse_response.is_some() {
        ResponseType::Json
    } else {
        options.response_type.unwrap_or_else(|| {
            let content_type = headers
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default();
            detect_response_type(content_type)
        })
    };

    let data = match response_type {
        ResponseType::Json => {
            let text = body.text().await?;
            match &options.parse_response {
                Some(parse) => ResponseData::Json(parse(&text)),
                None => ResponseData::Json(json::decode(&text)),
            }
        }
        ResponseType::Text => ResponseData::Text(body.text().await?),
        ResponseType::Blob | ResponseType::ArrayBuffer => ResponseData::Blob(body.bytes().await?),
        ResponseType::Stream => ResponseData::Stream(body.into_stream()),
    };

    Ok(FetchResponse::new(status, headers, url, data))
}

/// Fetch client builder for configuring proxy and TLS settings
#[derive(Debug, Default)]
pub struct FetchBuilder {
    connection: ConnectionSettings,
    defaults: FetchOptions,
}

impl FetchBuilder {
    /// Accept invalid TLS certificates
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.connection.accept_invalid_certs = accept;
        self
    }

    /// Send every request through `url`
    pub fn proxy(mut self, url: url::Url) -> Self {
        self.connection.proxy = Some(url);
        self.connection.proxy_hosts = None;
        self
    }

    /// Send requests to hosts matching `pattern` through `url`
    pub fn proxy_with_matcher(mut self, url: url::Url, pattern: &str) -> Result<Self, TransportError> {
        let hosts = regex::Regex::new(pattern)
            .map_err(|err| TransportError::Proxy(format!("Invalid proxy pattern: {err}")))?;
        self.connection.proxy = Some(url);
        self.connection.proxy_hosts = Some(hosts);
        Ok(self)
    }

    /// Default options of the built client
    pub fn defaults(mut self, defaults: FetchOptions) -> Self {
        self.defaults = defaults;
        self
    }

    /// Build the fetch client
    pub fn build(self) -> Result<Fetch, TransportError> {
        let transport = ReqwestTransport::with_settings(self.connection)?;
        Ok(Fetch {
            transport: Arc::new(transport),
            defaults: Arc::new(self.defaults),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_with_proxy() {
        let proxy = url::Url::parse("http://localhost:8080").expect("valid url");
        let fetch = Fetch::builder().proxy(proxy).build();
        assert!(fetch.is_ok());
    }

    #[test]
    fn test_builder_with_proxy_matcher() {
        let proxy = url::Url::parse("http://localhost:8080").expect("valid url");
        let fetch = Fetch::builder()
            .danger_accept_invalid_certs(true)
            .proxy_with_matcher(proxy, r"\.onion$")
            .and_then(FetchBuilder::build);
        assert!(fetch.is_ok());
    }

    #[test]
    fn test_builder_invalid_proxy_pattern() {
        let proxy = url::Url::parse("http://localhost:8080").expect("valid url");
        let result = Fetch::builder().proxy_with_matcher(proxy, "[invalid");
        assert!(matches!(result, Err(TransportError::Proxy(_))));
    }

    #[test]
    fn test_create_layers_defaults() {
        let parent = Fetch::new().create(
            FetchOptions::new()
                .base_url("https://usegalaxy.org")
                .header("x-api-key", "parent"),
        );
        let child = parent.create(FetchOptions::new().header("x-api-key", "child"));

        assert_eq!(parent.defaults().headers["x-api-key"], "parent");
        assert_eq!(child.defaults().headers["x-api-key"], "child");
        assert_eq!(
            child.defaults().base_url.as_deref(),
            Some("https://usegalaxy.org")
        );
    }

    #[test]
    fn test_prepare_body_json_sets_headers() {
        let mut options = FetchOptions::new()
            .method("POST")
            .json(&serde_json::json!({"name": "x"}));
        let body = prepare_body(&mut options).expect("body prepared");
        assert!(matches!(body, Some(RequestBody::Bytes(ref b)) if b.as_ref() == br#"{"name":"x"}"#));
        assert_eq!(options.headers[CONTENT_TYPE], "application/json");
        assert_eq!(options.headers[ACCEPT], "application/json");
        assert!(matches!(options.body, Some(Body::Text(_))));
    }

    #[test]
    fn test_prepare_body_keeps_caller_headers() {
        let mut options = FetchOptions::new()
            .header("content-type", "text/plain")
            .header("accept", "*/*")
            .body("hello");
        prepare_body(&mut options).expect("body prepared");
        assert_eq!(options.headers[CONTENT_TYPE], "text/plain");
        assert_eq!(options.headers[ACCEPT], "*/*");
    }

    #[test]
    fn test_prepare_body_skips_empty() {
        let mut options = FetchOptions::new().body("");
        assert!(prepare_body(&mut options).expect("no body").is_none());
        assert!(!options.headers.contains_key(CONTENT_TYPE));
    }

    #[test]
    fn test_prepare_body_bytes_sent_raw() {
        let mut options = FetchOptions::new().body(vec![0u8, 1, 2]);
        let body = prepare_body(&mut options).expect("body prepared");
        assert!(matches!(body, Some(RequestBody::Bytes(ref b)) if b.len() == 3));
        assert!(!options.headers.contains_key(CONTENT_TYPE));
    }

    #[test]
    fn test_prepare_body_stream_sets_half_duplex() {
        let stream: crate::transport::BodyStream = Box::pin(futures::stream::empty());
        let mut options = FetchOptions::new().body(stream);
        let body = prepare_body(&mut options).expect("body prepared");
        assert!(matches!(body, Some(RequestBody::Stream(_))));
        assert_eq!(options.duplex, Some(Duplex::Half));

        let second = prepare_body(&mut options);
        assert!(matches!(second, Err(TransportError::Body(_))));
    }
}
