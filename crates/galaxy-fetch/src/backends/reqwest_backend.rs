//! reqwest-based Transport implementation

use futures::{StreamExt, TryStreamExt};
use regex::Regex;

use crate::error::TransportError;
use crate::transport::{RequestBody, ResponseBody, Transport, TransportRequest, TransportResponse};

/// reqwest-based transport
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    inner: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with a default reqwest client
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport from a configured reqwest::Client
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { inner: client }
    }

    /// Create a transport with its own TLS and proxy setup
    pub(crate) fn with_settings(settings: ConnectionSettings) -> Result<Self, TransportError> {
        let mut builder =
            reqwest::Client::builder().danger_accept_invalid_certs(settings.accept_invalid_certs);

        match (settings.proxy, settings.proxy_hosts) {
            (Some(proxy), Some(hosts)) => {
                let proxy = proxy.to_string();
                builder = builder.proxy(reqwest::Proxy::custom(move |target| {
                    target
                        .host_str()
                        .filter(|host| hosts.is_match(host))
                        .map(|_| proxy.clone())
                }));
            }
            (Some(proxy), None) => {
                let proxy = reqwest::Proxy::all(proxy.as_str())
                    .map_err(|err| TransportError::Proxy(err.to_string()))?;
                builder = builder.proxy(proxy);
            }
            (None, _) => {}
        }

        Ok(Self::from_client(builder.build()?))
    }
}

/// TLS and proxy setup of a [`ReqwestTransport`]
#[derive(Debug, Clone, Default)]
pub(crate) struct ConnectionSettings {
    pub(crate) accept_invalid_certs: bool,
    pub(crate) proxy: Option<url::Url>,
    /// Only hosts matching this pattern go through the proxy
    pub(crate) proxy_hosts: Option<Regex>,
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = self
            .inner
            .request(request.method, request.url.as_str())
            .headers(request.headers);

        // reqwest sends a streamed body completely before reading the
        // response, which is the only duplex mode there is
        builder = match request.body {
            Some(RequestBody::Bytes(bytes)) => builder.body(bytes),
            Some(RequestBody::Stream(stream)) => builder.body(reqwest::Body::wrap_stream(stream)),
            None => builder,
        };

        let response = builder.send().await.map_err(TransportError::from)?;

        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().to_string();
        let body = response
            .bytes_stream()
            .map_err(TransportError::from)
            .boxed();

        Ok(TransportResponse {
            status,
            headers,
            url: Some(url),
            body: ResponseBody::Stream(body),
        })
    }
}
