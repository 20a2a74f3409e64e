//! Galaxy API client

use std::time::Duration;

use galaxy_fetch::{Fetch, FetchOptions};
use serde::de::DeserializeOwned;
use tracing::instrument;

use crate::config::Settings;
use crate::types::GalaxyVersion;
use crate::Error;

/// Accept header sent with every call
const ACCEPT: &str = "application/json, text/plain, */*";

/// Galaxy API client
///
/// Every call goes through one [`Fetch`] whose defaults carry the server URL
/// and the API key.
#[derive(Debug, Clone)]
pub struct GalaxyClient {
    url: String,
    api: Fetch,
}

impl GalaxyClient {
    /// Client for the server at `url`, authenticated with `api_key`
    pub fn new(url: impl Into<String>, api_key: &str) -> Self {
        Self::with_fetch(Fetch::new(), url, api_key)
    }

    /// Client layered over an existing [`Fetch`]
    pub fn with_fetch(fetch: Fetch, url: impl Into<String>, api_key: &str) -> Self {
        let url = url.into();
        let api = fetch.create(default_options(&url, api_key));
        Self { url, api }
    }

    /// Client configured from [`Settings`]
    pub fn from_settings(settings: &Settings) -> Result<Self, Error> {
        let mut builder =
            Fetch::builder().danger_accept_invalid_certs(settings.http.danger_accept_invalid_certs);

        if let Some(proxy) = &settings.http.proxy {
            let proxy = url::Url::parse(proxy)?;
            builder = match &settings.http.proxy_pattern {
                Some(pattern) => builder.proxy_with_matcher(proxy, pattern)?,
                None => builder.proxy(proxy),
            };
        }

        let mut defaults = default_options(&settings.galaxy.url, &settings.galaxy.api_key);
        if let Some(timeout) = settings.http.timeout_ms {
            defaults = defaults.timeout(Duration::from_millis(timeout));
        }
        if let Some(retry) = settings.http.retry {
            defaults = defaults.retry(retry);
        }
        if let Some(delay) = settings.http.retry_delay_ms {
            defaults = defaults.retry_delay(Duration::from_millis(delay));
        }

        Ok(Self {
            url: settings.galaxy.url.clone(),
            api: builder.defaults(defaults).build()?,
        })
    }

    /// Galaxy server URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch client used for every call
    pub fn api(&self) -> &Fetch {
        &self.api
    }

    /// Version of the Galaxy server
    #[instrument(skip(self), fields(galaxy_url = %self.url))]
    pub async fn version(&self) -> Result<GalaxyVersion, Error> {
        self.get("/api/version").await
    }

    pub(crate) async fn get<R>(&self, path: &str) -> Result<R, Error>
    where
        R: DeserializeOwned,
    {
        self.call(path, FetchOptions::new().method("GET")).await
    }

    pub(crate) async fn call<R>(&self, path: &str, options: FetchOptions) -> Result<R, Error>
    where
        R: DeserializeOwned,
    {
        Ok(self.api.fetch(path, options).await?)
    }
}

fn default_options(url: &str, api_key: &str) -> FetchOptions {
    FetchOptions::new()
        .base_url(url)
        .header("x-api-key", api_key)
        .header("accept", ACCEPT)
}
