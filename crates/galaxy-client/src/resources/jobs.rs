use galaxy_fetch::FetchOptions;
use serde::de::DeserializeOwned;
use tracing::instrument;

use crate::{Error, GalaxyClient};

impl GalaxyClient {
    /// Full job details, including parameters, stdout and stderr
    #[instrument(skip(self), fields(galaxy_url = %self.url()))]
    pub async fn job<R>(&self, job_id: &str) -> Result<R, Error>
    where
        R: DeserializeOwned,
    {
        self.call(
            &format!("api/jobs/{job_id}"),
            FetchOptions::new().method("GET").query("full", true),
        )
        .await
    }
}
