use galaxy_fetch::FetchOptions;
use serde::de::DeserializeOwned;
use tracing::instrument;

use crate::{Error, GalaxyClient};

impl GalaxyClient {
    /// Tool description with its inputs and outputs
    #[instrument(skip(self), fields(galaxy_url = %self.url()))]
    pub async fn tool<R>(&self, tool_id: &str, version: &str) -> Result<R, Error>
    where
        R: DeserializeOwned,
    {
        self.call(
            &format!("api/tools/{tool_id}"),
            FetchOptions::new()
                .method("GET")
                .query("io_details", true)
                .query("version", version),
        )
        .await
    }
}
