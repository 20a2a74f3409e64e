use serde::de::DeserializeOwned;
use tracing::instrument;

use crate::{Error, GalaxyClient};

impl GalaxyClient {
    /// Workflow invocation details
    #[instrument(skip(self), fields(galaxy_url = %self.url()))]
    pub async fn invocation<R>(&self, invocation_id: &str) -> Result<R, Error>
    where
        R: DeserializeOwned,
    {
        self.get(&format!("api/invocations/{invocation_id}")).await
    }
}
