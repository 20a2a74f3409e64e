use serde::de::DeserializeOwned;
use tracing::instrument;

use crate::{Error, GalaxyClient};

impl GalaxyClient {
    /// Dataset details
    #[instrument(skip(self), fields(galaxy_url = %self.url()))]
    pub async fn dataset<R>(&self, dataset_id: &str) -> Result<R, Error>
    where
        R: DeserializeOwned,
    {
        self.get(&format!("api/datasets/{dataset_id}")).await
    }
}
