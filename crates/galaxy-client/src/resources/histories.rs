use galaxy_fetch::{FetchOptions, ResponseData};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::instrument;

use crate::{Error, GalaxyClient};

impl GalaxyClient {
    /// Create a history named `name`
    #[instrument(skip(self), fields(galaxy_url = %self.url()))]
    pub async fn create_history<R>(&self, name: &str) -> Result<R, Error>
    where
        R: DeserializeOwned,
    {
        self.call(
            "api/histories",
            FetchOptions::new().method("POST").form(&[("name", name)]),
        )
        .await
    }

    /// Delete and purge a history
    #[instrument(skip(self), fields(galaxy_url = %self.url()))]
    pub async fn delete_history<R>(&self, history_id: &str) -> Result<R, Error>
    where
        R: DeserializeOwned,
    {
        self.call(
            &format!("api/histories/{history_id}"),
            FetchOptions::new()
                .method("DELETE")
                .json(&json!({ "purge": true })),
        )
        .await
    }

    /// Histories of the current user
    #[instrument(skip(self), fields(galaxy_url = %self.url()))]
    pub async fn histories<R>(&self) -> Result<R, Error>
    where
        R: DeserializeOwned,
    {
        self.get("api/histories").await
    }

    /// History details
    #[instrument(skip(self), fields(galaxy_url = %self.url()))]
    pub async fn history<R>(&self, history_id: &str) -> Result<R, Error>
    where
        R: DeserializeOwned,
    {
        self.get(&format!("api/histories/{history_id}")).await
    }

    /// Upload the file at `src_url` into a history
    ///
    /// Galaxy fetches the URL itself and detects the datatype.
    #[instrument(skip(self), fields(galaxy_url = %self.url()))]
    pub async fn upload_file<R>(&self, history_id: &str, src_url: &str) -> Result<R, Error>
    where
        R: DeserializeOwned,
    {
        let payload = json!({
            "history_id": history_id,
            "targets": [{
                "destination": { "type": "hdas" },
                "elements": [{
                    "src": "url",
                    "url": src_url,
                    "name": null,
                    "dbkey": "?",
                    "ext": "auto",
                    "space_to_tab": false,
                    "to_posix_lines": true,
                }],
            }],
            "auto_decompress": true,
            "files": [],
        });

        self.call(
            "api/tools/fetch",
            FetchOptions::new().method("POST").json(&payload),
        )
        .await
    }

    /// Datasets and collections of a history
    #[instrument(skip(self), fields(galaxy_url = %self.url()))]
    pub async fn history_contents<R>(&self, history_id: &str) -> Result<R, Error>
    where
        R: DeserializeOwned,
    {
        self.call(
            &format!("api/histories/{history_id}/contents"),
            FetchOptions::new().method("GET").param("V", "dev"),
        )
        .await
    }

    /// Content of a dataset, decoded according to its content type
    #[instrument(skip(self), fields(galaxy_url = %self.url()))]
    pub async fn download_dataset(
        &self,
        history_id: &str,
        dataset_id: &str,
    ) -> Result<ResponseData, Error> {
        Ok(self
            .api()
            .fetch_data(
                format!("api/histories/{history_id}/contents/{dataset_id}/display"),
                FetchOptions::new().method("GET"),
            )
            .await?)
    }
}
