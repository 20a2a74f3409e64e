use galaxy_fetch::FetchOptions;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::instrument;

use crate::{Error, GalaxyClient};

#[derive(Serialize)]
struct Invocation<'a, I: ?Sized, P: ?Sized> {
    history_id: &'a str,
    inputs: &'a I,
    parameters: &'a P,
}

impl GalaxyClient {
    /// Workflow details
    #[instrument(skip(self), fields(galaxy_url = %self.url()))]
    pub async fn workflow<R>(&self, workflow_id: &str) -> Result<R, Error>
    where
        R: DeserializeOwned,
    {
        self.get(&format!("api/workflows/{workflow_id}")).await
    }

    /// Workflow in its exported (`.ga`) form
    #[instrument(skip(self), fields(galaxy_url = %self.url()))]
    pub async fn export_workflow<R>(&self, workflow_id: &str) -> Result<R, Error>
    where
        R: DeserializeOwned,
    {
        self.get(&format!("api/workflows/{workflow_id}/download"))
            .await
    }

    /// Workflows visible to the current user
    #[instrument(skip(self), fields(galaxy_url = %self.url()))]
    pub async fn workflows<R>(&self) -> Result<R, Error>
    where
        R: DeserializeOwned,
    {
        self.get("api/workflows").await
    }

    /// Run a workflow in a history
    #[instrument(skip(self, inputs, parameters), fields(galaxy_url = %self.url()))]
    pub async fn invoke_workflow<I, P, R>(
        &self,
        history_id: &str,
        workflow_id: &str,
        inputs: &I,
        parameters: &P,
    ) -> Result<R, Error>
    where
        I: Serialize + ?Sized,
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.call(
            &format!("api/workflows/{workflow_id}/invocations"),
            FetchOptions::new().method("POST").json(&Invocation {
                history_id,
                inputs,
                parameters,
            }),
        )
        .await
    }
}
