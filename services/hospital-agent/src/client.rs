//! World model HTTP client.
//!
//! Implements [`WorldModelGateway`] over the world model's JSON API:
//! - `POST /register`
//! - `GET /snapshot/{entity_id}`
//! - `POST /accept-person`, `/service-done`, `/person-death`
//!
//! Every request carries the configured timeout so a slow world model never
//! stalls the caller indefinitely.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use triage_id::{EntityId, PersonId};

use crate::config::Config;
use crate::error::GatewayError;
use crate::gateway::{
    PersonsDecision, PersonsRequest, RegisterRequest, Registration, WorldModelGateway,
};
use crate::model::Snapshot;

/// World model API client.
pub struct WorldModelClient {
    client: reqwest::Client,
    base_url: String,
}

impl WorldModelClient {
    /// Create a new world model client.
    pub fn new(config: &Config) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: config.world_model_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, GatewayError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.post(&url).json(body).send().await?;
        Self::decode(&url, response).await
    }

    async fn decode<R: DeserializeOwned>(
        url: &str,
        response: reqwest::Response,
    ) -> Result<R, GatewayError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            debug!(url = %url, status = %status, body = %body, "World model request failed");
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            debug!(url = %url, error = %e, "Malformed world model response");
            GatewayError::Malformed(e.to_string())
        })
    }

    async fn post_persons(
        &self,
        path: &str,
        entity_id: EntityId,
        persons: &[PersonId],
    ) -> Result<PersonsDecision, GatewayError> {
        let request = PersonsRequest {
            entity_id,
            persons_id: persons.to_vec(),
        };
        debug!(path, count = persons.len(), "Reporting persons");

        let decision: PersonsDecision = self.post(path, &request).await?;
        debug!(
            path,
            accepted = decision.accepted.len(),
            rejected = decision.rejected.len(),
            "World model answered"
        );
        Ok(decision)
    }
}

#[async_trait]
impl WorldModelGateway for WorldModelClient {
    async fn register(&self, request: &RegisterRequest) -> Result<Registration, GatewayError> {
        debug!(name = %request.eav.name, "Registering facility");
        self.post("/register", request).await
    }

    async fn fetch_snapshot(&self, entity_id: EntityId) -> Result<Snapshot, GatewayError> {
        let url = format!("{}/snapshot/{}", self.base_url, entity_id);
        debug!(url = %url, "Fetching snapshot");

        let response = self.client.get(&url).send().await?;
        let snapshot: Snapshot = Self::decode(&url, response).await?;
        debug!(
            snapshot_id = %snapshot.id,
            person_count = snapshot.persons.len(),
            "Fetched snapshot"
        );
        Ok(snapshot)
    }

    async fn accept_persons(
        &self,
        entity_id: EntityId,
        persons: &[PersonId],
    ) -> Result<PersonsDecision, GatewayError> {
        self.post_persons("/accept-person", entity_id, persons).await
    }

    async fn report_service_done(
        &self,
        entity_id: EntityId,
        persons: &[PersonId],
    ) -> Result<PersonsDecision, GatewayError> {
        self.post_persons("/service-done", entity_id, persons).await
    }

    async fn report_death(
        &self,
        entity_id: EntityId,
        persons: &[PersonId],
    ) -> Result<PersonsDecision, GatewayError> {
        self.post_persons("/person-death", entity_id, persons).await
    }
}
