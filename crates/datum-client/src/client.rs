//! Datum client implementation for the datum REST API.

use datum_core::error::{DatumError, DatumResult};
use datum_core::types::{Action, ActionHash, Datum, Record, RecordDetails};

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Client for a datum server.
///
/// Writes are authored by the agent the server runs as.
#[derive(Debug, Clone)]
pub struct DatumClient {
    client: Client,
    base_url: String,
}

/// Server health summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub agent: String,
    pub actions: usize,
    pub version: String,
}

#[derive(Debug, Deserialize)]
struct DeleteResponse {
    action_hash: ActionHash,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    datum_code: Option<String>,
}

impl DatumClient {
    /// Create a client for the server at `base_url`.
    pub fn new(base_url: &str) -> DatumResult<Self> {
        let base_url = base_url.trim_end_matches('/');
        if base_url.is_empty() {
            return Err(DatumError::Configuration(
                "base URL must not be empty".to_string(),
            ));
        }

        Ok(Self {
            client: Client::new(),
            base_url: base_url.to_string(),
        })
    }

    /// Create a client from `DATUM_BASE_URL`, defaulting to a local server.
    pub fn from_env() -> DatumResult<Self> {
        let base_url =
            std::env::var("DATUM_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(&base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> DatumResult<T> {
        let response = request
            .send()
            .await
            .map_err(|e| DatumError::api(format!("Failed to {}: {}", what, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), what, "Request rejected");
            let (message, code) = parse_error(&body);
            return Err(DatumError::from_http_response(
                status.as_u16(),
                &message,
                code.as_deref(),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| DatumError::api(format!("Failed to parse response: {}", e)))
    }

    /// Check server health.
    pub async fn health(&self) -> DatumResult<HealthStatus> {
        self.send(self.client.get(self.url("/health")), "check health")
            .await
    }

    /// Create a datum.
    pub async fn create(&self, datum: &Datum) -> DatumResult<Record> {
        self.send(
            self.client.post(self.url("/datums")).json(datum),
            "create datum",
        )
        .await
    }

    /// Get the record stored at exactly `hash`.
    pub async fn get_original(&self, hash: &ActionHash) -> DatumResult<Record> {
        self.send(
            self.client.get(self.url(&format!("/datums/{}", hash))),
            "get datum",
        )
        .await
    }

    /// Get the head of the chain containing `hash`.
    pub async fn get_latest(&self, hash: &ActionHash) -> DatumResult<Record> {
        self.send(
            self.client.get(self.url(&format!("/datums/{}/latest", hash))),
            "get latest datum",
        )
        .await
    }

    /// Get a record with its direct updates and deletes.
    pub async fn get_details(&self, hash: &ActionHash) -> DatumResult<RecordDetails> {
        self.send(
            self.client.get(self.url(&format!("/datums/{}/details", hash))),
            "get datum details",
        )
        .await
    }

    /// Revise `previous` in the chain rooted at `original`.
    pub async fn update(
        &self,
        original: &ActionHash,
        previous: &ActionHash,
        updated: &Datum,
    ) -> DatumResult<Record> {
        let body = json!({
            "previous_datum_hash": previous,
            "updated_datum": updated,
        });
        self.send(
            self.client
                .put(self.url(&format!("/datums/{}", original)))
                .json(&body),
            "update datum",
        )
        .await
    }

    /// Get every revision of the chain rooted at `original`.
    pub async fn get_all_revisions(&self, original: &ActionHash) -> DatumResult<Vec<Record>> {
        self.send(
            self.client
                .get(self.url(&format!("/datums/{}/revisions", original))),
            "get revisions",
        )
        .await
    }

    /// Mark `hash` deleted and return the delete action's hash.
    pub async fn delete(&self, hash: &ActionHash) -> DatumResult<ActionHash> {
        let response: DeleteResponse = self
            .send(
                self.client.delete(self.url(&format!("/datums/{}", hash))),
                "delete datum",
            )
            .await?;
        Ok(response.action_hash)
    }

    /// Get every delete marker for `hash`.
    pub async fn get_all_deletes(&self, hash: &ActionHash) -> DatumResult<Vec<Action>> {
        self.send(
            self.client.get(self.url(&format!("/datums/{}/deletes", hash))),
            "get deletes",
        )
        .await
    }

    /// Get the earliest delete marker for `hash`.
    pub async fn get_oldest_delete(&self, hash: &ActionHash) -> DatumResult<Action> {
        self.send(
            self.client
                .get(self.url(&format!("/datums/{}/deletes/oldest", hash))),
            "get oldest delete",
        )
        .await
    }
}

/// Pull the message and store error code out of a server error body,
/// falling back to the raw text.
fn parse_error(body: &str) -> (String, Option<String>) {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(response) => (response.error.message, response.error.datum_code),
        Err(_) => (body.to_string(), None),
    }
}
