//! Server state management.

use std::sync::Arc;

use datum_core::config::StoreConfig;
use datum_core::error::DatumResult;
use datum_core::store::VersionedRecordStore;
use datum_core::types::AgentPubKey;

use crate::error::{ApiError, ApiResult};

/// Shared application state.
///
/// One server process acts as one agent: every write it performs is
/// authored by `agent`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<VersionedRecordStore>,
    pub agent: AgentPubKey,
}

impl AppState {
    /// Create a new application state over an existing store.
    pub fn new(store: Arc<VersionedRecordStore>, agent: AgentPubKey) -> Self {
        Self { store, agent }
    }

    /// Open the store described by `config`.
    pub fn from_config(config: &StoreConfig, agent: AgentPubKey) -> DatumResult<Self> {
        let store = VersionedRecordStore::open(config)?;
        Ok(Self::new(Arc::new(store), agent))
    }

    /// Agent key from `DATUM_AGENT`, or a fresh random one.
    pub fn agent_from_env() -> AgentPubKey {
        std::env::var("DATUM_AGENT")
            .ok()
            .filter(|agent| !agent.trim().is_empty())
            .map(AgentPubKey::from)
            .unwrap_or_else(|| AgentPubKey::from(uuid::Uuid::new_v4().to_string()))
    }

    /// Run a store operation on the blocking pool.
    pub async fn with_store<F, T>(&self, f: F) -> ApiResult<T>
    where
        F: FnOnce(&VersionedRecordStore, &AgentPubKey) -> DatumResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let state = self.clone();
        tokio::task::spawn_blocking(move || f(&state.store, &state.agent))
            .await
            .map_err(|e| ApiError::internal(format!("Store task failed: {}", e)))?
            .map_err(ApiError::from)
    }
}
