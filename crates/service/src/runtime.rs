//! Process-wide document store handle.
//!
//! The store client is built once at startup. If that fails, the failure is
//! kept as the handle's state and reported on every call; initialization is
//! not attempted again per request.

use std::sync::Arc;

use configs::{StoreBackend, StoreConfig};
use tracing::{error, info};

use crate::counter::CounterError;
use crate::store::{CosmosStore, DocumentStore, MemoryStore};

#[derive(Clone)]
pub enum StoreHandle {
    Ready(Arc<dyn DocumentStore>),
    Unavailable(Arc<str>),
}

impl StoreHandle {
    pub fn ready(store: Arc<dyn DocumentStore>) -> Self {
        Self::Ready(store)
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(Arc::from(reason.into()))
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// The live store, or the sticky initialization failure.
    pub fn get(&self) -> Result<&Arc<dyn DocumentStore>, CounterError> {
        match self {
            Self::Ready(store) => Ok(store),
            Self::Unavailable(reason) => Err(CounterError::StoreUnavailable(reason.to_string())),
        }
    }
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(_) => f.write_str("StoreHandle::Ready"),
            Self::Unavailable(reason) => write!(f, "StoreHandle::Unavailable({reason})"),
        }
    }
}

/// Build the store for the configured backend. Never fails: a bad or
/// missing configuration yields [`StoreHandle::Unavailable`].
pub async fn connect_store(cfg: &StoreConfig) -> StoreHandle {
    match cfg.backend {
        StoreBackend::Memory => {
            let store = MemoryStore::seeded(&cfg.counter_id, 0).await;
            info!(counter_id = %cfg.counter_id, "using in-memory document store");
            StoreHandle::ready(Arc::new(store))
        }
        StoreBackend::Cosmos => match CosmosStore::from_config(cfg) {
            Ok(store) => {
                info!(
                    endpoint = cfg.endpoint.as_deref().unwrap_or_default(),
                    database = %cfg.database,
                    container = %cfg.container,
                    "document store client initialized"
                );
                StoreHandle::ready(Arc::new(store))
            }
            Err(e) => {
                error!(error = %e, "document store client initialization failed");
                StoreHandle::unavailable(e.to_string())
            }
        },
    }
}
