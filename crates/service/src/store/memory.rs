use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use models::counter::CounterDocument;
use tokio::sync::RwLock;

use super::DocumentStore;
use crate::errors::StoreError;

#[derive(Default)]
struct Inner {
    docs: HashMap<String, CounterDocument>,
    version: u64,
}

impl Inner {
    fn next_etag(&mut self) -> String {
        self.version += 1;
        format!("\"{:016x}\"", self.version)
    }
}

/// In-process versioned document store.
///
/// Every write stamps a fresh `_etag`, so conditional replaces behave like the
/// remote store. Used for local runs and tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with one counter document.
    pub async fn seeded(id: &str, count: u64) -> Self {
        let store = Self::new();
        store.insert(CounterDocument::new(id, count)).await;
        store
    }

    /// Create or overwrite a document out-of-band, returning it with its new etag.
    pub async fn insert(&self, mut document: CounterDocument) -> CounterDocument {
        let mut inner = self.inner.write().await;
        document.etag = Some(inner.next_etag());
        inner.docs.insert(document.id.clone(), document.clone());
        document
    }

    /// Snapshot of a stored document.
    pub async fn get(&self, id: &str) -> Option<CounterDocument> {
        self.inner.read().await.docs.get(id).cloned()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn read_item(&self, id: &str, _partition_key: &str) -> Result<CounterDocument, StoreError> {
        self.get(id).await.ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn replace_item(
        &self,
        id: &str,
        _partition_key: &str,
        document: &CounterDocument,
        if_match: Option<&str>,
    ) -> Result<CounterDocument, StoreError> {
        let mut inner = self.inner.write().await;
        let current = inner.docs.get(id).ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if let Some(expected) = if_match {
            if current.etag.as_deref() != Some(expected) {
                return Err(StoreError::Conflict(id.to_string()));
            }
        }

        let mut stored = document.clone();
        stored.id = id.to_string();
        stored.etag = Some(inner.next_etag());
        inner.docs.insert(id.to_string(), stored.clone());
        Ok(stored)
    }
}
