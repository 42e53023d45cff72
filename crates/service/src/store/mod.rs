//! Document store abstraction.
//!
//! A store addresses documents by id and partition key, signals a missing
//! document distinctly, and can make a replace conditional on the version
//! token (`_etag`) returned by a previous read.

use async_trait::async_trait;
use models::counter::CounterDocument;

use crate::errors::StoreError;

pub mod cosmos;
pub mod memory;

pub use cosmos::CosmosStore;
pub use memory::MemoryStore;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Point-read a document.
    async fn read_item(&self, id: &str, partition_key: &str) -> Result<CounterDocument, StoreError>;

    /// Replace the full document at `id`. With `if_match`, the write only
    /// succeeds if the stored version still equals it; otherwise
    /// [`StoreError::Conflict`].
    async fn replace_item(
        &self,
        id: &str,
        partition_key: &str,
        document: &CounterDocument,
        if_match: Option<&str>,
    ) -> Result<CounterDocument, StoreError>;
}
