use models::counter::CounterId;
use tracing::{debug, info, instrument, warn};

use super::errors::CounterError;
use crate::errors::StoreError;
use crate::retry::RetryPolicy;
use crate::runtime::StoreHandle;

/// Post-increment state of the counter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub id: String,
    pub count: u64,
}

/// Increments the counter document with a compare-and-swap on its `_etag`.
///
/// Stateless between calls; safe to share across concurrent requests.
#[derive(Clone, Debug)]
pub struct CounterService {
    store: StoreHandle,
    retry: RetryPolicy,
}

impl CounterService {
    pub fn new(store: StoreHandle, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    /// Read, add one, and conditionally replace. A version conflict restarts
    /// the whole cycle until the retry budget is spent.
    #[instrument(skip(self, id), fields(counter_id = %id))]
    pub async fn increment(&self, id: &CounterId) -> Result<CounterSnapshot, CounterError> {
        let store = self.store.get()?;
        let attempts = self.retry.max_attempts();

        for attempt in 0..attempts {
            if attempt > 0 {
                self.retry.wait_before_retry(attempt).await;
            }

            let mut doc = store.read_item(id.as_str(), id.partition_key()).await?;
            let etag = doc
                .etag
                .clone()
                .ok_or_else(|| CounterError::Unknown("document has no version token".into()))?;
            let previous = doc.current_count();
            let expected = doc
                .increment()
                .ok_or_else(|| CounterError::Unknown(format!("count {previous} cannot be incremented")))?;

            match store.replace_item(id.as_str(), id.partition_key(), &doc, Some(&etag)).await {
                Ok(updated) => {
                    let count = updated
                        .count
                        .ok_or_else(|| CounterError::Unknown("replaced document has no count".into()))?;
                    if count != expected {
                        warn!(expected, count, "store returned a different count than written");
                        return Err(CounterError::Unknown(format!(
                            "store returned count {count}, expected {expected}"
                        )));
                    }
                    info!(count, attempt = attempt + 1, "counter incremented");
                    return Ok(CounterSnapshot { id: updated.id, count });
                }
                Err(StoreError::Conflict(_)) => {
                    debug!(attempt = attempt + 1, previous, "version conflict, retrying");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(attempts, "conflict retries exhausted");
        Err(CounterError::ConflictRetryExhausted { attempts })
    }
}
