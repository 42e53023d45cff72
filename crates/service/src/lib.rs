//! Service layer for the visit counter.
//! - `store`: document store abstraction plus Cosmos DB and in-memory backends.
//! - `counter`: the optimistic-concurrency increment operation.
//! - `runtime`: process-wide store handle built once at startup.

pub mod counter;
pub mod errors;
pub mod retry;
pub mod runtime;
pub mod store;

pub use counter::{CounterError, CounterService, CounterSnapshot};
