//! Visit counter: one operation, increment-and-persist under optimistic
//! concurrency.

pub mod errors;
pub mod service;

pub use errors::CounterError;
pub use service::{CounterService, CounterSnapshot};
