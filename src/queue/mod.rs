//! Queue processor: claims staged patches one at a time and commits them to
//! the remote store with a bounded number of inline attempts.
//!
//! Only one processing loop runs per engine. A failed commit keeps its patch
//! staged and leaves a [`RetrySnapshot`]; it is never retried in the
//! background.

mod engine;
mod retry;

pub use engine::{AutosaveEngine, EngineParts, ProcessOutcome};
pub use retry::RetrySnapshot;
