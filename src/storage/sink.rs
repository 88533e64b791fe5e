//! Storage sink trait definition

use async_trait::async_trait;

use crate::Reading;

use super::error::StorageResult;

/// Append/query contract against the external time-series store.
///
/// Implementations must be `Send + Sync`; every method is async so a real
/// client can go over the network. Appends are best-effort from the
/// caller's point of view: the ingestion pipeline logs a failure and moves
/// on, so implementations should do their own limited retrying (the
/// production client reconnects and retries exactly once on a dead
/// session) rather than rely on redelivery.
#[async_trait]
pub trait StorageSink: Send + Sync {
    /// Persist one reading.
    async fn append(&self, reading: &Reading) -> StorageResult<()>;

    /// Readings with `start_ms <= timestamp_ms <= end_ms`, oldest first.
    async fn range_query(&self, start_ms: i64, end_ms: i64) -> StorageResult<Vec<Reading>>;

    /// The `n` most recent readings, newest first.
    async fn latest_n(&self, n: usize) -> StorageResult<Vec<Reading>>;
}
