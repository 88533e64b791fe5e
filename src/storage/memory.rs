//! In-memory storage sink (no persistence)
//!
//! A ring buffer with a fixed capacity: when full, the oldest readings are
//! evicted. Useful for testing without an external store and for
//! deployments that only care about the live dashboard.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::trace;

use crate::Reading;

use super::error::StorageResult;
use super::sink::StorageSink;

pub struct MemorySink {
    readings: RwLock<VecDeque<Reading>>,
    capacity: usize,
}

impl MemorySink {
    pub fn new(capacity: usize) -> Self {
        Self {
            readings: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }
}

#[async_trait]
impl StorageSink for MemorySink {
    async fn append(&self, reading: &Reading) -> StorageResult<()> {
        let mut readings = self.readings.write().await;
        readings.push_back(reading.clone());
        while readings.len() > self.capacity {
            readings.pop_front();
        }
        trace!(
            "stored reading from {} ({} buffered)",
            reading.device_id,
            readings.len()
        );
        Ok(())
    }

    async fn range_query(&self, start_ms: i64, end_ms: i64) -> StorageResult<Vec<Reading>> {
        let readings = self.readings.read().await;
        Ok(readings
            .iter()
            .filter(|r| r.timestamp_ms >= start_ms && r.timestamp_ms <= end_ms)
            .cloned()
            .collect())
    }

    async fn latest_n(&self, n: usize) -> StorageResult<Vec<Reading>> {
        let readings = self.readings.read().await;
        Ok(readings.iter().rev().take(n).cloned().collect())
    }
}
