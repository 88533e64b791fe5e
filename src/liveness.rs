//! Device liveness tracking
//!
//! There is no out-of-band heartbeat protocol: arrival of any valid reading
//! counts as a heartbeat. A periodic sweep transitions devices to offline
//! once they have been silent for longer than the staleness window; a new
//! reading is the only thing that brings them back online. Records are
//! process-lifetime state and are never garbage collected.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{DeviceState, DeviceStatus, config::LivenessConfig, util};

#[derive(Debug, Clone)]
pub struct DeviceRegistry {
    devices: Arc<RwLock<HashMap<String, DeviceStatus>>>,
    staleness_window_ms: i64,
}

impl DeviceRegistry {
    pub fn new(config: LivenessConfig) -> Self {
        Self {
            devices: Arc::new(RwLock::new(HashMap::new())),
            staleness_window_ms: config.staleness_window_ms,
        }
    }

    /// Upsert the device's record with the current wall-clock time.
    pub async fn touch(&self, device_id: &str, status: DeviceState) {
        let mut devices = self.devices.write().await;
        devices.insert(
            device_id.to_string(),
            DeviceStatus {
                device_id: device_id.to_string(),
                device_name: device_id.to_string(),
                status,
                last_seen: util::now_ms(),
            },
        );
        debug!("device status updated: {device_id} -> {status}");
    }

    /// Mark every online device that has been silent past the staleness
    /// window as offline. The only path that ever sets a device offline.
    pub async fn sweep(&self) {
        self.sweep_at(util::now_ms()).await;
    }

    pub async fn sweep_at(&self, now_ms: i64) {
        let mut devices = self.devices.write().await;
        for status in devices.values_mut() {
            if now_ms - status.last_seen > self.staleness_window_ms
                && status.status == DeviceState::Online
            {
                status.status = DeviceState::Offline;
                warn!(
                    "device {} is now offline (no data for {}ms)",
                    status.device_id, self.staleness_window_ms
                );
            }
        }
    }

    pub async fn get(&self, device_id: &str) -> Option<DeviceStatus> {
        let devices = self.devices.read().await;
        devices.get(device_id).cloned()
    }

    pub async fn get_all(&self) -> Vec<DeviceStatus> {
        let devices = self.devices.read().await;
        devices.values().cloned().collect()
    }

    pub async fn device_count(&self) -> usize {
        let devices = self.devices.read().await;
        devices.len()
    }
}

/// Spawn the periodic staleness sweep.
pub fn spawn_sweeper(registry: DeviceRegistry, config: LivenessConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(config.sweep_interval_secs));
        loop {
            ticker.tick().await;
            registry.sweep().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> DeviceRegistry {
        DeviceRegistry::new(LivenessConfig::default())
    }

    #[tokio::test]
    async fn test_touch_creates_online_record() {
        let registry = registry();
        registry.touch("dev1", DeviceState::Online).await;

        let status = registry.get("dev1").await.unwrap();
        assert_eq!(status.status, DeviceState::Online);
        assert_eq!(status.device_id, "dev1");
        assert!(status.last_seen > 0);
    }

    #[tokio::test]
    async fn test_get_unknown_device_returns_none() {
        assert!(registry().get("ghost").await.is_none());
    }

    #[tokio::test]
    async fn test_sweep_within_window_keeps_device_online() {
        let registry = registry();
        registry.touch("dev1", DeviceState::Online).await;

        registry.sweep_at(util::now_ms() + 30_000).await;

        let status = registry.get("dev1").await.unwrap();
        assert_eq!(status.status, DeviceState::Online);
    }

    #[tokio::test]
    async fn test_sweep_past_window_marks_device_offline() {
        let registry = registry();
        registry.touch("dev1", DeviceState::Online).await;

        registry.sweep_at(util::now_ms() + 61_000).await;

        let status = registry.get("dev1").await.unwrap();
        assert_eq!(status.status, DeviceState::Offline);
    }

    #[tokio::test]
    async fn test_sweep_never_revives_a_device() {
        let registry = registry();
        registry.touch("dev1", DeviceState::Online).await;
        registry.sweep_at(util::now_ms() + 61_000).await;

        // a later sweep inside the window must not flip it back
        registry.sweep_at(util::now_ms()).await;

        let status = registry.get("dev1").await.unwrap();
        assert_eq!(status.status, DeviceState::Offline);
    }

    #[tokio::test]
    async fn test_new_reading_brings_device_back_online() {
        let registry = registry();
        registry.touch("dev1", DeviceState::Online).await;
        registry.sweep_at(util::now_ms() + 61_000).await;

        registry.touch("dev1", DeviceState::Online).await;

        let status = registry.get("dev1").await.unwrap();
        assert_eq!(status.status, DeviceState::Online);
    }

    #[tokio::test]
    async fn test_duplicate_touches_keep_single_record() {
        let registry = registry();
        registry.touch("dev1", DeviceState::Online).await;
        let first_seen = registry.get("dev1").await.unwrap().last_seen;

        registry.touch("dev1", DeviceState::Online).await;

        let all = registry.get_all().await;
        assert_eq!(all.len(), 1);
        assert!(registry.get("dev1").await.unwrap().last_seen >= first_seen);
    }

    #[tokio::test]
    async fn test_get_all_snapshots_every_device() {
        let registry = registry();
        registry.touch("dev1", DeviceState::Online).await;
        registry.touch("dev2", DeviceState::Online).await;

        let mut ids: Vec<String> = registry
            .get_all()
            .await
            .into_iter()
            .map(|s| s.device_id)
            .collect();
        ids.sort();

        assert_eq!(ids, vec!["dev1", "dev2"]);
        assert_eq!(registry.device_count().await, 2);
    }

    #[tokio::test]
    async fn test_concurrent_touches_are_safe() {
        let registry = registry();

        let mut tasks = vec![];
        for _ in 0..16 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                registry.touch("dev1", DeviceState::Online).await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(registry.device_count().await, 1);
        assert_eq!(
            registry.get("dev1").await.unwrap().status,
            DeviceState::Online
        );
    }
}
