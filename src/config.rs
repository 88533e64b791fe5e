use std::net::SocketAddr;

use tracing::trace;

use crate::util;

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    pub mqtt: MqttConfig,

    pub thresholds: Thresholds,

    pub liveness: LivenessConfig,

    pub hub: HubConfig,

    pub api: ApiConfig,

    /// Storage sink configuration (defaults to in-memory)
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub broker: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Channels carrying device telemetry; `+` wildcards are fine.
    pub topics: Vec<String>,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker: util::get_broker(),
            port: util::get_broker_port(),
            client_id: util::get_client_id(),
            username: util::get_mqtt_username(),
            password: util::get_mqtt_password(),
            topics: vec![String::from("wattgrid/energy/+")],
        }
    }
}

/// Safety limits a reading is evaluated against. Units: W, A, V.
#[derive(Debug, Clone, Copy, serde::Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub max_power: f64,
    pub max_current: f64,
    pub min_voltage: f64,
    pub max_voltage: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            max_power: 2200.0,
            max_current: 10.0,
            min_voltage: 200.0,
            max_voltage: 240.0,
        }
    }
}

#[derive(Debug, Clone, Copy, serde::Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    /// How often the registry sweeps for stale devices.
    pub sweep_interval_secs: u64,

    /// A device with no reading for longer than this is marked offline.
    pub staleness_window_ms: i64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 30,
            staleness_window_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, Copy, serde::Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Pending broadcasts the hub accepts before dropping new ones.
    pub broadcast_queue: usize,

    /// Per-viewer delivery buffer; a viewer that falls this far behind is
    /// evicted.
    pub session_buffer: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            broadcast_queue: 100,
            session_buffer: 64,
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Bind address (e.g., "0.0.0.0:8080")
    pub bind_addr: SocketAddr,

    /// Enable CORS for dashboard
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".parse().expect("valid default bind addr"),
            enable_cors: true,
        }
    }
}

/// Storage sink configuration
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory ring buffer (no persistence)
    Memory {
        #[serde(default = "default_memory_capacity")]
        capacity: usize,
    },
    // The production deployment points this at an external time-series
    // store; the hub only ever sees the StorageSink trait.
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Memory {
            capacity: default_memory_capacity(),
        }
    }
}

fn default_memory_capacity() -> usize {
    10_000
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|_| anyhow::anyhow!("Invalid configuration file provided!"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_limits() {
        let thresholds = Thresholds::default();
        assert_eq!(thresholds.max_power, 2200.0);
        assert_eq!(thresholds.max_current, 10.0);
        assert_eq!(thresholds.min_voltage, 200.0);
        assert_eq!(thresholds.max_voltage, 240.0);

        let liveness = LivenessConfig::default();
        assert_eq!(liveness.sweep_interval_secs, 30);
        assert_eq!(liveness.staleness_window_ms, 60_000);

        let hub = HubConfig::default();
        assert_eq!(hub.broadcast_queue, 100);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: Config = serde_json::from_str(
            r#"{
                "thresholds": { "max_power": 3500.0 },
                "storage": { "backend": "memory", "capacity": 500 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.thresholds.max_power, 3500.0);
        assert_eq!(config.thresholds.max_current, 10.0);
        assert!(matches!(
            config.storage,
            StorageConfig::Memory { capacity: 500 }
        ));
    }
}
