pub mod api;
pub mod config;
pub mod hub;
pub mod ingest;
pub mod liveness;
pub mod mqtt;
pub mod storage;
pub mod thresholds;
pub mod util;

use serde::{Deserialize, Serialize};

/// One normalized telemetry sample from a device. Immutable once built by
/// the ingestion pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub device_id: String,
    /// Milliseconds since epoch. Not guaranteed monotonic across messages.
    pub timestamp_ms: i64,
    pub voltage: f64,
    pub current: f64,
    pub power: f64,
    pub energy: f64,
    pub frequency: f64,
    pub power_factor: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceState {
    Online,
    Offline,
}

impl std::fmt::Display for DeviceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceState::Online => write!(f, "online"),
            DeviceState::Offline => write!(f, "offline"),
        }
    }
}

/// Per-device liveness record. Exactly one per device id, owned by the
/// [`liveness::DeviceRegistry`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub device_id: String,
    pub device_name: String,
    pub status: DeviceState,
    pub last_seen: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    HighPower,
    HighCurrent,
    VoltageAbnormal,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertKind::HighPower => write!(f, "high_power"),
            AlertKind::HighCurrent => write!(f, "high_current"),
            AlertKind::VoltageAbnormal => write!(f, "voltage_abnormal"),
        }
    }
}

/// Threshold violation derived from a single reading. Never stored; lives
/// only for the duration of one broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub device_id: String,
    pub alert_type: AlertKind,
    pub message: String,
    pub threshold: f64,
    pub actual_value: f64,
    pub timestamp_ms: i64,
}

/// Realtime payload pushed to dashboard viewers: a reading merged with the
/// device's current liveness status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadingEvent {
    pub device_id: String,
    pub device_name: String,
    pub voltage: f64,
    pub current: f64,
    pub power: f64,
    pub energy: f64,
    pub frequency: f64,
    pub power_factor: f64,
    pub status: DeviceState,
    pub timestamp_ms: i64,
}

impl ReadingEvent {
    pub fn from_reading(reading: &Reading, status: DeviceState) -> Self {
        Self {
            device_id: reading.device_id.clone(),
            device_name: reading.device_id.clone(),
            voltage: reading.voltage,
            current: reading.current,
            power: reading.power,
            energy: reading.energy,
            frequency: reading.frequency,
            power_factor: reading.power_factor,
            status,
            timestamp_ms: reading.timestamp_ms,
        }
    }
}
