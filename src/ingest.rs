//! Ingestion pipeline
//!
//! The single choke point between untrusted transport payloads and every
//! internal side effect. Each inbound message is decoded, normalized,
//! validated and timestamped here before anything else sees it; a failure
//! at any of those steps drops that one message and nothing more.
//!
//! Persistence is best-effort: a storage failure is logged and the reading
//! still reaches the liveness registry and the viewers. The pipeline never
//! retries a message itself; redelivery is the transport's business, and
//! duplicate delivery is tolerated (two touches, two broadcasts, still one
//! liveness record).

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Deserialize;
use tracing::{debug, trace, warn};

use crate::{
    DeviceState, Reading, ReadingEvent, hub::EventSink, liveness::DeviceRegistry,
    storage::StorageSink, thresholds::ThresholdEvaluator, util,
};

/// Device id used when a payload does not carry one. Matches the id the
/// stock PZEM-004T firmware reports.
pub const FALLBACK_DEVICE_ID: &str = "ESP32_PZEM";

/// Civil-time format some firmware revisions put in the timestamp field.
const CIVIL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Numeric timestamps below this are seconds since epoch, not millis.
const MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

/// Raw wire shape of one telemetry message. Fields the device omits decode
/// to zero, mirroring what the firmware actually sends; validation rejects
/// the impossible combinations afterwards.
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryPayload {
    #[serde(default)]
    pub device_id: String,

    #[serde(default)]
    pub timestamp: Option<TimestampField>,

    #[serde(default)]
    pub voltage: f64,

    #[serde(default)]
    pub current: f64,

    #[serde(default)]
    pub power: f64,

    #[serde(default)]
    pub energy: f64,

    #[serde(default)]
    pub frequency: f64,

    /// Power factor; the firmware abbreviates the key.
    #[serde(default, alias = "power_factor")]
    pub pf: f64,
}

/// The timestamp field arrives either as a civil-time string or as an
/// epoch number, depending on firmware revision.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TimestampField {
    Text(String),
    Numeric(i64),
}

/// Resolve the canonical epoch-millisecond timestamp for a payload.
///
/// Precedence: a textual field is parsed against the civil-time format
/// (falling back to now on failure); otherwise a positive numeric field is
/// taken as seconds when below 10^12 and as milliseconds when above;
/// otherwise now.
pub fn resolve_timestamp(field: Option<&TimestampField>) -> i64 {
    match field {
        Some(TimestampField::Text(text)) => {
            match NaiveDateTime::parse_from_str(text, CIVIL_TIME_FORMAT) {
                Ok(parsed) => parsed.and_utc().timestamp_millis(),
                Err(e) => {
                    warn!("failed to parse timestamp {text:?}: {e}, using current time");
                    util::now_ms()
                }
            }
        }

        Some(TimestampField::Numeric(ts)) if *ts > 0 => {
            if *ts < MILLIS_THRESHOLD {
                ts * 1000
            } else {
                *ts
            }
        }

        _ => util::now_ms(),
    }
}

/// The ingestion pipeline and its collaborators. The hub is injected at
/// construction via [`EventSink`], so there is no late-bound broadcaster
/// and no "broadcaster not set" state.
#[derive(Clone)]
pub struct IngestPipeline {
    storage: Arc<dyn StorageSink>,
    registry: DeviceRegistry,
    evaluator: ThresholdEvaluator,
    events: Arc<dyn EventSink>,
}

impl IngestPipeline {
    pub fn new(
        storage: Arc<dyn StorageSink>,
        registry: DeviceRegistry,
        evaluator: ThresholdEvaluator,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            storage,
            registry,
            evaluator,
            events,
        }
    }

    /// Process one inbound transport message. Failures are terminal for
    /// this message only and never propagate upstream.
    pub async fn ingest(&self, topic: &str, payload: &[u8]) {
        trace!("message on {topic}: {} bytes", payload.len());

        let message: TelemetryPayload = match serde_json::from_slice(payload) {
            Ok(message) => message,
            Err(e) => {
                warn!("undecodable payload on {topic}: {e}");
                return;
            }
        };

        self.process(message).await;
    }

    /// Run a decoded payload through normalization, validation and every
    /// downstream side effect.
    pub async fn process(&self, message: TelemetryPayload) {
        let device_id = if message.device_id.is_empty() {
            debug!("payload carries no device id, defaulting to {FALLBACK_DEVICE_ID}");
            FALLBACK_DEVICE_ID.to_string()
        } else {
            message.device_id.clone()
        };

        let timestamp_ms = resolve_timestamp(message.timestamp.as_ref());

        // reject before any side effect
        if message.voltage <= 0.0 {
            warn!(
                "rejected reading from {device_id}: voltage {:.2} must be > 0",
                message.voltage
            );
            return;
        }
        if message.current < 0.0 {
            warn!(
                "rejected reading from {device_id}: current {:.3} must be >= 0",
                message.current
            );
            return;
        }
        if message.power < 0.0 {
            warn!(
                "rejected reading from {device_id}: power {:.2} must be >= 0",
                message.power
            );
            return;
        }

        let reading = Reading {
            device_id: device_id.clone(),
            timestamp_ms,
            voltage: message.voltage,
            current: message.current,
            power: message.power,
            energy: message.energy,
            frequency: message.frequency,
            power_factor: message.pf,
        };

        // best-effort: a storage failure must not stop liveness or fan-out
        if let Err(e) = self.storage.append(&reading).await {
            warn!("failed to persist reading from {device_id}: {e}");
        }

        self.registry.touch(&device_id, DeviceState::Online).await;

        if let Some(alert) = self.evaluator.evaluate(&reading) {
            debug!("alert for {device_id}: {}", alert.message);
            self.events.deliver_alert(alert);
        }

        let status = self
            .registry
            .get(&device_id)
            .await
            .map(|record| record.status)
            .unwrap_or(DeviceState::Online);

        self.events
            .deliver_reading(ReadingEvent::from_reading(&reading, status));
    }
}
