//! Fan-out hub for live dashboard viewers
//!
//! The hub decouples the rate and reliability of ingestion from the rate
//! and reliability of viewer delivery. It runs as an independent async task
//! owning the set of connected viewer sessions; registration,
//! deregistration and broadcast all flow through its channels, so the
//! session set is never touched from two tasks at once.
//!
//! ```text
//!  IngestPipeline ──broadcast (bounded, drop on full)──┐
//!                                                      ▼
//!  ViewerSession ──register/unregister──────────► FanoutHub ──► per-session
//!                                                      │        buffers
//!                                       housekeeping tick (30s)
//! ```
//!
//! Backpressure policy: the broadcast queue is bounded and a full queue
//! drops the event (logged and counted) instead of blocking the producer.
//! A viewer whose own buffer is gone or full is evicted in the same
//! delivery pass; the remaining viewers still receive the event.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument, warn};

use crate::{Alert, ReadingEvent, config::HubConfig};

/// Housekeeping tick: reports the session count, evicts nothing.
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(30);

/// Events delivered to dashboard viewers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEvent {
    Reading(ReadingEvent),
    Alert(Alert),
    Connected {
        message: String,
        server: String,
        time: String,
    },
}

impl OutboundEvent {
    /// One-time greeting sent right after a viewer registers.
    pub fn greeting() -> Self {
        OutboundEvent::Connected {
            message: String::from("WebSocket connected successfully"),
            server: String::from("wattgrid energy monitor"),
            time: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Capability of receiving realtime events. Implemented by [`HubHandle`];
/// the ingestion pipeline depends only on this trait, so tests can swap in
/// a recording double.
pub trait EventSink: Send + Sync {
    fn deliver_reading(&self, event: ReadingEvent);
    fn deliver_alert(&self, alert: Alert);
}

pub type SessionId = u64;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Hub-side handle to one viewer session: an id plus the sending half of
/// the session's delivery buffer. Dropping the sender ends the session's
/// write loop, which closes the transport.
#[derive(Debug)]
pub struct SessionHandle {
    pub id: SessionId,
    sender: mpsc::Sender<OutboundEvent>,
}

impl SessionHandle {
    /// Create a session handle plus the receiving end its write loop
    /// drains.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<OutboundEvent>) {
        let (sender, receiver) = mpsc::channel(buffer);
        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        (Self { id, sender }, receiver)
    }
}

#[derive(Debug)]
enum HubCommand {
    Register {
        session: SessionHandle,
    },
    Unregister {
        id: SessionId,
    },
    ViewerCount {
        respond_to: oneshot::Sender<usize>,
    },
}

/// Actor owning the viewer session set.
pub struct FanoutHub {
    sessions: HashMap<SessionId, mpsc::Sender<OutboundEvent>>,
    command_rx: mpsc::Receiver<HubCommand>,
    event_rx: mpsc::Receiver<OutboundEvent>,
}

impl FanoutHub {
    /// Create the hub and its handle without spawning it. Callers normally
    /// want [`HubHandle::spawn`].
    pub fn new(config: HubConfig) -> (HubHandle, FanoutHub) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (event_tx, event_rx) = mpsc::channel(config.broadcast_queue);

        let handle = HubHandle {
            command_tx,
            event_tx,
            dropped: Arc::new(AtomicU64::new(0)),
        };

        let hub = FanoutHub {
            sessions: HashMap::new(),
            command_rx,
            event_rx,
        };

        (handle, hub)
    }

    /// Run the actor's main loop.
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting fan-out hub");

        let mut housekeeping = tokio::time::interval(HOUSEKEEPING_INTERVAL);

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(HubCommand::Register { session }) => {
                            self.sessions.insert(session.id, session.sender);
                            info!("viewer registered, {} active session(s)", self.sessions.len());
                        }

                        Some(HubCommand::Unregister { id }) => {
                            // safe to call for an already-absent session
                            if self.sessions.remove(&id).is_some() {
                                info!("viewer unregistered, {} active session(s)", self.sessions.len());
                            }
                        }

                        Some(HubCommand::ViewerCount { respond_to }) => {
                            let _ = respond_to.send(self.sessions.len());
                        }

                        None => {
                            warn!("hub handle dropped, shutting down");
                            break;
                        }
                    }
                }

                Some(event) = self.event_rx.recv() => {
                    self.deliver(event);
                }

                _ = housekeeping.tick() => {
                    if !self.sessions.is_empty() {
                        debug!("active viewer sessions: {}", self.sessions.len());
                    }
                }
            }
        }

        debug!("fan-out hub stopped");
    }

    /// Deliver one event to every registered session. A session whose
    /// buffer is closed or full is evicted in this same pass; delivery to
    /// the remaining sessions continues.
    fn deliver(&mut self, event: OutboundEvent) {
        let mut evicted = Vec::new();

        for (id, sender) in &self.sessions {
            match sender.try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!("viewer {id} cannot keep up, evicting");
                    evicted.push(*id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!("viewer {id} went away, evicting");
                    evicted.push(*id);
                }
            }
        }

        for id in evicted {
            self.sessions.remove(&id);
        }
    }
}

/// Cloneable handle for talking to the hub.
#[derive(Clone)]
pub struct HubHandle {
    command_tx: mpsc::Sender<HubCommand>,
    event_tx: mpsc::Sender<OutboundEvent>,
    dropped: Arc<AtomicU64>,
}

impl HubHandle {
    /// Spawn the hub actor and return its handle.
    pub fn spawn(config: HubConfig) -> Self {
        let (handle, hub) = FanoutHub::new(config);
        tokio::spawn(hub.run());
        handle
    }

    pub async fn register(&self, session: SessionHandle) {
        let _ = self
            .command_tx
            .send(HubCommand::Register { session })
            .await;
    }

    pub async fn unregister(&self, id: SessionId) {
        let _ = self.command_tx.send(HubCommand::Unregister { id }).await;
    }

    /// Number of currently connected viewers.
    pub async fn viewer_count(&self) -> usize {
        let (tx, rx) = oneshot::channel();
        if self
            .command_tx
            .send(HubCommand::ViewerCount { respond_to: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    /// Enqueue an event for delivery to every viewer. Never blocks: a full
    /// queue drops the event, logged and counted.
    pub fn broadcast(&self, event: OutboundEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!("broadcast queue full, dropping event ({dropped} dropped so far)");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("hub stopped, dropping event");
            }
        }
    }

    /// Broadcasts dropped because the queue was full or the hub was gone.
    pub fn dropped_broadcasts(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl EventSink for HubHandle {
    fn deliver_reading(&self, event: ReadingEvent) {
        self.broadcast(OutboundEvent::Reading(event));
    }

    fn deliver_alert(&self, alert: Alert) {
        self.broadcast(OutboundEvent::Alert(alert));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DeviceState;

    fn test_event(device_id: &str) -> OutboundEvent {
        OutboundEvent::Reading(ReadingEvent {
            device_id: device_id.to_string(),
            device_name: device_id.to_string(),
            voltage: 230.0,
            current: 5.0,
            power: 1150.0,
            energy: 0.5,
            frequency: 50.0,
            power_factor: 0.95,
            status: DeviceState::Online,
            timestamp_ms: 1_700_000_000_000,
        })
    }

    async fn recv_device_id(rx: &mut mpsc::Receiver<OutboundEvent>) -> String {
        let event = tokio::time::timeout(Duration::from_millis(500), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("session channel closed");
        match event {
            OutboundEvent::Reading(reading) => reading.device_id,
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_session() {
        let hub = HubHandle::spawn(HubConfig::default());

        let (session_a, mut rx_a) = SessionHandle::channel(8);
        let (session_b, mut rx_b) = SessionHandle::channel(8);
        hub.register(session_a).await;
        hub.register(session_b).await;
        // command-channel roundtrip so both registrations are processed
        assert_eq!(hub.viewer_count().await, 2);

        hub.broadcast(test_event("dev1"));

        assert_eq!(recv_device_id(&mut rx_a).await, "dev1");
        assert_eq!(recv_device_id(&mut rx_b).await, "dev1");
    }

    #[tokio::test]
    async fn test_dead_session_is_evicted_without_disturbing_others() {
        let hub = HubHandle::spawn(HubConfig::default());

        let (session_a, mut rx_a) = SessionHandle::channel(8);
        let (session_b, rx_b) = SessionHandle::channel(8);
        hub.register(session_a).await;
        hub.register(session_b).await;
        assert_eq!(hub.viewer_count().await, 2);

        // B's transport is gone
        drop(rx_b);

        hub.broadcast(test_event("dev1"));
        assert_eq!(recv_device_id(&mut rx_a).await, "dev1");

        // eviction happened inside the same delivery pass
        assert_eq!(hub.viewer_count().await, 1);

        hub.broadcast(test_event("dev2"));
        assert_eq!(recv_device_id(&mut rx_a).await, "dev2");
    }

    #[tokio::test]
    async fn test_slow_session_is_evicted_once_buffer_fills() {
        let hub = HubHandle::spawn(HubConfig::default());

        // buffer of one and nobody draining it
        let (session_slow, _rx_slow) = SessionHandle::channel(1);
        let (session_ok, mut rx_ok) = SessionHandle::channel(8);
        hub.register(session_slow).await;
        hub.register(session_ok).await;
        assert_eq!(hub.viewer_count().await, 2);

        hub.broadcast(test_event("dev1"));
        hub.broadcast(test_event("dev2"));

        assert_eq!(recv_device_id(&mut rx_ok).await, "dev1");
        assert_eq!(recv_device_id(&mut rx_ok).await, "dev2");
        assert_eq!(hub.viewer_count().await, 1);
    }

    #[tokio::test]
    async fn test_unregister_absent_session_is_a_noop() {
        let hub = HubHandle::spawn(HubConfig::default());

        let (session, _rx) = SessionHandle::channel(8);
        let id = session.id;
        hub.register(session).await;

        hub.unregister(id).await;
        hub.unregister(id).await;

        assert_eq!(hub.viewer_count().await, 0);
    }

    #[tokio::test]
    async fn test_full_broadcast_queue_drops_without_blocking() {
        // hub is constructed but never run, so nothing drains the queue
        let (handle, _hub) = FanoutHub::new(HubConfig {
            broadcast_queue: 2,
            session_buffer: 8,
        });

        handle.broadcast(test_event("dev1"));
        handle.broadcast(test_event("dev2"));
        assert_eq!(handle.dropped_broadcasts(), 0);

        // queue is at capacity; this one is dropped, and broadcast returns
        // immediately instead of waiting for space
        handle.broadcast(test_event("dev3"));
        assert_eq!(handle.dropped_broadcasts(), 1);

        handle.broadcast(test_event("dev4"));
        assert_eq!(handle.dropped_broadcasts(), 2);
    }

    #[tokio::test]
    async fn test_greeting_serializes_with_type_tag() {
        let json = serde_json::to_value(OutboundEvent::greeting()).unwrap();
        assert_eq!(json["type"], "connected");
        assert_eq!(json["message"], "WebSocket connected successfully");
    }

    #[tokio::test]
    async fn test_reading_event_serializes_flat() {
        let json = serde_json::to_value(test_event("dev1")).unwrap();
        assert_eq!(json["type"], "reading");
        assert_eq!(json["device_id"], "dev1");
        assert_eq!(json["status"], "online");
        assert_eq!(json["timestamp_ms"], 1_700_000_000_000i64);
    }
}
