//! API shared state

use std::sync::Arc;

use crate::{hub::HubHandle, liveness::DeviceRegistry, storage::StorageSink};

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Device liveness registry for status queries
    pub registry: DeviceRegistry,

    /// Handle to the fan-out hub (viewer registration + stats)
    pub hub: HubHandle,

    /// Storage sink for historical queries
    pub storage: Arc<dyn StorageSink>,

    /// Per-viewer delivery buffer size for new sessions
    pub session_buffer: usize,
}
