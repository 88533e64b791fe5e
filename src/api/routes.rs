//! Query endpoints over the hub's read-only core surface

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::DeviceState;

use super::{
    error::{ApiError, ApiResult},
    state::ApiState,
};

/// GET /api/v1/health
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// GET /api/v1/stats
///
/// Realtime overview: device counts, viewer count, dropped broadcasts.
pub async fn get_stats(State(state): State<ApiState>) -> Json<Value> {
    let devices = state.registry.get_all().await;
    let online = devices
        .iter()
        .filter(|d| d.status == DeviceState::Online)
        .count();

    Json(json!({
        "total_devices": devices.len(),
        "online_devices": online,
        "connected_viewers": state.hub.viewer_count().await,
        "dropped_broadcasts": state.hub.dropped_broadcasts(),
    }))
}

/// GET /api/v1/devices
pub async fn list_devices(State(state): State<ApiState>) -> Json<Value> {
    let devices = state.registry.get_all().await;

    Json(json!({
        "devices": devices,
        "count": devices.len(),
    }))
}

/// GET /api/v1/devices/:id
pub async fn get_device(
    State(state): State<ApiState>,
    Path(device_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let status = state
        .registry
        .get(&device_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("unknown device: {device_id}")))?;

    Ok(Json(json!({ "device": status })))
}

#[derive(Debug, Deserialize)]
pub struct LatestQuery {
    limit: Option<usize>,
}

/// GET /api/v1/readings/latest?limit=N
pub async fn latest_readings(
    State(state): State<ApiState>,
    Query(query): Query<LatestQuery>,
) -> ApiResult<Json<Value>> {
    let limit = query.limit.unwrap_or(100).min(1000);

    let readings = state.storage.latest_n(limit).await?;

    Ok(Json(json!({
        "count": readings.len(),
        "readings": readings,
    })))
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    start_ms: Option<i64>,
    end_ms: Option<i64>,
}

/// GET /api/v1/readings?start_ms=..&end_ms=..
///
/// Defaults to the last hour when bounds are omitted.
pub async fn readings_range(
    State(state): State<ApiState>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Json<Value>> {
    let end_ms = query.end_ms.unwrap_or_else(crate::util::now_ms);
    let start_ms = query.start_ms.unwrap_or(end_ms - 3_600_000);

    let readings = state.storage.range_query(start_ms, end_ms).await?;

    Ok(Json(json!({
        "start_ms": start_ms,
        "end_ms": end_ms,
        "count": readings.len(),
        "readings": readings,
    })))
}
