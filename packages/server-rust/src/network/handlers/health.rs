//! Health, liveness, and readiness endpoint handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use super::AppState;
use crate::network::HealthState;

/// Returns server state plus registry and queue counters.
///
/// Always 200; the `state` field tells monitoring whether the server is
/// ready, draining, or stopped.
pub async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let health = state.shutdown.health_state();
    let stats = state.service.stats();

    Json(json!({
        "state": health.as_str(),
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "workers": stats.registry.workers,
        "available_workers": stats.registry.available_workers,
        "tasks": {
            "pending": stats.registry.tasks_pending,
            "assigned": stats.registry.tasks_assigned,
            "failed": stats.registry.tasks_failed,
        },
        "queued": stats.queued,
        "queue_capacity": stats.queue_capacity,
    }))
}

/// Liveness probe: the process answers, nothing else is checked.
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe: 200 only while `Ready`, so draining instances stop
/// receiving tasks.
pub async fn readiness_handler(State(state): State<AppState>) -> StatusCode {
    if state.shutdown.health_state() == HealthState::Ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
