//! `/tasks` routes: submission and status queries.
//!
//! Submission only enqueues. The response carries the task as `pending`;
//! clients poll `GET /tasks/{id}` for the assignment result.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use dispatch_core::{Coordinate, Task};
use serde::Deserialize;

use super::{ApiError, ApiResponse, AppState, LocationBody};

#[derive(Debug, Deserialize)]
pub struct SubmitTaskRequest {
    pub location: LocationBody,
    pub required_skill: String,
}

/// `POST /tasks`.
///
/// # Errors
///
/// - 400 for a malformed body or invalid fields
/// - 503 `QUEUE_FULL` when the dispatch queue is at capacity
/// - 503 `POOL_CLOSED` while the server drains
pub async fn submit_task_handler(
    State(state): State<AppState>,
    body: Result<Json<SubmitTaskRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Task>>), ApiError> {
    let Json(req) = body?;
    let location = Coordinate::new(req.location.lat, req.location.lon)?;
    let task = state.service.submit_task(location, &req.required_skill)?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new("Task created and assignment initiated", task)),
    ))
}

pub async fn list_tasks_handler(State(state): State<AppState>) -> Json<ApiResponse<Vec<Task>>> {
    let tasks = state.service.list_tasks();
    Json(ApiResponse::new(
        format!("Retrieved {} tasks", tasks.len()),
        tasks,
    ))
}

/// `GET /tasks/{id}`.
///
/// # Errors
///
/// 404 with `TASK_NOT_FOUND` for an unknown id.
pub async fn get_task_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Task>>, ApiError> {
    let task = state.service.get_task(&id)?;
    Ok(Json(ApiResponse::new("Task retrieved successfully", task)))
}
