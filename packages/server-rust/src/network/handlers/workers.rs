//! `/employees` routes: worker registration and lookup.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use dispatch_core::{Coordinate, Worker};
use serde::Deserialize;

use super::{ApiError, ApiResponse, AppState, LocationBody};

#[derive(Debug, Deserialize)]
pub struct RegisterWorkerRequest {
    pub name: String,
    pub location: LocationBody,
    pub skills: Vec<String>,
}

/// `POST /employees`. The id is generated server-side and the worker starts
/// available.
///
/// # Errors
///
/// 400 for a malformed body or invalid fields.
pub async fn register_worker_handler(
    State(state): State<AppState>,
    body: Result<Json<RegisterWorkerRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Worker>>), ApiError> {
    let Json(req) = body?;
    let location = Coordinate::new(req.location.lat, req.location.lon)?;
    let worker = state
        .service
        .register_worker(&req.name, location, &req.skills)?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new("Employee created successfully", worker)),
    ))
}

pub async fn list_workers_handler(State(state): State<AppState>) -> Json<ApiResponse<Vec<Worker>>> {
    let workers = state.service.list_workers();
    Json(ApiResponse::new(
        format!("Retrieved {} employees", workers.len()),
        workers,
    ))
}

/// `GET /employees/{id}`.
///
/// # Errors
///
/// 404 with `WORKER_NOT_FOUND` for an unknown id.
pub async fn get_worker_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Worker>>, ApiError> {
    let worker = state.service.get_worker(&id)?;
    Ok(Json(ApiResponse::new("Employee retrieved successfully", worker)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::handlers::test_support::test_state;

    fn request(name: &str, lat: f64, skills: &[&str]) -> RegisterWorkerRequest {
        RegisterWorkerRequest {
            name: name.to_string(),
            location: LocationBody { lat, lon: 24.9 },
            skills: skills.iter().map(ToString::to_string).collect(),
        }
    }

    #[tokio::test]
    async fn register_returns_created_worker() {
        let state = test_state(10);
        let (status, Json(body)) = register_worker_handler(
            State(state.clone()),
            Ok(Json(request(" Alice ", 60.1, &["Delivery", "delivery"]))),
        )
        .await
        .unwrap();

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body.data.name(), "Alice");
        assert_eq!(body.data.skills().len(), 1);
        assert!(body.data.is_available());
        assert_eq!(state.service.list_workers().len(), 1);
    }

    #[tokio::test]
    async fn register_rejects_out_of_range_latitude() {
        let state = test_state(10);
        let err = register_worker_handler(
            State(state.clone()),
            Ok(Json(request("Alice", 91.0, &["delivery"]))),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(state.service.list_workers().is_empty());
    }

    #[tokio::test]
    async fn register_rejects_empty_skills() {
        let state = test_state(10);
        let err = register_worker_handler(State(state), Ok(Json(request("Alice", 60.0, &[]))))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn get_unknown_worker_is_404() {
        let state = test_state(10);
        let err = get_worker_handler(State(state), Path("missing".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.code(), "WORKER_NOT_FOUND");
    }

    #[tokio::test]
    async fn list_reports_count_in_message() {
        let state = test_state(10);
        for name in ["A", "B"] {
            register_worker_handler(
                State(state.clone()),
                Ok(Json(request(name, 60.0, &["delivery"]))),
            )
            .await
            .unwrap();
        }

        let Json(body) = list_workers_handler(State(state)).await;
        assert_eq!(body.message, "Retrieved 2 employees");
        assert_eq!(body.data.len(), 2);
    }
}
