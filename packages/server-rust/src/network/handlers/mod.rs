//! HTTP handlers for the dispatch API.
//!
//! `AppState` is the shared state carried through axum's `State` extractor.

pub mod error;
pub mod health;
pub mod tasks;
pub mod workers;

pub use error::ApiError;
pub use health::{health_handler, liveness_handler, readiness_handler};
pub use tasks::{get_task_handler, list_tasks_handler, submit_task_handler};
pub use workers::{get_worker_handler, list_workers_handler, register_worker_handler};

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::service::DispatchService;

use super::ShutdownController;

/// Shared application state passed to all handlers. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DispatchService>,
    pub shutdown: Arc<ShutdownController>,
    /// Used for the uptime reported by `/health`.
    pub start_time: Instant,
}

/// Success envelope: `{"message": ..., "data": ...}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub message: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    #[must_use]
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data,
        }
    }
}

/// Wire shape of a location before range validation.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LocationBody {
    pub lat: f64,
    pub lon: f64,
}
