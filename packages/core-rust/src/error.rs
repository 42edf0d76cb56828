//! Error taxonomy shared by the registry, assigner, dispatch pool and HTTP layer.
//!
//! Every [`DispatchError`] carries a stable machine-readable [`code`](DispatchError::code)
//! alongside its human-readable message.

use crate::types::TaskStatus;

/// Rejected input. Raised before anything reaches the registry.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("latitude must be between -90 and 90, got {0:.6}")]
    LatitudeOutOfRange(f64),
    #[error("longitude must be between -180 and 180, got {0:.6}")]
    LongitudeOutOfRange(f64),
    #[error("coordinates must be finite numbers")]
    NonFiniteCoordinate,
    #[error("worker name cannot be empty")]
    EmptyName,
    #[error("skills cannot be empty")]
    EmptySkills,
    #[error("skill at index {index} cannot be empty or whitespace")]
    BlankSkill { index: usize },
    #[error("required_skill cannot be empty")]
    BlankRequiredSkill,
    #[error("an assigned task must reference a worker")]
    MissingAssignee,
}

/// Errors produced by the dispatch engine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    #[error("worker {id} already exists")]
    DuplicateWorker { id: String },
    #[error("task {id} already exists")]
    DuplicateTask { id: String },
    #[error("worker {id} not found")]
    WorkerNotFound { id: String },
    #[error("task {id} not found")]
    TaskNotFound { id: String },
    #[error("task {id} is already {status}")]
    TaskNotPending { id: String, status: TaskStatus },
    #[error("no eligible worker with skill '{skill}'")]
    NoEligibleWorker { skill: String },
    #[error("worker {id} no longer available (assigned concurrently)")]
    WorkerNoLongerAvailable { id: String },
    #[error("task assignment timed out")]
    Timeout,
    #[error("dispatch queue is full ({capacity} slots), retry later")]
    QueueFull { capacity: usize },
    #[error("dispatch pool is shutting down")]
    PoolClosed,
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
}

impl DispatchError {
    /// Stable code for clients and log aggregation.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateWorker { .. } => "DUPLICATE_WORKER",
            Self::DuplicateTask { .. } => "DUPLICATE_TASK",
            Self::WorkerNotFound { .. } => "WORKER_NOT_FOUND",
            Self::TaskNotFound { .. } => "TASK_NOT_FOUND",
            Self::TaskNotPending { .. } => "TASK_NOT_PENDING",
            Self::NoEligibleWorker { .. } => "NO_ELIGIBLE_WORKER",
            Self::WorkerNoLongerAvailable { .. } => "WORKER_UNAVAILABLE",
            Self::Timeout => "ASSIGNMENT_TIMEOUT",
            Self::QueueFull { .. } => "QUEUE_FULL",
            Self::PoolClosed => "POOL_CLOSED",
            Self::Validation(_) => "VALIDATION_ERROR",
        }
    }

    /// Returns `true` for the `NotFound` class (worker or task).
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::WorkerNotFound { .. } | Self::TaskNotFound { .. })
    }
}
