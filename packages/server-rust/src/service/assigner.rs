//! Nearest-eligible-worker selection with a race-free commit.
//!
//! One assignment runs in three phases to keep exclusive lock sections O(1):
//!
//! 1. **Snapshot** (read lock): copy id + location of every available worker
//!    holding the task's skill.
//! 2. **Compute** (no lock): rank candidates by distance, polling the
//!    deadline every [`DEADLINE_CHECK_INTERVAL`] candidates.
//! 3. **Commit** (write lock): re-check the deadline, then compare-and-assign
//!    against the winner. A worker claimed since the snapshot fails the task
//!    with `WorkerNoLongerAvailable`, never with `NoEligibleWorker`.
//!
//! Every failure path leaves the task `Failed` exactly once.

use std::sync::Arc;

use dispatch_core::{DispatchError, DistanceMetric, Haversine, Task};
use tracing::{debug, info, info_span, warn};

use super::deadline::Deadline;
use super::registry::{Candidate, Registry};

/// How many candidates are ranked between two deadline checks.
pub const DEADLINE_CHECK_INTERVAL: usize = 10;

/// Result of one assignment attempt. Not persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentOutcome {
    pub task_id: String,
    /// Chosen worker, set only on success.
    pub worker_id: Option<String>,
    /// Distance to the chosen worker in kilometers; `0.0` on failure.
    pub distance_km: f64,
    pub success: bool,
    pub error: Option<DispatchError>,
}

impl AssignmentOutcome {
    fn assigned(task_id: &str, worker_id: String, distance_km: f64) -> Self {
        Self {
            task_id: task_id.to_string(),
            worker_id: Some(worker_id),
            distance_km,
            success: true,
            error: None,
        }
    }

    fn failed(task_id: &str, error: DispatchError) -> Self {
        Self {
            task_id: task_id.to_string(),
            worker_id: None,
            distance_km: 0.0,
            success: false,
            error: Some(error),
        }
    }

    /// Stable label for logs: `"assigned"` or the error code.
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.error.as_ref().map_or("assigned", DispatchError::code)
    }
}

/// Selects and commits the closest eligible worker for a task.
pub struct Assigner {
    registry: Arc<Registry>,
    metric: Arc<dyn DistanceMetric>,
}

impl std::fmt::Debug for Assigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assigner").finish_non_exhaustive()
    }
}

impl Assigner {
    /// Creates an assigner ranking candidates by great-circle distance.
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self::with_metric(registry, Arc::new(Haversine))
    }

    #[must_use]
    pub fn with_metric(registry: Arc<Registry>, metric: Arc<dyn DistanceMetric>) -> Self {
        Self { registry, metric }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Runs one assignment attempt for `task` before `deadline`.
    ///
    /// Ties on distance go to the candidate with the lexicographically
    /// smallest worker id.
    pub fn assign(&self, deadline: &Deadline, task: &Task) -> AssignmentOutcome {
        let span = info_span!(
            "assignment",
            task_id = task.id(),
            skill = task.required_skill(),
            candidates = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );
        let _enter = span.enter();

        let outcome = self.run(deadline, task);
        span.record("outcome", outcome.label());

        match &outcome.error {
            None => info!(
                worker_id = outcome.worker_id.as_deref().unwrap_or_default(),
                distance_km = outcome.distance_km,
                "task assigned"
            ),
            Some(DispatchError::NoEligibleWorker { .. }) => {
                debug!(code = outcome.label(), "no eligible worker");
            }
            Some(err) => warn!(code = err.code(), error = %err, "assignment failed"),
        }
        outcome
    }

    fn run(&self, deadline: &Deadline, task: &Task) -> AssignmentOutcome {
        if deadline.is_expired() {
            return self.fail(task, DispatchError::Timeout);
        }

        let candidates = self.registry.eligible_candidates(task.required_skill());
        tracing::Span::current().record("candidates", candidates.len());
        if candidates.is_empty() {
            return self.fail(
                task,
                DispatchError::NoEligibleWorker {
                    skill: task.required_skill().to_string(),
                },
            );
        }

        let Some((winner, distance_km)) = self.closest(deadline, task, &candidates) else {
            return self.fail(task, DispatchError::Timeout);
        };

        match self
            .registry
            .commit_unless_expired(task.id(), &winner.id, || deadline.is_expired())
        {
            Ok(()) => AssignmentOutcome::assigned(task.id(), winner.id.clone(), distance_km),
            Err(err) => AssignmentOutcome::failed(task.id(), err),
        }
    }

    /// Compute phase. Returns `None` if the deadline expired mid-scan.
    fn closest<'a>(
        &self,
        deadline: &Deadline,
        task: &Task,
        candidates: &'a [Candidate],
    ) -> Option<(&'a Candidate, f64)> {
        let mut best: Option<(&Candidate, f64)> = None;
        for (index, candidate) in candidates.iter().enumerate() {
            if index % DEADLINE_CHECK_INTERVAL == 0 && deadline.is_expired() {
                return None;
            }
            let distance = self.metric.distance_km(task.location(), candidate.location);
            if best.is_none_or(|(_, min)| distance < min) {
                best = Some((candidate, distance));
            }
        }
        best
    }

    fn fail(&self, task: &Task, error: DispatchError) -> AssignmentOutcome {
        self.registry.fail_task(task.id());
        AssignmentOutcome::failed(task.id(), error)
    }
}
