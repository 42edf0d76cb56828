//! Transport-facing facade over the registry, assigner and pool.
//!
//! Handlers call into [`DispatchService`] only. It generates ids, validates
//! input before anything touches the registry, and orders task submission as
//! reserve-slot -> persist -> enqueue so a rejected submission never leaves an
//! orphaned `Pending` task behind.

use std::sync::Arc;
use std::time::Duration;

use dispatch_core::{Coordinate, DispatchError, DistanceMetric, Haversine, Task, Worker};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::assigner::Assigner;
use super::config::DispatchConfig;
use super::pool::{DispatchPool, ShutdownReport};
use super::registry::{Registry, RegistryStats};

/// Registry counters plus the current queue depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    #[serde(flatten)]
    pub registry: RegistryStats,
    pub queued: usize,
    pub queue_capacity: usize,
}

/// Entry point for producers (HTTP handlers) and status queries.
#[derive(Debug)]
pub struct DispatchService {
    registry: Arc<Registry>,
    pool: DispatchPool,
    drain_timeout: Duration,
}

impl DispatchService {
    /// Builds the engine with the great-circle metric. Consumers are not
    /// running until [`DispatchService::start`].
    #[must_use]
    pub fn new(config: &DispatchConfig) -> Self {
        Self::with_metric(config, Arc::new(Haversine))
    }

    #[must_use]
    pub fn with_metric(config: &DispatchConfig, metric: Arc<dyn DistanceMetric>) -> Self {
        let registry = Arc::new(Registry::new());
        let assigner = Arc::new(Assigner::with_metric(Arc::clone(&registry), metric));
        Self {
            pool: DispatchPool::new(assigner, config),
            registry,
            drain_timeout: config.drain_timeout,
        }
    }

    /// Spawns the pool consumers on the current tokio runtime.
    pub fn start(&self) {
        self.pool.start();
    }

    /// Validates and stores a new, available worker under a fresh id.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Validation`] for a blank name or an empty or
    /// blank skill list.
    pub fn register_worker(
        &self,
        name: &str,
        location: Coordinate,
        skills: &[String],
    ) -> Result<Worker, DispatchError> {
        let worker = Worker::new(Uuid::new_v4().to_string(), name, location, skills)?;
        self.registry.add_worker(worker.clone())?;
        info!(
            worker_id = worker.id(),
            skills = worker.skills().len(),
            "worker registered"
        );
        Ok(worker)
    }

    /// Validates a task, reserves a queue slot, stores it and enqueues it.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::Validation`] for a blank required skill
    /// - [`DispatchError::QueueFull`] when the pool is at capacity
    /// - [`DispatchError::PoolClosed`] during shutdown
    ///
    /// In every error case the registry is left untouched.
    pub fn submit_task(
        &self,
        location: Coordinate,
        required_skill: &str,
    ) -> Result<Task, DispatchError> {
        let task = Task::new(Uuid::new_v4().to_string(), location, required_skill)?;
        let permit = self.pool.reserve()?;
        self.registry.add_task(task.clone())?;
        permit.send(task.clone());
        info!(
            task_id = task.id(),
            skill = task.required_skill(),
            "task submitted"
        );
        Ok(task)
    }

    /// # Errors
    ///
    /// Returns [`DispatchError::TaskNotFound`] if absent.
    pub fn get_task(&self, id: &str) -> Result<Task, DispatchError> {
        self.registry.get_task(id)
    }

    #[must_use]
    pub fn list_tasks(&self) -> Vec<Task> {
        self.registry.list_tasks()
    }

    /// # Errors
    ///
    /// Returns [`DispatchError::WorkerNotFound`] if absent.
    pub fn get_worker(&self, id: &str) -> Result<Worker, DispatchError> {
        self.registry.get_worker(id)
    }

    #[must_use]
    pub fn list_workers(&self) -> Vec<Worker> {
        self.registry.list_workers()
    }

    #[must_use]
    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            registry: self.registry.stats(),
            queued: self.pool.queued(),
            queue_capacity: self.pool.capacity(),
        }
    }

    /// Drains the pool with the configured drain deadline.
    pub async fn shutdown(&self) -> ShutdownReport {
        self.pool.shutdown(self.drain_timeout).await
    }
}
