//! In-memory registry of workers and tasks.
//!
//! Both maps sit behind a single `parking_lot::RwLock` because the commit step
//! must read worker availability and mutate the worker and the task in one
//! exclusive section. Every read returns owned copies; no caller holds a
//! reference into registry memory once the lock is released.
//!
//! Maps are `BTreeMap`s so snapshots come out ordered by id, which makes the
//! assigner's tie-break deterministic.

use std::collections::BTreeMap;

use dispatch_core::{normalize_skill, Coordinate, DispatchError, Task, TaskStatus, Worker};
use parking_lot::RwLock;
use serde::Serialize;

/// Id and location of an eligible worker, copied out under the read lock.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: String,
    pub location: Coordinate,
}

/// Point-in-time counters for health reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub workers: usize,
    pub available_workers: usize,
    pub tasks_pending: usize,
    pub tasks_assigned: usize,
    pub tasks_failed: usize,
}

#[derive(Debug, Default)]
struct RegistryInner {
    workers: BTreeMap<String, Worker>,
    tasks: BTreeMap<String, Task>,
}

impl RegistryInner {
    /// Validates the whole precondition before touching anything, so a failed
    /// attempt leaves both maps unchanged.
    fn compare_and_assign(&mut self, task_id: &str, worker_id: &str) -> Result<(), DispatchError> {
        let task = self
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| DispatchError::TaskNotFound { id: task_id.to_string() })?;
        if task.status().is_terminal() {
            return Err(DispatchError::TaskNotPending {
                id: task_id.to_string(),
                status: task.status(),
            });
        }

        let worker = self
            .workers
            .get_mut(worker_id)
            .ok_or_else(|| DispatchError::WorkerNotFound { id: worker_id.to_string() })?;
        if !worker.claim() {
            return Err(DispatchError::WorkerNoLongerAvailable { id: worker_id.to_string() });
        }

        task.set_status(TaskStatus::Assigned, Some(worker_id.to_string()))?;
        Ok(())
    }

    fn fail_task(&mut self, task_id: &str) -> bool {
        self.tasks.get_mut(task_id).is_some_and(Task::fail)
    }
}

/// Thread-safe store of workers and tasks. The single source of truth.
#[derive(Debug, Default)]
pub struct Registry {
    inner: RwLock<RegistryInner>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new worker.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::DuplicateWorker`] if the id is already taken.
    pub fn add_worker(&self, worker: Worker) -> Result<(), DispatchError> {
        let mut inner = self.inner.write();
        if inner.workers.contains_key(worker.id()) {
            return Err(DispatchError::DuplicateWorker { id: worker.id().to_string() });
        }
        inner.workers.insert(worker.id().to_string(), worker);
        Ok(())
    }

    /// Returns a copy of the worker.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::WorkerNotFound`] if absent.
    pub fn get_worker(&self, id: &str) -> Result<Worker, DispatchError> {
        self.inner
            .read()
            .workers
            .get(id)
            .cloned()
            .ok_or_else(|| DispatchError::WorkerNotFound { id: id.to_string() })
    }

    /// Copies of all workers, ordered by id.
    #[must_use]
    pub fn list_workers(&self) -> Vec<Worker> {
        self.inner.read().workers.values().cloned().collect()
    }

    /// Copies of every available worker holding `skill`, ordered by id.
    ///
    /// The skill is normalized before matching.
    #[must_use]
    pub fn list_available_workers(&self, skill: &str) -> Vec<Worker> {
        let skill = normalize_skill(skill);
        self.inner
            .read()
            .workers
            .values()
            .filter(|w| w.is_available() && w.has_skill(&skill))
            .cloned()
            .collect()
    }

    /// Inserts a task in the `Pending` state, whatever state it arrived in.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::DuplicateTask`] if the id is already taken.
    pub fn add_task(&self, mut task: Task) -> Result<(), DispatchError> {
        let mut inner = self.inner.write();
        if inner.tasks.contains_key(task.id()) {
            return Err(DispatchError::DuplicateTask { id: task.id().to_string() });
        }
        task.set_status(TaskStatus::Pending, None)?;
        inner.tasks.insert(task.id().to_string(), task);
        Ok(())
    }

    /// Returns a copy of the task.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::TaskNotFound`] if absent.
    pub fn get_task(&self, id: &str) -> Result<Task, DispatchError> {
        self.inner
            .read()
            .tasks
            .get(id)
            .cloned()
            .ok_or_else(|| DispatchError::TaskNotFound { id: id.to_string() })
    }

    /// Copies of all tasks, ordered by id.
    #[must_use]
    pub fn list_tasks(&self) -> Vec<Task> {
        self.inner.read().tasks.values().cloned().collect()
    }

    /// Overwrites a task's status. The worker reference is stored only for
    /// `Assigned` and cleared otherwise. Worker availability is not touched;
    /// use [`Registry::compare_and_assign`] to commit an assignment.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::TaskNotFound`] if absent, or a validation
    /// error when `Assigned` is requested without a worker id.
    pub fn update_task_status(
        &self,
        id: &str,
        status: TaskStatus,
        worker_id: Option<&str>,
    ) -> Result<(), DispatchError> {
        let mut inner = self.inner.write();
        let task = inner
            .tasks
            .get_mut(id)
            .ok_or_else(|| DispatchError::TaskNotFound { id: id.to_string() })?;
        task.set_status(status, worker_id.map(str::to_string))?;
        Ok(())
    }

    /// Marks the worker unavailable and the task `Assigned` in one exclusive
    /// section.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::TaskNotFound`] / [`DispatchError::WorkerNotFound`]
    /// - [`DispatchError::TaskNotPending`] if the task is already terminal
    /// - [`DispatchError::WorkerNoLongerAvailable`] if the worker was claimed
    ///   since it was selected
    ///
    /// Nothing is mutated on error.
    pub fn compare_and_assign(&self, task_id: &str, worker_id: &str) -> Result<(), DispatchError> {
        self.inner.write().compare_and_assign(task_id, worker_id)
    }

    /// `Pending` -> `Failed`. Returns `false` if the task is absent or
    /// already terminal, in which case nothing changes.
    pub fn fail_task(&self, task_id: &str) -> bool {
        self.inner.write().fail_task(task_id)
    }

    /// Counters over both maps, taken under one read lock.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        let inner = self.inner.read();
        let mut stats = RegistryStats {
            workers: inner.workers.len(),
            available_workers: inner.workers.values().filter(|w| w.is_available()).count(),
            ..RegistryStats::default()
        };
        for task in inner.tasks.values() {
            match task.status() {
                TaskStatus::Pending => stats.tasks_pending += 1,
                TaskStatus::Assigned => stats.tasks_assigned += 1,
                TaskStatus::Failed => stats.tasks_failed += 1,
            }
        }
        stats
    }

    /// Snapshot phase of an assignment: id and location of every available
    /// worker with an already-normalized `skill`, ordered by id.
    pub(crate) fn eligible_candidates(&self, skill: &str) -> Vec<Candidate> {
        self.inner
            .read()
            .workers
            .values()
            .filter(|w| w.is_available() && w.has_skill(skill))
            .map(|w| Candidate {
                id: w.id().to_string(),
                location: w.location(),
            })
            .collect()
    }

    /// Commit phase of an assignment.
    ///
    /// Under the write lock: if `expired()` reports the deadline passed, the
    /// task is failed with [`DispatchError::Timeout`] and no worker is
    /// touched. A worker that is gone or already claimed fails the task with
    /// the compare-and-assign error. Other errors leave the task as it was.
    pub(crate) fn commit_unless_expired(
        &self,
        task_id: &str,
        worker_id: &str,
        expired: impl FnOnce() -> bool,
    ) -> Result<(), DispatchError> {
        let mut inner = self.inner.write();
        if expired() {
            inner.fail_task(task_id);
            return Err(DispatchError::Timeout);
        }
        match inner.compare_and_assign(task_id, worker_id) {
            Err(
                err @ (DispatchError::WorkerNoLongerAvailable { .. }
                | DispatchError::WorkerNotFound { .. }),
            ) => {
                inner.fail_task(task_id);
                Err(err)
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    fn worker(id: &str, skills: &[&str]) -> Worker {
        Worker::new(id, "Worker", coord(60.0, 25.0), skills.iter().copied()).unwrap()
    }

    fn task(id: &str, skill: &str) -> Task {
        Task::new(id, coord(60.0, 25.0), skill).unwrap()
    }

    #[test]
    fn add_worker_rejects_duplicate_id() {
        let registry = Registry::new();
        registry.add_worker(worker("w-1", &["delivery"])).unwrap();
        let err = registry.add_worker(worker("w-1", &["repair"])).unwrap_err();
        assert_eq!(err, DispatchError::DuplicateWorker { id: "w-1".into() });
        assert_eq!(registry.get_worker("w-1").unwrap().skills().len(), 1);
    }

    #[test]
    fn get_missing_entities_is_not_found() {
        let registry = Registry::new();
        assert!(registry.get_worker("nope").unwrap_err().is_not_found());
        assert_eq!(
            registry.get_task("nope").unwrap_err(),
            DispatchError::TaskNotFound { id: "nope".into() }
        );
    }

    #[test]
    fn list_available_workers_filters_by_skill_and_availability() {
        let registry = Registry::new();
        registry.add_worker(worker("w-1", &["delivery"])).unwrap();
        registry.add_worker(worker("w-2", &["repair"])).unwrap();
        registry.add_worker(worker("w-3", &["delivery", "repair"])).unwrap();
        registry.add_task(task("t-1", "delivery")).unwrap();
        registry.compare_and_assign("t-1", "w-1").unwrap();

        let ids: Vec<_> = registry
            .list_available_workers("  DELIVERY ")
            .iter()
            .map(|w| w.id().to_string())
            .collect();
        assert_eq!(ids, vec!["w-3"]);
        assert!(registry.list_available_workers("cooking").is_empty());
    }

    #[test]
    fn reads_return_copies() {
        let registry = Registry::new();
        registry.add_worker(worker("w-1", &["delivery"])).unwrap();

        let mut copy = registry.get_worker("w-1").unwrap();
        assert!(copy.claim());
        assert!(registry.get_worker("w-1").unwrap().is_available());
    }

    #[test]
    fn add_task_forces_pending_and_rejects_duplicates() {
        let registry = Registry::new();
        let mut failed = task("t-1", "delivery");
        failed.fail();
        registry.add_task(failed).unwrap();
        assert_eq!(registry.get_task("t-1").unwrap().status(), TaskStatus::Pending);

        let err = registry.add_task(task("t-1", "delivery")).unwrap_err();
        assert_eq!(err, DispatchError::DuplicateTask { id: "t-1".into() });
    }

    #[test]
    fn list_tasks_is_ordered_by_id() {
        let registry = Registry::new();
        for id in ["t-3", "t-1", "t-2"] {
            registry.add_task(task(id, "delivery")).unwrap();
        }
        let ids: Vec<_> = registry.list_tasks().iter().map(|t| t.id().to_string()).collect();
        assert_eq!(ids, vec!["t-1", "t-2", "t-3"]);
    }

    #[test]
    fn update_task_status_sets_and_clears_assignee() {
        let registry = Registry::new();
        registry.add_task(task("t-1", "delivery")).unwrap();

        registry
            .update_task_status("t-1", TaskStatus::Assigned, Some("w-9"))
            .unwrap();
        assert_eq!(registry.get_task("t-1").unwrap().assigned_worker_id(), Some("w-9"));

        registry
            .update_task_status("t-1", TaskStatus::Failed, Some("w-9"))
            .unwrap();
        let t = registry.get_task("t-1").unwrap();
        assert_eq!(t.status(), TaskStatus::Failed);
        assert!(t.assigned_worker_id().is_none());

        assert!(registry
            .update_task_status("missing", TaskStatus::Failed, None)
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn compare_and_assign_commits_both_sides() {
        let registry = Registry::new();
        registry.add_worker(worker("w-1", &["delivery"])).unwrap();
        registry.add_task(task("t-1", "delivery")).unwrap();

        registry.compare_and_assign("t-1", "w-1").unwrap();

        let t = registry.get_task("t-1").unwrap();
        assert_eq!(t.status(), TaskStatus::Assigned);
        assert_eq!(t.assigned_worker_id(), Some("w-1"));
        assert!(!registry.get_worker("w-1").unwrap().is_available());
    }

    #[test]
    fn compare_and_assign_rejects_claimed_worker_without_mutation() {
        let registry = Registry::new();
        registry.add_worker(worker("w-1", &["delivery"])).unwrap();
        registry.add_task(task("t-1", "delivery")).unwrap();
        registry.add_task(task("t-2", "delivery")).unwrap();
        registry.compare_and_assign("t-1", "w-1").unwrap();

        let err = registry.compare_and_assign("t-2", "w-1").unwrap_err();
        assert_eq!(err, DispatchError::WorkerNoLongerAvailable { id: "w-1".into() });
        assert_eq!(registry.get_task("t-2").unwrap().status(), TaskStatus::Pending);
    }

    #[test]
    fn compare_and_assign_on_terminal_task_leaves_worker_available() {
        let registry = Registry::new();
        registry.add_worker(worker("w-1", &["delivery"])).unwrap();
        registry.add_task(task("t-1", "delivery")).unwrap();
        assert!(registry.fail_task("t-1"));

        let err = registry.compare_and_assign("t-1", "w-1").unwrap_err();
        assert_eq!(
            err,
            DispatchError::TaskNotPending {
                id: "t-1".into(),
                status: TaskStatus::Failed
            }
        );
        assert!(registry.get_worker("w-1").unwrap().is_available());

        let err = registry.compare_and_assign("missing", "w-1").unwrap_err();
        assert_eq!(err, DispatchError::TaskNotFound { id: "missing".into() });
        assert!(registry.get_worker("w-1").unwrap().is_available());
    }

    #[test]
    fn fail_task_is_one_shot() {
        let registry = Registry::new();
        registry.add_task(task("t-1", "delivery")).unwrap();
        assert!(registry.fail_task("t-1"));
        assert!(!registry.fail_task("t-1"));
        assert!(!registry.fail_task("missing"));
    }

    #[test]
    fn commit_unless_expired_times_out_without_touching_worker() {
        let registry = Registry::new();
        registry.add_worker(worker("w-1", &["delivery"])).unwrap();
        registry.add_task(task("t-1", "delivery")).unwrap();

        let err = registry.commit_unless_expired("t-1", "w-1", || true).unwrap_err();
        assert_eq!(err, DispatchError::Timeout);
        assert_eq!(registry.get_task("t-1").unwrap().status(), TaskStatus::Failed);
        assert!(registry.get_worker("w-1").unwrap().is_available());
    }

    #[test]
    fn commit_unless_expired_fails_task_on_race() {
        let registry = Registry::new();
        registry.add_worker(worker("w-1", &["delivery"])).unwrap();
        registry.add_task(task("t-1", "delivery")).unwrap();
        registry.add_task(task("t-2", "delivery")).unwrap();
        registry.compare_and_assign("t-1", "w-1").unwrap();

        let err = registry.commit_unless_expired("t-2", "w-1", || false).unwrap_err();
        assert_eq!(err, DispatchError::WorkerNoLongerAvailable { id: "w-1".into() });
        assert_eq!(registry.get_task("t-2").unwrap().status(), TaskStatus::Failed);
    }

    #[test]
    fn eligible_candidates_are_id_ordered_copies() {
        let registry = Registry::new();
        registry.add_worker(worker("w-b", &["delivery"])).unwrap();
        registry.add_worker(worker("w-a", &["delivery"])).unwrap();
        registry.add_worker(worker("w-c", &["repair"])).unwrap();

        let ids: Vec<_> = registry
            .eligible_candidates("delivery")
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["w-a", "w-b"]);
    }

    #[test]
    fn stats_count_by_status() {
        let registry = Registry::new();
        registry.add_worker(worker("w-1", &["delivery"])).unwrap();
        registry.add_worker(worker("w-2", &["delivery"])).unwrap();
        for id in ["t-1", "t-2", "t-3"] {
            registry.add_task(task(id, "delivery")).unwrap();
        }
        registry.compare_and_assign("t-1", "w-1").unwrap();
        registry.fail_task("t-2");

        assert_eq!(
            registry.stats(),
            RegistryStats {
                workers: 2,
                available_workers: 1,
                tasks_pending: 1,
                tasks_assigned: 1,
                tasks_failed: 1,
            }
        );
    }

    #[test]
    fn concurrent_inserts_from_many_threads() {
        let registry = Arc::new(Registry::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        registry.add_worker(worker(&format!("w-{t}-{i}"), &["delivery"])).unwrap();
                        registry.add_task(task(&format!("t-{t}-{i}"), "delivery")).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.list_workers().len(), 400);
        assert_eq!(registry.list_tasks().len(), 400);
    }
}
