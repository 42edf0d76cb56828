//! Bounded dispatch pool draining assignment work.
//!
//! `DispatchPool` owns a bounded mpsc queue of tasks and a fixed set of tokio
//! consumers sharing its receiver. Each consumer:
//! 1. Waits for the next task (suspends while the queue is empty)
//! 2. Runs the `Assigner` on the blocking pool with a fresh per-task `Deadline`
//! 3. Exits once the queue is closed and empty
//!
//! Queue closure is the only exit signal. The abort flag raised when the
//! drain deadline passes is a per-task timeout source: it expires in-flight
//! deadlines and makes consumers fail queued tasks without assigning them.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dispatch_core::{DispatchError, Task};
use parking_lot::Mutex;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tokio::task::{self, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::assigner::Assigner;
use super::config::DispatchConfig;
use super::deadline::Deadline;

/// Summary of a [`DispatchPool::shutdown`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// `true` if the consumers finished within the drain deadline.
    pub drained: bool,
    /// Tasks failed without an assignment attempt after the deadline.
    pub aborted_tasks: usize,
    pub elapsed: Duration,
}

/// A reserved queue slot. Sending through it cannot fail.
///
/// Dropping the permit without sending releases the slot.
#[derive(Debug)]
pub struct SubmitPermit {
    permit: mpsc::OwnedPermit<Task>,
    queued: Arc<AtomicUsize>,
}

impl SubmitPermit {
    /// Enqueues `task` into the reserved slot.
    pub fn send(self, task: Task) {
        self.queued.fetch_add(1, Ordering::Relaxed);
        drop(self.permit.send(task));
    }
}

/// Fixed pool of assignment consumers behind a bounded queue.
pub struct DispatchPool {
    assigner: Arc<Assigner>,
    worker_count: usize,
    capacity: usize,
    task_timeout: Duration,
    tx: Mutex<Option<mpsc::Sender<Task>>>,
    rx: Arc<AsyncMutex<mpsc::Receiver<Task>>>,
    abort: watch::Sender<bool>,
    consumers: Mutex<JoinSet<()>>,
    started: AtomicBool,
    queued: Arc<AtomicUsize>,
    aborted: Arc<AtomicUsize>,
}

impl std::fmt::Debug for DispatchPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchPool")
            .field("worker_count", &self.worker_count)
            .field("capacity", &self.capacity)
            .field("queued", &self.queued())
            .field("started", &self.started.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl DispatchPool {
    /// Creates the pool without spawning consumers.
    ///
    /// A zero `worker_count` or `queue_capacity` is raised to 1.
    #[must_use]
    pub fn new(assigner: Arc<Assigner>, config: &DispatchConfig) -> Self {
        let capacity = config.queue_capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let (abort, _) = watch::channel(false);
        Self {
            assigner,
            worker_count: config.worker_count.max(1),
            capacity,
            task_timeout: config.task_timeout,
            tx: Mutex::new(Some(tx)),
            rx: Arc::new(AsyncMutex::new(rx)),
            abort,
            consumers: Mutex::new(JoinSet::new()),
            started: AtomicBool::new(false),
            queued: Arc::new(AtomicUsize::new(0)),
            aborted: Arc::new(AtomicUsize::new(0)),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Tasks sitting in the queue, not yet picked up by a consumer.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::Relaxed)
    }

    /// Reserves one queue slot without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::QueueFull`] when every slot is taken and
    /// [`DispatchError::PoolClosed`] once shutdown has begun.
    pub fn reserve(&self) -> Result<SubmitPermit, DispatchError> {
        let sender = self.tx.lock().clone().ok_or(DispatchError::PoolClosed)?;
        match sender.try_reserve_owned() {
            Ok(permit) => Ok(SubmitPermit {
                permit,
                queued: Arc::clone(&self.queued),
            }),
            Err(TrySendError::Full(_)) => Err(DispatchError::QueueFull {
                capacity: self.capacity,
            }),
            Err(TrySendError::Closed(_)) => Err(DispatchError::PoolClosed),
        }
    }

    /// Enqueues a task without blocking.
    ///
    /// # Errors
    ///
    /// Same as [`DispatchPool::reserve`].
    pub fn submit(&self, task: Task) -> Result<(), DispatchError> {
        self.reserve()?.send(task);
        Ok(())
    }

    /// Spawns the consumers on the current tokio runtime. Idempotent.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("dispatch pool already started");
            return;
        }

        let mut consumers = self.consumers.lock();
        for id in 0..self.worker_count {
            let consumer = Consumer {
                id,
                assigner: Arc::clone(&self.assigner),
                queue: Arc::clone(&self.rx),
                abort: self.abort.subscribe(),
                task_timeout: self.task_timeout,
                queued: Arc::clone(&self.queued),
                aborted: Arc::clone(&self.aborted),
            };
            consumers.spawn(consumer.run());
        }

        info!(
            workers = self.worker_count,
            capacity = self.capacity,
            "dispatch pool started"
        );
    }

    /// Closes the queue and drains it within `drain_timeout`.
    ///
    /// Consumers keep assigning queued tasks until the deadline. If they are
    /// not done by then the abort flag is raised: in-flight assignments fail
    /// with `Timeout` at their next checkpoint and the rest of the queue is
    /// failed without further attempts. Returns once every consumer exited.
    pub async fn shutdown(&self, drain_timeout: Duration) -> ShutdownReport {
        let started_at = Instant::now();
        if self.tx.lock().take().is_some() {
            info!(queued = self.queued(), "dispatch queue closed");
        }

        let mut consumers = std::mem::take(&mut *self.consumers.lock());
        let drained = if consumers.is_empty() {
            self.fail_queued().await;
            true
        } else if tokio::time::timeout(drain_timeout, join_all(&mut consumers))
            .await
            .is_ok()
        {
            true
        } else {
            warn!(
                drain_timeout_ms = u64::try_from(drain_timeout.as_millis()).unwrap_or(u64::MAX),
                queued = self.queued(),
                "drain deadline passed, failing remaining tasks"
            );
            self.abort.send_replace(true);
            join_all(&mut consumers).await;
            false
        };

        let report = ShutdownReport {
            drained,
            aborted_tasks: self.aborted.load(Ordering::SeqCst),
            elapsed: started_at.elapsed(),
        };
        info!(
            drained = report.drained,
            aborted_tasks = report.aborted_tasks,
            "dispatch pool stopped"
        );
        report
    }

    /// Fails whatever is left in the queue. Used when no consumer ever ran.
    async fn fail_queued(&self) {
        let mut rx = self.rx.lock().await;
        while let Ok(task) = rx.try_recv() {
            self.queued.fetch_sub(1, Ordering::Relaxed);
            if self.assigner.registry().fail_task(task.id()) {
                self.aborted.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
}

async fn join_all(consumers: &mut JoinSet<()>) {
    while let Some(result) = consumers.join_next().await {
        if let Err(err) = result {
            error!(error = %err, "dispatch consumer terminated abnormally");
        }
    }
}

/// One queue consumer. Owns everything it needs so it can run as a `'static` task.
struct Consumer {
    id: usize,
    assigner: Arc<Assigner>,
    queue: Arc<AsyncMutex<mpsc::Receiver<Task>>>,
    abort: watch::Receiver<bool>,
    task_timeout: Duration,
    queued: Arc<AtomicUsize>,
    aborted: Arc<AtomicUsize>,
}

impl Consumer {
    async fn run(self) {
        loop {
            let next = self.queue.lock().await.recv().await;
            let Some(task) = next else {
                break;
            };
            self.queued.fetch_sub(1, Ordering::Relaxed);

            if *self.abort.borrow() {
                if self.assigner.registry().fail_task(task.id()) {
                    self.aborted.fetch_add(1, Ordering::SeqCst);
                }
                debug!(consumer = self.id, task_id = task.id(), "failed without assignment");
                continue;
            }

            let task_id = task.id().to_string();
            let deadline = Deadline::after(self.task_timeout).with_abort(self.abort.clone());
            let assigner = Arc::clone(&self.assigner);
            // The distance scan is CPU-bound; keep it off the executor so the
            // drain timer can fire on a current-thread runtime.
            match task::spawn_blocking(move || assigner.assign(&deadline, &task)).await {
                Ok(outcome) => debug!(
                    consumer = self.id,
                    task_id = %task_id,
                    outcome = outcome.label(),
                    "task processed"
                ),
                Err(err) => {
                    error!(
                        consumer = self.id,
                        task_id = %task_id,
                        error = %err,
                        "assignment panicked"
                    );
                    self.assigner.registry().fail_task(&task_id);
                }
            }
        }
        debug!(consumer = self.id, "queue closed, consumer exiting");
    }
}
