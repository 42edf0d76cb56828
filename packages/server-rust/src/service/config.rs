use std::time::Duration;

/// Dispatch engine configuration.
///
/// Controls the consumer pool size, queue bound and the two deadlines
/// (per-assignment and shutdown drain).
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Number of concurrent assignment consumers.
    pub worker_count: usize,
    /// Bounded queue capacity; submissions beyond it fail with `QueueFull`.
    pub queue_capacity: usize,
    /// Deadline applied to each assignment attempt.
    pub task_timeout: Duration,
    /// Hard upper bound on how long shutdown waits for the queue to drain.
    pub drain_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            worker_count: 5,
            queue_capacity: 100,
            task_timeout: Duration::from_secs(30),
            drain_timeout: Duration::from_secs(5),
        }
    }
}
