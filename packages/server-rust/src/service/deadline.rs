//! Per-assignment deadline, optionally linked to the pool's hard-drain abort signal.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

/// Point in time after which an in-progress assignment must give up.
///
/// When linked to an abort receiver, the deadline also counts as expired once
/// the abort flag flips to `true`. The assigner polls [`Deadline::is_expired`]
/// at its checkpoints; nothing here blocks.
#[derive(Debug, Clone)]
pub struct Deadline {
    expires_at: Instant,
    abort: Option<watch::Receiver<bool>>,
}

impl Deadline {
    #[must_use]
    pub fn at(expires_at: Instant) -> Self {
        Self {
            expires_at,
            abort: None,
        }
    }

    #[must_use]
    pub fn after(timeout: Duration) -> Self {
        Self::at(Instant::now() + timeout)
    }

    /// Links the deadline to an abort flag.
    #[must_use]
    pub fn with_abort(mut self, abort: watch::Receiver<bool>) -> Self {
        self.abort = Some(abort);
        self
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at || self.abort.as_ref().is_some_and(|rx| *rx.borrow())
    }
}
