//! Assignment engine.
//!
//! Leaf-first:
//!
//! 1. **Registry** (`registry`): workers and tasks under a single RW lock
//! 2. **Deadline** (`deadline`): per-assignment expiry, linkable to an abort flag
//! 3. **Assigner** (`assigner`): snapshot / compute / commit selection
//! 4. **Dispatch pool** (`pool`): bounded queue, N consumers, drain-with-deadline
//! 5. **Dispatch service** (`dispatch`): the facade transport handlers call

pub mod assigner;
pub mod config;
pub mod deadline;
pub mod dispatch;
pub mod pool;
pub mod registry;

pub use assigner::{AssignmentOutcome, Assigner, DEADLINE_CHECK_INTERVAL};
pub use config::DispatchConfig;
pub use deadline::Deadline;
pub use dispatch::{DispatchService, DispatchStats};
pub use pool::{DispatchPool, ShutdownReport, SubmitPermit};
pub use registry::{Candidate, Registry, RegistryStats};
