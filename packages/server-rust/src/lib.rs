//! Dispatch server: worker/task registry, nearest-worker assignment, a
//! bounded dispatch pool and the HTTP adapter in front of it.

pub mod network;
pub mod service;

pub use network::{NetworkConfig, NetworkModule};
pub use service::{DispatchConfig, DispatchService};
