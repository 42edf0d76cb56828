//! Dispatch core: coordinates, workers, tasks, great-circle distance and the
//! engine's error taxonomy.

pub mod error;
pub mod geo;
pub mod types;

pub use error::{DispatchError, ValidationError};
pub use geo::{haversine_km, Coordinate, DistanceMetric, Haversine, EARTH_RADIUS_KM};
pub use types::{normalize_skill, Task, TaskStatus, Worker};
