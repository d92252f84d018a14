pub mod backend;
pub mod pool;
pub mod registry;

pub use backend::{DetectorBackend, ObjectDetector};
pub use pool::{InstanceLoader, PoolConfig, PoolError, PoolStatus, WorkerPool};
pub use registry::{HttpModelRegistry, ModelOrigin, ModelRegistry, ModelSource, resolve_model};
