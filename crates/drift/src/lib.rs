pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod stats;
pub mod workspace;

pub use config::DriftConfig;
pub use dataset::{CurrentWindow, Dataset, DriftMethod, DriftReport, FeatureDrift};
pub use engine::{DriftEngine, DriftThresholds, ReferenceCriteria};
pub use error::DriftError;
pub use workspace::{HttpWorkspace, InMemoryWorkspace, Workspace, WorkspaceError};
