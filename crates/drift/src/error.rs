use crate::dataset::CurrentWindow;
use crate::workspace::WorkspaceError;
use telemetry::StoreError;
use thiserror::Error;

/// A failed run terminates without persisting a partial report.
#[derive(Error, Debug)]
pub enum DriftError {
    #[error("trace store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error("reference dataset {0} does not exist; create it first")]
    ReferenceNotFound(String),

    #[error("only {found} of the {required} required qualifying detections exist")]
    InsufficientData { required: usize, found: usize },

    #[error("no prediction events in the current window {0}")]
    EmptyCurrentWindow(CurrentWindow),
}
