pub use anyhow::{anyhow, bail, Context, Error, Result};
pub use log::{debug, error, info, trace, warn};

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ToolError {
    #[error("Failed to find {0:?} executable in PATH")]
    NotFound(String),
    #[error("Process ({tool} {args:?}) exited with error: {stderr}")]
    Failed {
        tool: String,
        args: Vec<String>,
        stderr: String,
    },
    #[error("Process ({tool} {args:?}) wrote to stderr: {stderr}")]
    Stderr {
        tool: String,
        args: Vec<String>,
        stdout: String,
        stderr: String,
    },
}

#[derive(Debug, ThisError)]
pub enum GraphError {
    #[error("Invalid dependency line: {0:?}")]
    InvalidDependencyLine(String),
    #[error("Invalid output of go list -m: {0:?}")]
    InvalidModuleList(String),
}

#[derive(Debug, ThisError)]
pub enum VersionError {
    #[error("{0:?} is not a valid semantic version")]
    InvalidSemVer(String),
}

#[derive(Debug, ThisError)]
pub enum ScanError {
    #[error("Failed to parse nancy output")]
    Unparsable,
    #[error("Invalid package coordinates: {0:?}")]
    InvalidCoordinates(String),
}

#[derive(Debug, ThisError)]
pub enum ModulesError {
    #[error("go mod tidy failed after editing go.mod: {0}")]
    Tidy(String),
}

#[derive(Debug, ThisError)]
pub enum HistoryError {
    #[error("Invalid revision index {index} (history has {len} revisions)")]
    InvalidRevision { index: usize, len: usize },
}

/// A rollback that failed while handling another error. Both are kept.
#[derive(Debug, ThisError)]
#[error("{cause:#}; additionally failed to roll back: {rollback:#}")]
pub struct RollbackError {
    pub cause: Error,
    pub rollback: Error,
}

/// Errors that must stop the whole run instead of evicting a single package.
pub fn is_run_fatal(err: &Error) -> bool {
    err.chain().any(|cause| {
        matches!(cause.downcast_ref::<ToolError>(), Some(ToolError::NotFound(_)))
            || cause.is::<GraphError>()
            || cause.is::<VersionError>()
            || cause.is::<HistoryError>()
            || cause.is::<RollbackError>()
    })
}

pub fn is_scan_unparsable(err: &Error) -> bool {
    err.chain()
        .any(|cause| matches!(cause.downcast_ref::<ScanError>(), Some(ScanError::Unparsable)))
}
