//! Error types for Caravan
//!
//! Uses `thiserror` for library errors; `anyhow` wraps these at the
//! binary boundary.

use thiserror::Error;

/// Result type alias for Caravan operations
pub type CaravanResult<T> = Result<T, CaravanError>;

/// Main error type for Caravan operations
#[derive(Error, Debug)]
pub enum CaravanError {
    /// Deployment parameter lookup miss where presence was assumed
    #[error("deployment parameter '{name}' is not registered")]
    MissingParameter { name: String },

    /// Deployment parameter registered twice
    #[error("deployment parameter '{name}' is already registered")]
    DuplicateParameter { name: String },

    /// Redirect key recorded twice with conflicting targets
    #[error("redirect key '{key}' in category {category} already maps to '{existing}', refusing '{conflicting}'")]
    DuplicateRedirectKey {
        category: String,
        key: String,
        existing: String,
        conflicting: String,
    },

    /// Artifact lookup miss where presence was assumed
    #[error("artifact [{name}.{artifact_type}] not found in workspace {workspace}")]
    MissingArtifact {
        name: String,
        artifact_type: String,
        workspace: String,
    },

    /// Connection kind the engine has no recreation rule for (fatal)
    #[error("unsupported connection kind '{kind}' for connection '{name}'")]
    UnsupportedConnectionKind { kind: String, name: String },

    /// Remote API call failed
    #[error("remote operation '{operation}' failed: {message}")]
    RemoteOperation { operation: String, message: String },

    /// Remote job reached the Failed terminal state
    #[error("job {job_id} failed: {reason}")]
    JobFailed { job_id: String, reason: String },

    /// Remote job reached the Cancelled terminal state
    #[error("job {job_id} was cancelled")]
    JobCancelled { job_id: String },

    /// Bounded wait exhausted before the operation reached a terminal state
    #[error("timed out after {waited_secs}s waiting for {operation}")]
    Timeout {
        operation: String,
        waited_secs: u64,
    },

    /// Definition part payload is not valid UTF-8 text
    #[error("definition part '{part}' is not valid UTF-8 text")]
    InvalidPayload { part: String },

    /// Settings file is malformed
    #[error("invalid configuration in {file}: {message}")]
    InvalidConfig { file: String, message: String },

    /// Packaged solution folder is malformed
    #[error("invalid solution package: {message}")]
    InvalidPackage { message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CaravanError {
    /// Wrap a remote failure with the name of the operation that issued it
    pub fn remote(operation: impl Into<String>, message: impl Into<String>) -> Self {
        CaravanError::RemoteOperation {
            operation: operation.into(),
            message: message.into(),
        }
    }
}
