//! Sidecar error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SidecarError {
    /// The helper binary could not be started.
    #[error("failed to spawn sidecar '{program}': {reason}")]
    SpawnFailed { program: String, reason: String },

    /// An operation needed a running sidecar.
    #[error("sidecar is not running")]
    NotRunning,

    /// Writing to or signalling the process failed.
    #[error("sidecar I/O error: {reason}")]
    Io { reason: String },

    /// The OS process list could not be read.
    #[error("failed to list processes with '{command}': {reason}")]
    ProcessList { command: String, reason: String },
}

impl From<std::io::Error> for SidecarError {
    fn from(e: std::io::Error) -> Self {
        SidecarError::Io {
            reason: e.to_string(),
        }
    }
}
