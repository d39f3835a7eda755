//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file does not exist.
    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// The config file could not be read or written.
    #[error("config I/O error at {}: {reason}", path.display())]
    Io { path: PathBuf, reason: String },

    /// The config file is not valid JSON for the expected shape.
    #[error("invalid config at {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },
}

impl ConfigError {
    pub fn io(path: &std::path::Path, e: std::io::Error) -> Self {
        ConfigError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
    }
}
