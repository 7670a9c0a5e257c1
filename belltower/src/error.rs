//! Error taxonomy for the belltower engine.
//!
//! Every variant except `Settings` is recoverable at runtime: config errors fall
//! back to a previous or default snapshot, clip errors fall back to an estimated
//! clip length, lock errors proceed optimistically and time-sample errors make
//! the sampling loop back off and retry.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BellError>;

#[derive(Debug, Error)]
pub enum BellError {
    /// The schedule config is missing or malformed.
    #[error("config error at {path}: {message}")]
    Config { path: PathBuf, message: String },

    /// An audio clip could not be opened or inspected.
    #[error("cannot read clip {path}: {message}")]
    ClipRead { path: PathBuf, message: String },

    /// Lock ownership could not be determined or written.
    #[error("lock error at {path}: {message}")]
    Lock { path: PathBuf, message: String },

    /// The wall clock could not be sampled.
    #[error("time sample failed: {0}")]
    TimeSample(String),

    /// Engine settings are invalid. This is the only startup-fatal error.
    #[error("invalid engine settings: {0}")]
    Settings(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BellError {
    pub(crate) fn config(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Config {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn clip(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::ClipRead {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn lock(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Lock {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
