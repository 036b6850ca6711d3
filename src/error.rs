//! Error type for the fallible edges of the crate: configuration and the live service.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("processing time must be positive, got {0:?}")]
    InvalidDuration(Duration),

    #[error("config error in {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("dispatch service is no longer running")]
    ServiceClosed,
}
