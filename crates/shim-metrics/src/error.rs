//! Error types.

use thiserror::Error;

/// Metrics errors.
///
/// `Clone` so a cached registration outcome can be handed to every caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A different series is already installed under this name.
    #[error("series already registered: {0}")]
    AlreadyRegistered(String),

    /// Descriptor could not be built.
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error while loading configuration.
    #[error("io error: {0}")]
    Io(String),

    /// Configuration file is not valid JSON.
    #[error("json error: {0}")]
    Json(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err.to_string())
    }
}

/// Result alias for metrics operations.
pub type Result<T> = std::result::Result<T, Error>;
