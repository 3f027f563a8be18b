//! Error types for fragment documents, item stores and reconciliation.

use thiserror::Error;

/// Item store errors
///
/// Every `ItemStore` call fails independently with one of these. The engine
/// never retries; it wraps them in [`FragmentError::Store`] and returns.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Item already exists: {0}")]
    AlreadyExists(String),

    #[error("Not a container: {0}")]
    NotAContainer(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Injected failure for {op} on {path}")]
    Injected { op: String, path: String },

    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fragment document and reconciliation errors
#[derive(Debug, Error)]
pub enum FragmentError {
    #[error("Required argument is empty: {0}")]
    NullArgument(String),

    #[error("Invalid type: {0}")]
    InvalidType(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Fragment parse error: {0}")]
    Parse(String),

    #[error("Fragment serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<config::ConfigError> for FragmentError {
    fn from(err: config::ConfigError) -> Self {
        FragmentError::Config(err.to_string())
    }
}

impl From<roxmltree::Error> for FragmentError {
    fn from(err: roxmltree::Error) -> Self {
        FragmentError::Parse(err.to_string())
    }
}
