//! Error types for wkbar
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

pub use crate::snapshot::ParseError;
pub use crate::source::FetchError;

/// All error types that can occur in wkbar
#[derive(Debug, Error)]
pub enum WkbarError {
    /// Invalid or unusable configuration
    #[error("Config error: {0}")]
    Config(String),

    /// API key could not be read
    #[error("Credentials error: {0}")]
    Credentials(String),

    /// Server payload could not be turned into a snapshot
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Review queue request failed
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for wkbar operations
pub type Result<T> = std::result::Result<T, WkbarError>;
