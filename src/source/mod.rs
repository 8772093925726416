//! Review queue transport.
//!
//! This module provides:
//! - `ReviewSource` trait: one asynchronous GET of the raw study-queue payload
//! - `HttpReviewSource`: the reqwest-backed implementation
//! - `MockReviewSource`: scripted responses for tests

use async_trait::async_trait;

mod http;
mod mock;

pub use http::{HttpReviewSource, study_queue_url};
pub use mock::{MockReviewSource, study_queue_body};

/// Fetches the raw review-queue payload.
#[async_trait]
pub trait ReviewSource: Send + Sync {
    async fn fetch(&self) -> Result<String, FetchError>;
}

/// Errors that can occur while fetching the review queue
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("no API key configured")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned status {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),
}

impl FetchError {
    /// Whether retrying on the next poll can help.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::MissingApiKey => false,
            FetchError::Http(_) => true,
            FetchError::Status(status) => *status >= 500 || *status == 429,
            FetchError::Transport(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display() {
        assert_eq!(FetchError::MissingApiKey.to_string(), "no API key configured");
        assert_eq!(FetchError::Status(503).to_string(), "server returned status 503");
        assert_eq!(
            FetchError::Transport("connection reset".to_string()).to_string(),
            "transport error: connection reset"
        );
    }

    #[test]
    fn test_fetch_error_is_retryable() {
        assert!(FetchError::Status(500).is_retryable());
        assert!(FetchError::Status(429).is_retryable());
        assert!(!FetchError::Status(401).is_retryable());
        assert!(!FetchError::MissingApiKey.is_retryable());
        assert!(FetchError::Transport("eof".to_string()).is_retryable());
    }
}
