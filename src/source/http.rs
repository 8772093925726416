//! HTTP transport for the study-queue endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{FetchError, ReviewSource};
use crate::config::ApiConfig;
use crate::credentials::ApiKey;

/// Build the study-queue URL; the key is embedded verbatim.
pub fn study_queue_url(base_url: &str, api_key: &ApiKey) -> String {
    format!(
        "{}/api/user/{}/study-queue",
        base_url.trim_end_matches('/'),
        api_key.as_str()
    )
}

/// Fetches the study queue over HTTP.
///
/// Without an API key every fetch fails fast with [`FetchError::MissingApiKey`].
pub struct HttpReviewSource {
    client: Client,
    url: Option<String>,
}

impl HttpReviewSource {
    /// Create a source for `config`, with a request timeout of `config.timeout_ms`.
    pub fn new(config: &ApiConfig, api_key: Option<&ApiKey>) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url: api_key.map(|key| study_queue_url(&config.base_url, key)),
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.url.is_some()
    }
}

#[async_trait]
impl ReviewSource for HttpReviewSource {
    async fn fetch(&self) -> Result<String, FetchError> {
        let url = self.url.as_deref().ok_or(FetchError::MissingApiKey)?;

        // The URL carries the API key, so strip it from transport errors
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Http(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        response.text().await.map_err(|e| FetchError::Http(e.without_url()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> ApiKey {
        ApiKey::new(raw).unwrap()
    }

    #[test]
    fn test_study_queue_url() {
        let url = study_queue_url("https://www.wanikani.com", &key("abc123"));
        assert_eq!(url, "https://www.wanikani.com/api/user/abc123/study-queue");
    }

    #[test]
    fn test_study_queue_url_trailing_slash() {
        let url = study_queue_url("https://www.wanikani.com/", &key("abc123"));
        assert_eq!(url, "https://www.wanikani.com/api/user/abc123/study-queue");
    }

    #[test]
    fn test_study_queue_url_keeps_key_case() {
        let url = study_queue_url("https://example.test", &key("AbCdEf0123"));
        assert!(url.contains("/AbCdEf0123/"));
    }

    #[tokio::test]
    async fn test_missing_key_fails_fast() {
        let source = HttpReviewSource::new(&ApiConfig::default(), None).unwrap();
        assert!(!source.has_api_key());

        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, FetchError::MissingApiKey));
    }

    #[tokio::test]
    async fn test_connection_error_hides_key() {
        let config = ApiConfig {
            // Nothing listens on port 9 (discard) on loopback in CI
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_ms: 2000,
            ..Default::default()
        };
        let source = HttpReviewSource::new(&config, Some(&key("sekrit-key"))).unwrap();

        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, FetchError::Http(_)));
        assert!(!err.to_string().contains("sekrit-key"));
    }
}
