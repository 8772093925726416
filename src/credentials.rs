//! API key discovery.
//!
//! Search order:
//! 1. `WANIKANI_API_KEY` environment variable
//! 2. Configured key files, or the default key files:
//!    `~/.wanikani-api-key`, `~/Dropbox/.wanikani-api-key`, `~/.config/wanikani-api-key`
//!
//! The first non-empty key wins. If nothing is found a single warning lists
//! every place that was searched.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, WkbarError};

/// Environment variable consulted before any key file.
pub const API_KEY_ENV: &str = "WANIKANI_API_KEY";

/// A WaniKani API key. Case-sensitive; never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Trim `raw`; `None` if nothing is left.
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(****)")
    }
}

/// Default key file locations under the home directory.
pub fn default_key_paths() -> Vec<PathBuf> {
    let Some(home) = dirs::home_dir() else {
        return Vec::new();
    };
    vec![
        home.join(".wanikani-api-key"),
        home.join("Dropbox").join(".wanikani-api-key"),
        home.join(".config").join("wanikani-api-key"),
    ]
}

/// Read a key file.
pub fn read_api_key(path: &Path) -> Result<ApiKey> {
    let content = fs::read_to_string(path)?;
    ApiKey::new(&content).ok_or_else(|| WkbarError::Credentials(format!("{} is empty", path.display())))
}

/// First readable, non-empty key among `paths`.
pub fn find_api_key_in(paths: &[PathBuf]) -> Option<ApiKey> {
    paths.iter().find_map(|path| match read_api_key(path) {
        Ok(key) => {
            log::debug!("Using API key from {}", path.display());
            Some(key)
        }
        Err(e) => {
            log::debug!("No API key at {}: {}", path.display(), e);
            None
        }
    })
}

/// Discover the API key from the environment, then `paths` (or the defaults if empty).
pub fn discover_api_key(paths: &[PathBuf]) -> Option<ApiKey> {
    if let Some(key) = std::env::var(API_KEY_ENV).ok().as_deref().and_then(ApiKey::new) {
        log::debug!("Using API key from ${}", API_KEY_ENV);
        return Some(key);
    }

    let paths = if paths.is_empty() { default_key_paths() } else { paths.to_vec() };
    let found = find_api_key_in(&paths);

    if found.is_none() {
        let searched: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
        log::warn!(
            "Could not find an API key in ${} or any of the following paths:\n{}\n\
             Create one of these files containing your WaniKani v1 API key.",
            API_KEY_ENV,
            searched.join("\n")
        );
    }

    found
}
