//! Configuration for wkbar.
//!
//! Loaded from YAML with a fallback chain:
//! 1. Explicit path if provided
//! 2. ~/.config/wkbar/wkbar.yml (user config)
//! 3. ./wkbar.yml
//! 4. Default values

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::display::Labels;
use crate::error::{Result, WkbarError};
use crate::snapshot::EpochUnit;
use crate::tracker::{RefreshStrategy, TrackerConfig};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub polling: PollingConfig,
    pub labels: Labels,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub next_review_unit: EpochUnit,
    /// Key files to search; empty means the built-in defaults
    pub key_paths: Vec<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.wanikani.com".to_string(),
            timeout_ms: 30000,
            next_review_unit: EpochUnit::Seconds,
            key_paths: Vec::new(),
        }
    }
}

/// How the displayed countdown is kept fresh between polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshMode {
    /// Recompute on a fixed short interval
    #[default]
    Interval,
    /// Wake exactly when the displayed minute rolls over
    MinuteBoundary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub initial_delay_ms: u64,
    pub interval_secs: u64,
    pub refresh: RefreshMode,
    pub refresh_interval_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1000,
            interval_secs: 10 * 60,
            refresh: RefreshMode::Interval,
            refresh_interval_secs: 30,
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, it must load
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;

        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Reject values that would spin timers or never fire.
    pub fn validate(&self) -> Result<()> {
        if self.polling.interval_secs == 0 {
            return Err(WkbarError::Config("polling.interval_secs must be positive".to_string()));
        }
        if self.polling.refresh == RefreshMode::Interval && self.polling.refresh_interval_secs == 0 {
            return Err(WkbarError::Config(
                "polling.refresh_interval_secs must be positive".to_string(),
            ));
        }
        if self.api.timeout_ms == 0 {
            return Err(WkbarError::Config("api.timeout_ms must be positive".to_string()));
        }
        Ok(())
    }

    /// Runtime settings for a [`ReviewTracker`](crate::tracker::ReviewTracker).
    pub fn tracker_config(&self) -> TrackerConfig {
        let refresh = match self.polling.refresh {
            RefreshMode::Interval => {
                RefreshStrategy::Interval(Duration::from_secs(self.polling.refresh_interval_secs))
            }
            RefreshMode::MinuteBoundary => RefreshStrategy::MinuteBoundary,
        };

        TrackerConfig {
            poll_initial_delay: Duration::from_millis(self.polling.initial_delay_ms),
            poll_interval: Duration::from_secs(self.polling.interval_secs),
            refresh,
            epoch_unit: self.api.next_review_unit,
            labels: self.labels.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "https://www.wanikani.com");
        assert_eq!(config.api.timeout_ms, 30000);
        assert_eq!(config.api.next_review_unit, EpochUnit::Seconds);
        assert_eq!(config.polling.initial_delay_ms, 1000);
        assert_eq!(config.polling.interval_secs, 600);
        assert_eq!(config.polling.refresh, RefreshMode::Interval);
        assert_eq!(config.polling.refresh_interval_secs, 30);
        assert_eq!(config.labels.prefix, "WK");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
polling:
  interval_secs: 300
labels:
  prefix: "鰐蟹"
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.polling.interval_secs, 300);
        assert_eq!(config.polling.initial_delay_ms, 1000);
        assert_eq!(config.labels.prefix, "鰐蟹");
        assert_eq!(config.labels.reviews_suffix, "枚");
        assert_eq!(config.api.base_url, "https://www.wanikani.com");
    }

    #[test]
    fn test_yaml_enums() {
        let yaml = r#"
api:
  next_review_unit: milliseconds
polling:
  refresh: minute_boundary
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.api.next_review_unit, EpochUnit::Milliseconds);
        assert_eq!(config.polling.refresh, RefreshMode::MinuteBoundary);
    }

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("wkbar.yml");
        fs::write(
            &path,
            "api:\n  base_url: http://localhost:8080\n  key_paths: [/tmp/a, /tmp/b]\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.api.base_url, "http://localhost:8080");
        assert_eq!(config.api.key_paths, vec![PathBuf::from("/tmp/a"), PathBuf::from("/tmp/b")]);
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing.yml");
        assert!(matches!(Config::load(Some(&path)), Err(WkbarError::Io(_))));
    }

    #[test]
    fn test_load_invalid_yaml_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("wkbar.yml");
        fs::write(&path, "polling: [not, a, map]\n").unwrap();
        assert!(matches!(Config::load(Some(&path)), Err(WkbarError::Yaml(_))));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = Config::default();
        config.polling.interval_secs = 0;
        assert!(matches!(config.validate(), Err(WkbarError::Config(_))));
    }

    #[test]
    fn test_validate_zero_refresh_ok_for_minute_boundary() {
        let mut config = Config::default();
        config.polling.refresh_interval_secs = 0;
        assert!(config.validate().is_err());

        config.polling.refresh = RefreshMode::MinuteBoundary;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_tracker_config() {
        let mut config = Config::default();
        config.polling.initial_delay_ms = 250;
        config.api.next_review_unit = EpochUnit::Milliseconds;

        let tracker = config.tracker_config();
        assert_eq!(tracker.poll_initial_delay, Duration::from_millis(250));
        assert_eq!(tracker.poll_interval, Duration::from_secs(600));
        assert_eq!(tracker.refresh, RefreshStrategy::Interval(Duration::from_secs(30)));
        assert_eq!(tracker.epoch_unit, EpochUnit::Milliseconds);

        config.polling.refresh = RefreshMode::MinuteBoundary;
        assert_eq!(config.tracker_config().refresh, RefreshStrategy::MinuteBoundary);
    }
}
