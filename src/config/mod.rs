//! Configuration loading and validation.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::ingest::RetryPolicy;
use crate::parse_duration;
use crate::ranking::DEFAULT_PAGE_SIZE;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Stat write retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Retries per stat write after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    200
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

/// Leaderboard paging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Wait before each extra page is revealed (e.g. "500ms", "1s")
    #[serde(default = "default_load_delay")]
    pub load_delay: String,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_load_delay() -> String {
    "500ms".to_string()
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            load_delay: default_load_delay(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub ranking: RankingConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            ingest: IngestConfig::default(),
            ranking: RankingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &PathBuf) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ranking.page_size == 0 {
            return Err(ConfigError::ValidationError(
                "Ranking page size must be greater than 0".to_string(),
            ));
        }

        if parse_duration(&self.ranking.load_delay).is_none() {
            return Err(ConfigError::ValidationError(format!(
                "Invalid ranking load delay: {}",
                self.ranking.load_delay
            )));
        }

        let backoff = self.ingest.backoff_multiplier;
        if backoff.is_nan() || backoff < 1.0 {
            return Err(ConfigError::ValidationError(
                "Backoff multiplier must be at least 1.0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.ingest.max_retries,
            initial_delay_ms: self.ingest.retry_delay_ms,
            backoff_multiplier: self.ingest.backoff_multiplier,
        }
    }

    /// Ranking load delay; validated configs always parse.
    pub fn load_delay(&self) -> Duration {
        parse_duration(&self.ranking.load_delay).unwrap_or(crate::ranking::DEFAULT_LOAD_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.log_level, "info");
        assert_eq!(config.ingest.max_retries, 2);
        assert_eq!(config.ranking.page_size, 10);
        assert_eq!(config.load_delay(), Duration::from_millis(500));
    }

    #[test]
    fn test_config_validation_ok() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_zero_page_size() {
        let mut config = AppConfig::default();
        config.ranking.page_size = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_bad_delay() {
        let mut config = AppConfig::default();
        config.ranking.load_delay = "soon".to_string();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_bad_backoff() {
        let mut config = AppConfig::default();
        config.ingest.backoff_multiplier = 0.5;
        assert!(config.validate().is_err());

        config.ingest.backoff_multiplier = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "data_dir = \"/srv/stats\"\n\n[ranking]\nload_delay = \"2s\"").unwrap();

        let config = AppConfig::from_file(&file.path().to_path_buf()).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/stats"));
        assert_eq!(config.ranking.page_size, 10);
        assert_eq!(config.load_delay(), Duration::from_secs(2));
        assert_eq!(config.retry_policy().initial_delay_ms, 200);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = AppConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();

        // Should be parseable
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.data_dir, parsed.data_dir);
        assert_eq!(config.ranking.load_delay, parsed.ranking.load_delay);
    }
}
