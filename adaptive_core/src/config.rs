//! Engine configuration, loadable from TOML.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

/// Tunables for the whole pipeline.
///
/// Every field has a default, so a partial TOML document only overrides what it names:
///
/// ```toml
/// evaluator_cache_capacity = 1000
/// significance_threshold = 60.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// LRU capacity of the condition evaluator memo.
    pub evaluator_cache_capacity: usize,

    /// LRU capacity of the final-content cache.
    pub content_cache_capacity: usize,

    /// Expiry of final-content cache entries, in seconds.
    pub content_cache_ttl_secs: u64,

    /// Expiry of engagement and pattern caches, in milliseconds.
    pub engagement_cache_ttl_ms: u64,

    /// Engagement score (0-100) at which an attractor or theme group counts as significant.
    pub significance_threshold: f32,

    /// Content at least this long and already carrying transformation markers is left alone.
    pub guard_size_threshold: usize,

    /// Maximum category-specific bleed effects per call.
    pub max_bleed_effects: usize,

    /// Number of trailing nodes hashed into the content cache key.
    pub recent_window: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            evaluator_cache_capacity: 500,
            content_cache_capacity: 150,
            content_cache_ttl_secs: 600,
            engagement_cache_ttl_ms: 5000,
            significance_threshold: 50.0,
            guard_size_threshold: 8192,
            max_bleed_effects: 2,
            recent_window: 5,
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Reject values the caches cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.evaluator_cache_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "evaluator_cache_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.content_cache_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "content_cache_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=100.0).contains(&self.significance_threshold) {
            return Err(ConfigError::Invalid {
                field: "significance_threshold",
                reason: format!("{} is outside 0..=100", self.significance_threshold),
            });
        }
        Ok(())
    }

    pub fn content_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.content_cache_ttl_secs)
    }

    pub fn engagement_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.engagement_cache_ttl_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.evaluator_cache_capacity, 500);
        assert_eq!(config.engagement_cache_ttl(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config = EngineConfig::from_toml_str(
            r#"
            evaluator_cache_capacity = 64
            significance_threshold = 65.0
            "#,
        )
        .unwrap();

        assert_eq!(config.evaluator_cache_capacity, 64);
        assert_eq!(config.significance_threshold, 65.0);
        assert_eq!(config.content_cache_capacity, 150);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            EngineConfig::from_toml_str("content_cache_capacity = 0"),
            Err(ConfigError::Invalid { field: "content_cache_capacity", .. })
        ));
        assert!(EngineConfig::from_toml_str("significance_threshold = 140.0").is_err());
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            EngineConfig::from_toml_str("evaluator_cache_capacity = \"lots\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            EngineConfig::from_path("/definitely/not/here.toml"),
            Err(ConfigError::Io(_))
        ));
    }
}
