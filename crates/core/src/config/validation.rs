//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - either cache TTL is 0
    /// - `max_replay_attempts` is 0 or exceeds 100
    /// - `backend_url` is set but is not an http(s) URL
    /// - `user_id` is set but empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.catalog_ttl_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "catalog_ttl_ms".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.progress_ttl_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "progress_ttl_ms".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.max_replay_attempts == 0 || self.max_replay_attempts > 100 {
            return Err(ConfigError::Invalid {
                field: "max_replay_attempts".into(),
                reason: "must be between 1 and 100".into(),
            });
        }

        if let Some(url) = &self.backend_url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            return Err(ConfigError::Invalid {
                field: "backend_url".into(),
                reason: format!("must be an http(s) URL, got {url:?}"),
            });
        }

        if let Some(user_id) = &self.user_id
            && user_id.trim().is_empty()
        {
            return Err(ConfigError::Invalid { field: "user_id".into(), reason: "must not be empty".into() });
        }

        if self.progress_ttl_ms > self.catalog_ttl_ms {
            tracing::warn!(
                progress_ttl_ms = self.progress_ttl_ms,
                catalog_ttl_ms = self.catalog_ttl_ms,
                "progress snapshots outlive catalog data; progress may be served staler than missions"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_timeout_too_small() {
        let config = AppConfig { timeout_ms: 50, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_timeout_exceeds_limit() {
        let config = AppConfig { timeout_ms: 301_000, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_zero_ttl() {
        let config = AppConfig { progress_ttl_ms: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "progress_ttl_ms"));
    }

    #[test]
    fn test_validate_replay_attempts() {
        let config = AppConfig { max_replay_attempts: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "max_replay_attempts"));
    }

    #[test]
    fn test_validate_backend_url_scheme() {
        let config = AppConfig { backend_url: Some("ftp://example.com".into()), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "backend_url"));

        let config = AppConfig { backend_url: Some("https://example.com".into()), ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_blank_user_id() {
        let config = AppConfig { user_id: Some("  ".into()), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "user_id"));
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = AppConfig { timeout_ms: 100, max_replay_attempts: 1, ..Default::default() };
        assert!(config.validate().is_ok());
    }
}
