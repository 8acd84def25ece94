//! Store adapter configuration.

use std::time::Duration;

/// Settings for [`StoreAdapter`](crate::StoreAdapter).
///
/// Sensible defaults are provided; override just the fields you care
/// about with [`StoreConfig::builder`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Prefix for every key, so several deployments can share one store.
    pub namespace: String,

    /// Upper bound on a single store call. A call that takes longer
    /// fails with [`StoreError::Timeout`](crate::StoreError::Timeout).
    pub command_timeout: Duration,

    /// How many times an idempotent call is repeated after a transient
    /// failure. Non-idempotent calls are never repeated.
    pub max_retries: u32,

    /// Pause before retry `n` is `retry_backoff * n`.
    pub retry_backoff: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            namespace: "watch-party".to_string(),
            command_timeout: Duration::from_secs(2),
            max_retries: 3,
            retry_backoff: Duration::from_millis(50),
        }
    }
}

impl StoreConfig {
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::default()
    }
}

/// Builder for [`StoreConfig`].
#[derive(Debug, Default)]
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.namespace = namespace.into();
        self
    }

    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.config.command_timeout = timeout;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.config.retry_backoff = backoff;
        self
    }

    pub fn build(self) -> StoreConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_config_default() {
        let config = StoreConfig::default();
        assert_eq!(config.namespace, "watch-party");
        assert_eq!(config.command_timeout, Duration::from_secs(2));
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_builder_overrides_only_given_fields() {
        let config = StoreConfig::builder()
            .namespace("test")
            .max_retries(0)
            .build();
        assert_eq!(config.namespace, "test");
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.retry_backoff, Duration::from_millis(50));
    }
}
