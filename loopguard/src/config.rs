//! Event loop group configuration.
//!
//! All values are validated `nutype` types, so a `GroupConfig` that exists is
//! a `GroupConfig` that can be started. Configurations deserialize with a
//! default for every missing field, which lets fixtures share a small
//! JSON or YAML snippet instead of repeating every setting.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::thread_factory::{NamedThreadFactory, ThreadFactory, DEFAULT_THREAD_NAME_PREFIX};
use crate::types::{GracePeriodMs, WorkerCount};

/// Settings for one event loop group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupConfig {
    /// Number of event loops in the group.
    pub worker_count: WorkerCount,
    /// Time in-flight tasks get to finish during shutdown.
    pub grace_period: GracePeriodMs,
    /// Prefix for event loop thread names.
    pub thread_name_prefix: String,
}

impl GroupConfig {
    /// Configuration for a group of `worker_count` loops with default settings.
    pub fn new(worker_count: WorkerCount) -> Self {
        Self {
            worker_count,
            grace_period: GracePeriodMs::default(),
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
        }
    }

    /// Configuration for a single event loop.
    pub fn single_threaded() -> Self {
        Self::new(WorkerCount::one())
    }

    /// Build a configuration from raw values, validating each.
    pub fn try_from_parts(worker_count: usize, grace_period_ms: u64) -> Result<Self, ConfigError> {
        Ok(Self::new(WorkerCount::try_new(worker_count)?)
            .with_grace_period(GracePeriodMs::try_new(grace_period_ms)?))
    }

    /// Replace the shutdown grace period.
    #[must_use]
    pub fn with_grace_period(mut self, grace_period: GracePeriodMs) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Replace the thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// A thread factory honouring this configuration's naming.
    pub fn thread_factory(&self) -> Arc<dyn ThreadFactory> {
        Arc::new(NamedThreadFactory::new(self.thread_name_prefix.clone()))
    }
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self::new(WorkerCount::available_parallelism())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn single_threaded_has_one_worker() {
        let config = GroupConfig::single_threaded();

        assert_eq!(config.worker_count.get(), 1);
        assert_eq!(config.grace_period, GracePeriodMs::default());
        assert_eq!(config.thread_name_prefix, DEFAULT_THREAD_NAME_PREFIX);
    }

    #[test]
    fn try_from_parts_rejects_zero_workers() {
        let result = GroupConfig::try_from_parts(0, 100);

        assert!(matches!(result, Err(ConfigError::InvalidWorkerCount(_))));
    }

    #[test]
    fn try_from_parts_rejects_excessive_grace_period() {
        let result = GroupConfig::try_from_parts(2, 3_600_000);

        assert!(matches!(result, Err(ConfigError::InvalidGracePeriod(_))));
    }

    #[test]
    fn deserializes_with_defaults_for_missing_fields() {
        let config: GroupConfig =
            serde_json::from_str(r#"{ "worker_count": 3 }"#).expect("valid configuration");

        assert_eq!(config.worker_count.get(), 3);
        assert_eq!(config.grace_period.as_duration(), Duration::from_secs(2));
        assert_eq!(config.thread_name_prefix, DEFAULT_THREAD_NAME_PREFIX);
    }

    #[test]
    fn deserialization_validates_worker_count() {
        let result = serde_json::from_str::<GroupConfig>(r#"{ "worker_count": 0 }"#);

        assert!(result.is_err());
    }

    #[test]
    fn builder_methods_replace_fields() {
        let config = GroupConfig::single_threaded()
            .with_grace_period(GracePeriodMs::try_new(50).expect("valid grace period"))
            .with_thread_name_prefix("custom");

        assert_eq!(config.grace_period.as_duration(), Duration::from_millis(50));
        assert_eq!(config.thread_name_prefix, "custom");
    }
}
