//! Configuration of a [`MemoryStore`] and of a [`MemoCache`].
//!
//! [`MemoryStore`]: crate::store::MemoryStore
//! [`MemoCache`]: crate::MemoCache

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::memo::Strategy;

const DEFAULT_INITIAL_CAPACITY: usize = 10_000;
const DEFAULT_MAX_COST: u64 = 1 << 30;
const DEFAULT_TTL: Duration = Duration::from_secs(2);
const DEFAULT_ENTRY_COST: u64 = 1;

/// Configuration of a [`MemoryStore`].
///
/// [`MemoryStore`]: crate::store::MemoryStore
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Number of entries the store preallocates room for.
    ///
    /// Defaults to 10 000.
    pub initial_capacity: usize,
    /// Total cost budget of the resident entries.
    ///
    /// Defaults to 1 GiB worth of cost units.
    pub max_cost: u64,
    /// Lifetime of an entry, counted from its last write.
    ///
    /// Defaults to 2s.
    #[serde(with = "humantime_serde")]
    pub default_ttl: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            max_cost: DEFAULT_MAX_COST,
            default_ttl: DEFAULT_TTL,
        }
    }
}

impl StoreConfig {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            ..Self::default()
        }
    }

    pub fn builder(default_ttl: Duration) -> StoreConfigBuilder {
        StoreConfigBuilder::new(default_ttl)
    }

    /// Checks that every parameter is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_cost == 0 {
            return Err(ConfigError::ZeroMaxCost);
        }
        if self.default_ttl.is_zero() {
            return Err(ConfigError::ZeroTtl);
        }

        Ok(())
    }
}

/// Builder for [`StoreConfig`].
pub struct StoreConfigBuilder {
    default_ttl: Duration,
    initial_capacity: Option<usize>,
    max_cost: Option<u64>,
}

impl StoreConfigBuilder {
    fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            initial_capacity: None,
            max_cost: None,
        }
    }

    pub fn initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = Some(initial_capacity);

        self
    }

    pub fn max_cost(mut self, max_cost: u64) -> Self {
        self.max_cost = Some(max_cost);

        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> Result<StoreConfig, ConfigError> {
        let config = StoreConfig {
            initial_capacity: self.initial_capacity.unwrap_or(DEFAULT_INITIAL_CAPACITY),
            max_cost: self.max_cost.unwrap_or(DEFAULT_MAX_COST),
            default_ttl: self.default_ttl,
        };
        config.validate()?;

        Ok(config)
    }
}

/// Configuration of a [`MemoCache`].
///
/// [`MemoCache`]: crate::MemoCache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Concurrency-control strategy used to deduplicate fills.
    pub strategy: Strategy,
    /// Cost charged to the store for every cached value.
    ///
    /// Defaults to 1.
    pub entry_cost: u64,
    /// Underlying store parameters.
    pub store: StoreConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            entry_cost: DEFAULT_ENTRY_COST,
            store: StoreConfig::default(),
        }
    }
}

impl CacheConfig {
    pub fn new(strategy: Strategy, store: StoreConfig) -> Self {
        Self {
            strategy,
            entry_cost: DEFAULT_ENTRY_COST,
            store,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.entry_cost == 0 {
            return Err(ConfigError::ZeroEntryCost);
        }
        self.store.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_fills_defaults() {
        let config = StoreConfig::builder(Duration::from_secs(10))
            .max_cost(100)
            .build()
            .unwrap();

        assert_eq!(config.default_ttl, Duration::from_secs(10));
        assert_eq!(config.max_cost, 100);
        assert_eq!(config.initial_capacity, DEFAULT_INITIAL_CAPACITY);
    }

    #[test]
    fn builder_rejects_invalid_parameters() {
        let ttl = Duration::from_secs(1);

        assert_eq!(
            StoreConfig::builder(ttl).max_cost(0).build(),
            Err(ConfigError::ZeroMaxCost)
        );
        assert!(StoreConfig::builder(ttl).initial_capacity(0).build().is_ok());
        assert_eq!(
            StoreConfig::builder(Duration::ZERO).build(),
            Err(ConfigError::ZeroTtl)
        );
    }

    #[test]
    fn cache_config_rejects_free_entries() {
        let config = CacheConfig {
            entry_cost: 0,
            ..CacheConfig::default()
        };

        assert_eq!(config.validate(), Err(ConfigError::ZeroEntryCost));
    }

    #[test]
    fn deserialize_from_yaml() {
        let yaml = r#"
            strategy: lock-registry
            entry_cost: 4
            store:
              max_cost: 1024
              default_ttl: 30s
              initial_capacity: 16
        "#;
        let config: CacheConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.strategy, Strategy::LockRegistry);
        assert_eq!(config.entry_cost, 4);
        assert_eq!(config.store.max_cost, 1024);
        assert_eq!(config.store.default_ttl, Duration::from_secs(30));
        assert_eq!(config.store.initial_capacity, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn deserialize_empty_uses_defaults() {
        let config: CacheConfig = serde_yaml::from_str("{}").unwrap();

        assert_eq!(config, CacheConfig::default());
    }
}
