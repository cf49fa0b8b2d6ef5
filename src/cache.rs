use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use moka::future::Cache;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::configuration::Configuration;
use crate::error::{ConfigurationError, ConfigurationResult};

/// Process-lifetime cache of normalized configurations
///
/// Entries are never evicted or replaced. `moka` makes concurrent misses on the
/// same key wait for a single loader, so every caller observes the same value.
/// Failed loads are not cached.
pub struct ConfigurationCache {
    cache: Cache<String, Arc<Configuration>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ConfigurationCache {
    pub fn new() -> Self {
        Self {
            cache: Cache::builder().build(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Get a configuration from the cache, or load it if missing
    ///
    /// The `loader` future is only executed if the key is missing.
    pub async fn get_or_load<F, Fut>(
        &self,
        key: &str,
        loader: F,
    ) -> ConfigurationResult<Arc<Configuration>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ConfigurationResult<Configuration>>,
    {
        if let Some(configuration) = self.cache.get(key).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(configuration);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key, "Configuration cache miss");

        self.cache
            .try_get_with(key.to_string(), async move { loader().await.map(Arc::new) })
            .await
            .map_err(|e: Arc<ConfigurationError>| (*e).clone())
    }

    pub async fn get(&self, key: &str) -> Option<Arc<Configuration>> {
        self.cache.get(key).await
    }

    pub fn contains(&self, key: &str) -> bool {
        self.cache.contains_key(key)
    }

    pub async fn stats(&self) -> ConfigurationCacheStats {
        self.cache.run_pending_tasks().await;

        ConfigurationCacheStats {
            entry_count: self.cache.entry_count(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for ConfigurationCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics for configuration lookups
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationCacheStats {
    pub entry_count: u64,
    pub hits: u64,
    /// Lookups that found no entry; racing misses are each counted
    pub misses: u64,
}
