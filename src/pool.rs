//! Bounded, keyed pools of checker and presenter instances.
//!
//! Each key (a file-type or stylesheet path) owns a free list behind its own
//! mutex. Borrowing never waits: when every instance of a key is in use and the
//! key is at capacity, the borrow fails with [`ValidatorError::PoolExhausted`].

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::PoolSettings;
use crate::error::{Result, ValidatorError};
use crate::plugin::{Checker, EngineContext, PluginRegistry, Presenter};

/// Creates pool instances on demand
pub trait InstanceFactory<T>: Send + Sync {
    fn create(&self, key: &str) -> Result<T>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum number of instances borrowed at once per key
    pub max_per_key: usize,
    /// Idle instances older than this are evicted
    pub idle_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::from(&PoolSettings::default())
    }
}

impl From<&PoolSettings> for PoolConfig {
    fn from(settings: &PoolSettings) -> Self {
        Self {
            max_per_key: settings.max_per_key,
            idle_timeout: settings.idle_timeout_seconds.map(Duration::from_secs),
        }
    }
}

struct IdleInstance<T> {
    instance: T,
    since: Instant,
}

struct Slot<T> {
    idle: Vec<IdleInstance<T>>,
    active: usize,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            idle: Vec::new(),
            active: 0,
        }
    }
}

impl<T> Slot<T> {
    fn evict_expired(&mut self, idle_timeout: Option<Duration>) -> usize {
        let Some(timeout) = idle_timeout else {
            return 0;
        };
        let before = self.idle.len();
        self.idle.retain(|idle| idle.since.elapsed() < timeout);
        before - self.idle.len()
    }
}

/// Instance counts of one key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub active: usize,
    pub idle: usize,
}

pub struct KeyedPool<T> {
    name: &'static str,
    factory: Box<dyn InstanceFactory<T>>,
    config: PoolConfig,
    slots: DashMap<String, Arc<Mutex<Slot<T>>>>,
}

impl<T: Send + 'static> KeyedPool<T> {
    pub fn new(
        name: &'static str,
        factory: impl InstanceFactory<T> + 'static,
        config: PoolConfig,
    ) -> Self {
        Self {
            name,
            factory: Box::new(factory),
            config,
            slots: DashMap::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn config(&self) -> PoolConfig {
        self.config
    }

    fn slot(&self, key: &str) -> Arc<Mutex<Slot<T>>> {
        if let Some(slot) = self.slots.get(key) {
            return slot.value().clone();
        }
        self.slots
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Slot::default())))
            .value()
            .clone()
    }

    /// Borrow an instance for `key`, creating one if none is idle
    ///
    /// The instance goes back to the pool when the returned guard is dropped.
    pub fn borrow(&self, key: &str) -> Result<Pooled<T>> {
        let slot = self.slot(key);

        let reused = {
            let mut guard = slot.lock();
            let evicted = guard.evict_expired(self.config.idle_timeout);
            if evicted > 0 {
                debug!(pool = self.name, key, evicted, "Evicted idle instances");
            }

            if let Some(idle) = guard.idle.pop() {
                guard.active += 1;
                Some(idle.instance)
            } else if guard.active < self.config.max_per_key {
                // Reserve capacity; the instance is built outside the lock
                guard.active += 1;
                None
            } else {
                warn!(
                    pool = self.name,
                    key,
                    capacity = self.config.max_per_key,
                    "Pool exhausted"
                );
                return Err(ValidatorError::PoolExhausted {
                    pool: self.name,
                    key: key.to_string(),
                    capacity: self.config.max_per_key,
                });
            }
        };

        let instance = match reused {
            Some(instance) => instance,
            None => match self.factory.create(key) {
                Ok(instance) => {
                    debug!(pool = self.name, key, "Created pooled instance");
                    instance
                }
                Err(e) => {
                    let mut guard = slot.lock();
                    guard.active = guard.active.saturating_sub(1);
                    return Err(e);
                }
            },
        };

        Ok(Pooled {
            key: key.to_string(),
            slot,
            instance: Some(instance),
        })
    }

    /// Drop idle instances older than the idle timeout, returning how many went
    pub fn evict_idle(&self) -> usize {
        let evicted: usize = self
            .slots
            .iter()
            .map(|entry| entry.value().lock().evict_expired(self.config.idle_timeout))
            .sum();
        if evicted > 0 {
            debug!(pool = self.name, evicted, "Evicted idle instances");
        }
        evicted
    }

    pub fn stats(&self, key: &str) -> PoolStats {
        self.slots
            .get(key)
            .map(|slot| {
                let slot = slot.value().lock();
                PoolStats {
                    active: slot.active,
                    idle: slot.idle.len(),
                }
            })
            .unwrap_or_default()
    }

    /// Counts summed over every key
    pub fn total_stats(&self) -> PoolStats {
        self.slots
            .iter()
            .fold(PoolStats::default(), |mut total, entry| {
                let slot = entry.value().lock();
                total.active += slot.active;
                total.idle += slot.idle.len();
                total
            })
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.slots.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        keys
    }
}

impl<T> fmt::Debug for KeyedPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedPool")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("keys", &self.slots.len())
            .finish()
    }
}

/// A borrowed instance, returned to its pool on drop
pub struct Pooled<T> {
    key: String,
    slot: Arc<Mutex<Slot<T>>>,
    instance: Option<T>,
}

impl<T> Pooled<T> {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl<T> fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pooled").field("key", &self.key).finish()
    }
}

impl<T> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.instance
            .as_ref()
            .expect("pooled instance is held until drop")
    }
}

impl<T> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.instance
            .as_mut()
            .expect("pooled instance is held until drop")
    }
}

impl<T> Drop for Pooled<T> {
    fn drop(&mut self) {
        let Some(instance) = self.instance.take() else {
            return;
        };

        let mut slot = self.slot.lock();
        slot.active = slot.active.saturating_sub(1);
        slot.idle.push(IdleInstance {
            instance,
            since: Instant::now(),
        });
    }
}

/// Builds checkers through the registry, keyed by file-type path
pub struct CheckerFactory {
    registry: Arc<PluginRegistry>,
    context: EngineContext,
}

impl CheckerFactory {
    pub fn new(registry: Arc<PluginRegistry>, context: EngineContext) -> Self {
        Self { registry, context }
    }
}

impl InstanceFactory<Box<dyn Checker>> for CheckerFactory {
    fn create(&self, path: &str) -> Result<Box<dyn Checker>> {
        let checker_type =
            self.registry
                .checker_type(path)
                .ok_or_else(|| ValidatorError::Unsupported {
                    kind: "checker",
                    key: path.to_string(),
                })?;

        checker_type
            .create(&self.context, path)
            .map_err(|source| ValidatorError::Instantiation {
                kind: "checker",
                key: path.to_string(),
                source,
            })
    }
}

/// Builds presenters through the registry, keyed by stylesheet path
pub struct PresenterFactory {
    registry: Arc<PluginRegistry>,
    context: EngineContext,
}

impl PresenterFactory {
    pub fn new(registry: Arc<PluginRegistry>, context: EngineContext) -> Self {
        Self { registry, context }
    }
}

impl InstanceFactory<Box<dyn Presenter>> for PresenterFactory {
    fn create(&self, path: &str) -> Result<Box<dyn Presenter>> {
        let renderer_type =
            self.registry
                .renderer_type(path)
                .ok_or_else(|| ValidatorError::Unsupported {
                    kind: "presenter",
                    key: path.to_string(),
                })?;

        renderer_type
            .create(&self.context, path)
            .map_err(|source| ValidatorError::Instantiation {
                kind: "presenter",
                key: path.to_string(),
                source,
            })
    }
}

pub type CheckerPool = KeyedPool<Box<dyn Checker>>;
pub type PresenterPool = KeyedPool<Box<dyn Presenter>>;
