//! `ConfigReader` (C3): a short-TTL cache in front of `Store::get_config`.
//!
//! Grounded on the `OnceLock<Mutex<LruCache>>` caching idiom in the teacher's
//! `spatial.rs`, but deliberately not a global singleton — each
//! `ConfigReader` owns its own cache so tests can run concurrently without
//! sharing state, and callers invalidate explicitly after writing a new
//! config rather than relying on TTL expiry alone.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::clock::Clock;
use crate::error::CoreResult;
use crate::model::SystemConfig;
use crate::store::Store;

/// How long a cached config is trusted before the next read refetches it.
pub const CONFIG_CACHE_TTL: Duration = Duration::from_secs(10);

struct Cached {
    config: SystemConfig,
    fetched_at_millis: i64,
}

/// Caches `system/config` for up to [`CONFIG_CACHE_TTL`]. Falls back to
/// [`SystemConfig::defaults`] when no config document exists yet.
pub struct ConfigReader<S: Store> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    cached: Mutex<Option<Cached>>,
}

impl<S: Store> ConfigReader<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            cached: Mutex::new(None),
        }
    }

    /// Returns the current config, refetching from the store if the cache is
    /// empty or older than [`CONFIG_CACHE_TTL`].
    pub async fn get(&self) -> CoreResult<SystemConfig> {
        let now_millis = self.clock.now().timestamp_millis();

        {
            let cached = self.cached.lock().await;
            if let Some(entry) = cached.as_ref() {
                let age_millis = now_millis - entry.fetched_at_millis;
                if age_millis >= 0 && (age_millis as u64) < CONFIG_CACHE_TTL.as_millis() as u64 {
                    return Ok(entry.config.clone());
                }
            }
        }

        let config = match self.store.get_config().await? {
            Some(config) => config,
            None => SystemConfig::defaults(self.clock.now()),
        };

        let mut cached = self.cached.lock().await;
        *cached = Some(Cached {
            config: config.clone(),
            fetched_at_millis: now_millis,
        });
        Ok(config)
    }

    /// Drops the cached value so the next [`ConfigReader::get`] refetches
    /// from the store. Callers invoke this right after a manager write to
    /// `system/config` so the change is visible immediately rather than
    /// waiting out the TTL.
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }
}
