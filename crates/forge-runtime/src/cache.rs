//! Configuration-keyed instance cache: bounded capacity, 60-minute TTL, and
//! single-flight lookup.
//!
//! Keyed by `{pluginId}:{structuralHash(config)}`; the value type is a
//! shared future rather than a plain value so that concurrent misses on the
//! same key coalesce into exactly one `initialize` invocation instead of
//! racing each other.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use forge_core::ForgeError;
use forge_framework::loader::InitializedPlugin;
use forge_framework::registry::{shutdown_one, LifecycleRegistry};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::warn;

/// Bound on cache entries.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Entry lifetime before it's treated as stale.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// What a cache entry's single-flight future resolves to. The error side is
/// `Arc`-wrapped so every concurrent waiter on the same [`Shared`] future
/// gets an independent, owned copy of the one failure.
pub type InitResult = Result<Arc<InitializedPlugin>, Arc<ForgeError>>;
type SharedInit = Shared<BoxFuture<'static, InitResult>>;

struct CacheEntry {
    future: SharedInit,
    created_at: Instant,
}

/// Read-only snapshot of cache activity.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

#[derive(Default)]
struct Counters {
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// The runtime's single plugin instance cache.
///
/// Holds a reference to the [`LifecycleRegistry`] only so that capacity
/// overflow can retire the evicted entry the same way an explicit
/// `evictPlugin` or TTL expiry would (see `forge_runtime::facade`) —
/// insertion-order eviction must not silently leak a live scope.
pub struct PluginCache {
    entries: DashMap<String, CacheEntry>,
    order: Mutex<VecDeque<String>>,
    capacity: usize,
    ttl: Duration,
    registry: Arc<LifecycleRegistry>,
    counters: Mutex<Counters>,
}

impl PluginCache {
    pub fn new(registry: Arc<LifecycleRegistry>) -> Self {
        Self::with_capacity_and_ttl(registry, DEFAULT_CAPACITY, DEFAULT_TTL)
    }

    pub fn with_capacity_and_ttl(registry: Arc<LifecycleRegistry>, capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            capacity,
            ttl,
            registry,
            counters: Mutex::new(Counters::default()),
        }
    }

    /// Single-flight lookup keyed by `key`: if a live (non-expired) entry
    /// exists, every caller shares the same future; otherwise `init` runs
    /// exactly once and its result becomes the entry.
    ///
    /// The occupied/vacant check and the vacant-branch insert happen under
    /// one `DashMap::entry` shard lock, so two threads racing a miss on the
    /// same key can never both construct and insert their own future — one
    /// observes `Vacant` and wins the insert, the other observes `Occupied`
    /// and shares its future. A plain `get` followed by a separate `insert`
    /// has a window between the two calls where both threads see a miss.
    ///
    /// Callers must invoke [`Self::take_if_expired`] first — this method
    /// does not itself check TTL so that expiry retirement (which must
    /// close the stale scope and run `shutdown`) stays in the caller's
    /// control.
    pub async fn get_or_init<F>(&self, key: &str, init: F) -> InitResult
    where
        F: FnOnce() -> BoxFuture<'static, Result<Arc<InitializedPlugin>, ForgeError>> + Send + 'static,
    {
        let (shared, inserted) = match self.entries.entry(key.to_string()) {
            Entry::Occupied(occupied) => {
                self.counters.lock().hits += 1;
                (occupied.get().future.clone(), false)
            }
            Entry::Vacant(vacant) => {
                self.counters.lock().misses += 1;
                let future: BoxFuture<'static, InitResult> = async move { init().await.map_err(Arc::new) }.boxed();
                let shared = future.shared();
                vacant.insert(CacheEntry { future: shared.clone(), created_at: Instant::now() });
                (shared, true)
            }
        };

        // Capacity/order bookkeeping happens after the `entry` shard guard
        // above has already been dropped, so evicting a different key here
        // never tries to re-lock the shard we just inserted into.
        if inserted {
            self.record_insertion(key.to_string());
        }

        let result = shared.await;
        if result.is_err() {
            // Failed entries are discarded, never cached as a poison value
            // beyond the single failed lookup. Only the caller that actually
            // won the insert reaches a failing future through this branch
            // for a fresh key — callers that hit `Occupied` above share the
            // same `Shared` future and observe the same `Err` without racing
            // this cleanup themselves.
            self.entries.remove(key);
            self.forget_order(key);
        }
        result
    }

    /// If `key`'s entry has outlived the TTL, removes it. TTL-driven
    /// eviction is treated the same as an explicit evict — the caller is
    /// responsible for retiring whatever was registered under this key in
    /// the [`LifecycleRegistry`].
    pub fn take_if_expired(&self, key: &str) -> bool {
        let expired = self
            .entries
            .get(key)
            .is_some_and(|entry| entry.created_at.elapsed() >= self.ttl);

        if expired {
            self.entries.remove(key);
            self.forget_order(key);
        }
        expired
    }

    /// Removes `key`'s entry unconditionally, idempotently: removing an
    /// absent key is a no-op. Returns whether anything was present.
    pub fn remove(&self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.forget_order(key);
        }
        removed
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.order.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        let counters = self.counters.lock();
        CacheStats {
            entries: self.entries.len(),
            hits: counters.hits,
            misses: counters.misses,
            evictions: counters.evictions,
        }
    }

    fn forget_order(&self, key: &str) {
        self.order.lock().retain(|k| k != key);
    }

    /// Records a fresh key in insertion order, evicting the oldest entry if
    /// this pushes the cache over capacity. Called only after the entry has
    /// already been inserted into `self.entries` by `get_or_init`'s
    /// `Entry::Vacant` arm, so this never contends with the `DashMap` shard
    /// lock that guarded the insert itself. The evicted entry's initialized
    /// plugin (if it ever resolved) is retired in the background — capacity
    /// pressure must not leak a live scope any more than TTL expiry does.
    fn record_insertion(&self, key: String) {
        let evicted_key = {
            let mut order = self.order.lock();
            order.push_back(key);
            if order.len() > self.capacity {
                order.pop_front()
            } else {
                None
            }
        };

        if let Some(evicted_key) = evicted_key {
            self.entries.remove(&evicted_key);
            self.counters.lock().evictions += 1;
            warn!(key = %evicted_key, "plugin cache at capacity; evicting oldest entry");

            let registry = self.registry.clone();
            tokio::spawn(async move {
                if let Some(initialized) = registry.unregister(&evicted_key) {
                    shutdown_one(&evicted_key, &initialized).await;
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::{PluginConfig, Scope};
    use forge_framework::loader::RegistryEntry;

    fn dummy_metadata() -> RegistryEntry {
        RegistryEntry {
            remote_url: "mem://test".to_string(),
            version: None,
            description: None,
        }
    }

    #[tokio::test]
    async fn single_flight_runs_init_once_for_concurrent_callers() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let registry = Arc::new(LifecycleRegistry::new());
        let cache = Arc::new(PluginCache::new(registry.clone()));
        let call_count = Arc::new(AtomicUsize::new(0));

        let make_init = || {
            let call_count = call_count.clone();
            move || -> BoxFuture<'static, Result<Arc<InitializedPlugin>, ForgeError>> {
                let call_count = call_count.clone();
                async move {
                    call_count.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok(Arc::new(InitializedPlugin {
                        instance: forge_core::PluginInstance::new("p", test_plugin()),
                        metadata: dummy_metadata(),
                        config: PluginConfig::new(serde_json::json!({}), serde_json::json!({})),
                        context: forge_core::Context::new(()),
                        scope: Scope::new(),
                    }))
                }
                .boxed()
            }
        };

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let init = make_init();
            handles.push(tokio::spawn(async move { cache.get_or_init("p:abc", init).await }));
        }

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    /// Uses a real multi-threaded, multi-worker runtime (current-thread
    /// scheduling can never interleave two tasks mid-instruction, so it
    /// can't expose a TOCTOU window between a miss-check and an insert).
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn single_flight_holds_under_real_thread_contention() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Barrier;

        let registry = Arc::new(LifecycleRegistry::new());
        let cache = Arc::new(PluginCache::new(registry));
        let call_count = Arc::new(AtomicUsize::new(0));
        // Barrier so every task reaches `get_or_init` at roughly the same
        // instant instead of trickling in one at a time.
        let barrier = Arc::new(Barrier::new(32));

        let mut handles = Vec::new();
        for _ in 0..32 {
            let cache = cache.clone();
            let call_count = call_count.clone();
            let barrier = barrier.clone();
            handles.push(tokio::spawn(async move {
                barrier.wait();
                let call_count = call_count.clone();
                cache
                    .get_or_init("p:contended", move || {
                        let call_count = call_count.clone();
                        async move {
                            call_count.fetch_add(1, Ordering::SeqCst);
                            Ok(Arc::new(InitializedPlugin {
                                instance: forge_core::PluginInstance::new("p", test_plugin()),
                                metadata: dummy_metadata(),
                                config: PluginConfig::new(serde_json::json!({}), serde_json::json!({})),
                                context: forge_core::Context::new(()),
                                scope: Scope::new(),
                            }))
                        }
                        .boxed()
                    })
                    .await
            }));
        }

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_init_is_not_cached() {
        let registry = Arc::new(LifecycleRegistry::new());
        let cache = PluginCache::new(registry);

        let result = cache
            .get_or_init("p:fail", || {
                async { Err(ForgeError::new(forge_core::ErrorKind::InstantiatePlugin, "test")) }.boxed()
            })
            .await;
        assert!(result.is_err());
        assert_eq!(cache.stats().entries, 0);
    }

    fn test_plugin() -> Arc<dyn forge_core::PluginDefinition> {
        struct Noop;

        #[async_trait::async_trait]
        impl forge_core::PluginDefinition for Noop {
            fn contract(&self) -> &forge_core::Contract {
                static CONTRACT: std::sync::OnceLock<forge_core::Contract> = std::sync::OnceLock::new();
                CONTRACT.get_or_init(forge_core::Contract::new)
            }

            fn config_schema(&self) -> &forge_core::ConfigSchema {
                static SCHEMA: std::sync::OnceLock<forge_core::ConfigSchema> = std::sync::OnceLock::new();
                SCHEMA.get_or_init(forge_core::ConfigSchema::permissive)
            }

            async fn initialize(
                &self,
                _config: PluginConfig,
                _scope: Arc<Scope>,
            ) -> Result<forge_core::Context, forge_core::BoxError> {
                Ok(forge_core::Context::new(()))
            }

            fn create_router(&self, _context: forge_core::Context) -> forge_core::Router {
                forge_core::Router::new()
            }
        }

        Arc::new(Noop)
    }
}
