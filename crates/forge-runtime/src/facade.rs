//! Runtime facade: the public entry point coordinating the cache, the
//! plugin loader, and the lifecycle registry.
//!
//! The one top-level object a host constructs once and drives for the life
//! of the process: it owns a configuration-keyed plugin cache and a
//! lifecycle registry, and every other entry point hangs off it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use forge_core::{Context, ErrorKind, ForgeError, ForgeResult, Router};
use forge_framework::adapter::Client;
use forge_framework::loader::{InitializedPlugin, InstantiatedPlugin, LoadedPlugin, PluginLoader, RegistryEntry};
use forge_framework::registry::{shutdown_one, LifecycleRegistry};
use forge_loader::RemoteLoader;
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use tracing::debug;

use crate::cache::{CacheStats, PluginCache, DEFAULT_CAPACITY, DEFAULT_TTL};
use crate::hash::structural_hash;

/// `{ client, router, metadata, initialized }`: everything `use_plugin`
/// hands back to the caller.
///
/// `initialized` is a borrowed reference in spirit only — callers should not
/// retain it past the runtime's own lifetime, though Rust's ownership model
/// can't enforce that statically for an `Arc`; this is a documented
/// contract, not a compiler-checked one.
pub struct UseResult {
    pub client: Client,
    pub router: Arc<Router>,
    pub metadata: RegistryEntry,
    pub initialized: Arc<InitializedPlugin>,
}

/// Tunables for [`Runtime::with_options`].
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    pub cache_capacity: usize,
    pub cache_ttl: std::time::Duration,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CAPACITY,
            cache_ttl: DEFAULT_TTL,
        }
    }
}

/// The runtime facade. Generic over the concrete
/// [`RemoteLoader`] so hosts can swap `InMemoryRemoteLoader` (tests, the
/// bundled demo) for `NetworkRemoteLoader` (production) without touching
/// call sites.
pub struct Runtime<L: RemoteLoader + 'static> {
    registry_entries: HashMap<String, RegistryEntry>,
    loader: PluginLoader<L>,
    cache: PluginCache,
    lifecycle: Arc<LifecycleRegistry>,
    shut_down: AtomicBool,
}

impl<L: RemoteLoader + 'static> Runtime<L> {
    pub fn new(remote: Arc<L>, registry_entries: HashMap<String, RegistryEntry>) -> Self {
        Self::with_options(remote, registry_entries, RuntimeOptions::default())
    }

    pub fn with_options(remote: Arc<L>, registry_entries: HashMap<String, RegistryEntry>, options: RuntimeOptions) -> Self {
        let lifecycle = Arc::new(LifecycleRegistry::new());
        Self {
            registry_entries,
            loader: PluginLoader::new(remote),
            cache: PluginCache::with_capacity_and_ttl(lifecycle.clone(), options.cache_capacity, options.cache_ttl),
            lifecycle,
            shut_down: AtomicBool::new(false),
        }
    }

    fn entry(&self, id: &str) -> ForgeResult<RegistryEntry> {
        self.registry_entries
            .get(id)
            .cloned()
            .ok_or_else(|| ForgeError::new(ErrorKind::ValidatePluginId, "usePlugin").with_plugin(id))
    }

    fn guard_alive(&self, operation: &'static str) -> ForgeResult<()> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(ForgeError::new(ErrorKind::CacheLookup, operation).with_cause("runtime has already been shut down"));
        }
        Ok(())
    }

    fn fingerprint(id: &str, variables: &Value, secrets: &Value) -> String {
        let combined = Value::Object(
            [
                ("variables".to_string(), variables.clone()),
                ("secrets".to_string(), secrets.clone()),
            ]
            .into_iter()
            .collect(),
        );
        format!("{id}:{}", structural_hash(&combined))
    }

    /// Loads the plugin's constructor, exposed standalone for advanced
    /// callers who want to bypass the cache.
    pub async fn load_plugin(&self, id: &str) -> ForgeResult<LoadedPlugin> {
        let entry = self.entry(id)?;
        self.loader.load_plugin(id, &entry).await
    }

    /// Instantiates a previously loaded plugin.
    pub fn instantiate_plugin(&self, id: &str, loaded: LoadedPlugin) -> ForgeResult<InstantiatedPlugin> {
        self.loader.instantiate_plugin(id, loaded)
    }

    /// Initializes a previously instantiated plugin against config.
    pub async fn initialize_plugin(
        &self,
        instantiated: InstantiatedPlugin,
        variables: Value,
        secrets: Value,
    ) -> ForgeResult<InitializedPlugin> {
        self.loader.initialize_plugin(instantiated, variables, secrets).await
    }

    /// The cache-backed, single-flight entry point most callers use.
    pub async fn use_plugin(&self, id: &str, variables: Value, secrets: Value) -> ForgeResult<UseResult> {
        self.guard_alive("usePlugin")?;
        let entry = self.entry(id)?;

        let key = Self::fingerprint(id, &variables, &secrets);

        if self.cache.take_if_expired(&key) {
            debug!(key = %key, "cache entry past TTL; retiring before re-initializing");
            self.retire_key(&key).await;
        }

        let loader = self.loader.clone();
        let lifecycle = self.lifecycle.clone();
        let plugin_id = id.to_string();
        let cache_key = key.clone();

        let init = move || -> BoxFuture<'static, Result<Arc<InitializedPlugin>, ForgeError>> {
            async move {
                let loaded = loader.load_plugin(&plugin_id, &entry).await?;
                let instantiated = loader.instantiate_plugin(&plugin_id, loaded)?;
                let initialized = loader.initialize_plugin(instantiated, variables, secrets).await?;
                let initialized = Arc::new(initialized);
                lifecycle.register(cache_key.clone(), initialized.clone());
                Ok(initialized)
            }
            .boxed()
        };

        let initialized = self.cache.get_or_init(&key, init).await.map_err(|err| (*err).clone())?;

        let router = Arc::new(initialized.instance.definition.create_router(initialized.context.clone()));
        let contract = Arc::new(initialized.instance.definition.contract().clone());
        let state_schema = initialized.instance.definition.state_schema().cloned();
        let client = Client::with_state_schema(
            initialized.instance.id.clone(),
            contract,
            router.clone(),
            initialized.context.clone(),
            state_schema,
        );

        Ok(UseResult {
            client,
            router,
            metadata: initialized.metadata.clone(),
            initialized,
        })
    }

    /// Evicts one cache entry. Idempotent: evicting an absent fingerprint is
    /// a no-op.
    pub async fn evict_plugin(&self, id: &str, variables: &Value, secrets: &Value) -> ForgeResult<()> {
        self.guard_alive("evictPlugin")?;
        let key = Self::fingerprint(id, variables, secrets);
        if self.cache.remove(&key) {
            self.retire_key(&key).await;
        }
        Ok(())
    }

    async fn retire_key(&self, key: &str) {
        if let Some(initialized) = self.lifecycle.unregister(key) {
            shutdown_one(key, &initialized).await;
        }
    }

    /// Shuts the runtime down. After this call the runtime must not be used
    /// again; every subsequent operation fails with `cache-lookup`.
    pub async fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
        self.lifecycle.cleanup().await;
        self.cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Whether `shutdown()` has already been called.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

/// Convenience accessor so callers holding a `UseResult` can obtain the
/// context without going back through the runtime.
impl UseResult {
    pub fn context(&self) -> &Context {
        &self.initialized.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use forge_core::{ConfigSchema, Contract, PluginConfig, PluginDefinition, ProcedureDescriptor, Schema, Scope};
    use forge_loader::memory::InMemoryRemoteLoader;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    struct CountingPlugin {
        init_calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PluginDefinition for CountingPlugin {
        fn contract(&self) -> &Contract {
            static CONTRACT: std::sync::OnceLock<Contract> = std::sync::OnceLock::new();
            CONTRACT.get_or_init(|| {
                Contract::new().with_procedure("ping", ProcedureDescriptor::new(Schema::any(), Schema::any()))
            })
        }

        fn config_schema(&self) -> &ConfigSchema {
            static SCHEMA: std::sync::OnceLock<ConfigSchema> = std::sync::OnceLock::new();
            SCHEMA.get_or_init(ConfigSchema::permissive)
        }

        async fn initialize(&self, config: PluginConfig, _scope: Arc<Scope>) -> Result<Context, forge_core::BoxError> {
            self.init_calls.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(Context::new(config.variables))
        }

        async fn shutdown(&self, _context: Context) -> Result<(), forge_core::BoxError> {
            Ok(())
        }

        fn create_router(&self, _context: Context) -> Router {
            Router::new()
        }
    }

    fn test_registry() -> HashMap<String, RegistryEntry> {
        [(
            "p".to_string(),
            RegistryEntry {
                remote_url: "mem://p".to_string(),
                version: None,
                description: None,
            },
        )]
        .into_iter()
        .collect()
    }

    #[tokio::test]
    async fn same_structural_config_hits_cache_and_initializes_once() {
        let init_calls = Arc::new(AtomicUsize::new(0));
        let loader = Arc::new(InMemoryRemoteLoader::new());
        let calls = init_calls.clone();
        loader.insert(
            "p",
            Arc::new(move || -> Result<Arc<dyn PluginDefinition>, forge_core::BoxError> {
                Ok(Arc::new(CountingPlugin { init_calls: calls.clone() }))
            }),
        );

        let runtime = Runtime::new(loader, test_registry());

        let a = runtime
            .use_plugin("p", serde_json::json!({"url": "u", "timeout": 5}), serde_json::json!({}))
            .await
            .unwrap();
        let b = runtime
            .use_plugin("p", serde_json::json!({"timeout": 5, "url": "u"}), serde_json::json!({}))
            .await
            .unwrap();

        assert!(Arc::ptr_eq(&a.initialized, &b.initialized));
        assert_eq!(init_calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_config_yields_distinct_instances() {
        let init_calls = Arc::new(AtomicUsize::new(0));
        let loader = Arc::new(InMemoryRemoteLoader::new());
        let calls = init_calls.clone();
        loader.insert(
            "p",
            Arc::new(move || -> Result<Arc<dyn PluginDefinition>, forge_core::BoxError> {
                Ok(Arc::new(CountingPlugin { init_calls: calls.clone() }))
            }),
        );

        let runtime = Runtime::new(loader, test_registry());

        let a = runtime.use_plugin("p", serde_json::json!({"url": "a"}), serde_json::json!({})).await.unwrap();
        let b = runtime.use_plugin("p", serde_json::json!({"url": "b"}), serde_json::json!({})).await.unwrap();

        assert!(!Arc::ptr_eq(&a.initialized, &b.initialized));
        assert_eq!(init_calls.load(AtomicOrdering::SeqCst), 2);
    }

    #[tokio::test]
    async fn eviction_then_use_plugin_rebuilds() {
        let init_calls = Arc::new(AtomicUsize::new(0));
        let loader = Arc::new(InMemoryRemoteLoader::new());
        let calls = init_calls.clone();
        loader.insert(
            "p",
            Arc::new(move || -> Result<Arc<dyn PluginDefinition>, forge_core::BoxError> {
                Ok(Arc::new(CountingPlugin { init_calls: calls.clone() }))
            }),
        );

        let runtime = Runtime::new(loader, test_registry());
        let config = serde_json::json!({"url": "u"});

        let first = runtime.use_plugin("p", config.clone(), serde_json::json!({})).await.unwrap();
        runtime.evict_plugin("p", &config, &serde_json::json!({})).await.unwrap();
        let second = runtime.use_plugin("p", config, serde_json::json!({})).await.unwrap();

        assert!(!Arc::ptr_eq(&first.initialized, &second.initialized));
        assert_eq!(init_calls.load(AtomicOrdering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unknown_plugin_id_fails_validate_plugin_id() {
        let loader = Arc::new(InMemoryRemoteLoader::new());
        let runtime = Runtime::new(loader, HashMap::new());
        let err = runtime.use_plugin("missing", serde_json::json!({}), serde_json::json!({})).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValidatePluginId);
        assert!(!err.retryable);
    }

    #[tokio::test]
    async fn shutdown_clears_cache_and_rejects_further_use() {
        let init_calls = Arc::new(AtomicUsize::new(0));
        let loader = Arc::new(InMemoryRemoteLoader::new());
        let calls = init_calls.clone();
        loader.insert(
            "p",
            Arc::new(move || -> Result<Arc<dyn PluginDefinition>, forge_core::BoxError> {
                Ok(Arc::new(CountingPlugin { init_calls: calls.clone() }))
            }),
        );

        let runtime = Runtime::new(loader, test_registry());
        runtime.use_plugin("p", serde_json::json!({}), serde_json::json!({})).await.unwrap();
        runtime.shutdown().await;

        assert_eq!(runtime.cache_stats().entries, 0);
        let err = runtime.use_plugin("p", serde_json::json!({}), serde_json::json!({})).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::CacheLookup);
    }
}
