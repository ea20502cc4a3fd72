//! Plugin loader: drives the validated lifecycle of a single plugin
//! instance — load, instantiate, initialize — independently of the cache
//! that wraps it.
//!
//! Keeps "produce the live value" (`load_plugin`/`instantiate_plugin`)
//! separate from "run its lifecycle hooks" (`initialize_plugin`) so each
//! step fails with its own tagged error kind instead of one catch-all.

use std::sync::Arc;

use forge_core::{ForgeError, ForgeResult, PluginConfig, PluginDefinition, PluginInstance, Scope};
use forge_loader::RemoteLoader;
use tracing::{info, warn};

/// One entry of the plugin registry configuration: where to fetch
/// a plugin's code from, and descriptive metadata carried through to the
/// `useResult` bundle untouched.
#[derive(Clone, Debug)]
pub struct RegistryEntry {
    pub remote_url: String,
    pub version: Option<String>,
    pub description: Option<String>,
}

/// `{ constructor, metadata }` — the result of `loadPlugin`.
pub struct LoadedPlugin {
    pub constructor: forge_loader::ConstructorFn,
    pub metadata: RegistryEntry,
}

/// `{ plugin, metadata }` — the result of `instantiatePlugin`.
pub struct InstantiatedPlugin {
    pub instance: PluginInstance,
    pub metadata: RegistryEntry,
}

/// `{ plugin, metadata, config, context, scope }` — the result of
/// `initializePlugin`, and the runtime's primary cache value.
pub struct InitializedPlugin {
    pub instance: PluginInstance,
    pub metadata: RegistryEntry,
    pub config: PluginConfig,
    pub context: forge_core::Context,
    pub scope: Arc<Scope>,
}

/// Drives `loadPlugin` / `instantiatePlugin` / `initializePlugin` against a
/// concrete [`RemoteLoader`] implementation.
pub struct PluginLoader<L: RemoteLoader> {
    remote: Arc<L>,
}

impl<L: RemoteLoader> Clone for PluginLoader<L> {
    fn clone(&self) -> Self {
        Self { remote: self.remote.clone() }
    }
}

impl<L: RemoteLoader> PluginLoader<L> {
    pub fn new(remote: Arc<L>) -> Self {
        Self { remote }
    }

    /// Registers the remote and loads its constructor function.
    pub async fn load_plugin(&self, plugin_id: &str, entry: &RegistryEntry) -> ForgeResult<LoadedPlugin> {
        self.remote
            .register_remote(plugin_id, &entry.remote_url)
            .await
            .map_err(|cause| {
                ForgeError::new(forge_core::ErrorKind::RegisterRemote, "loadPlugin")
                    .with_plugin(plugin_id)
                    .with_cause(cause)
                    .retryable(true)
            })?;

        let constructor = self.remote.load_constructor(plugin_id).await.map_err(|cause| {
            ForgeError::new(forge_core::ErrorKind::LoadRemote, "loadPlugin")
                .with_plugin(plugin_id)
                .with_cause(cause)
                .retryable(false)
        })?;

        Ok(LoadedPlugin {
            constructor,
            metadata: entry.clone(),
        })
    }

    /// Calls the loaded constructor to produce a live plugin definition.
    pub fn instantiate_plugin(&self, plugin_id: &str, loaded: LoadedPlugin) -> ForgeResult<InstantiatedPlugin> {
        let definition: Arc<dyn PluginDefinition> = (loaded.constructor)().map_err(|cause| {
            ForgeError::new(forge_core::ErrorKind::InstantiatePlugin, "instantiatePlugin")
                .with_plugin(plugin_id)
                .with_cause(cause)
                .retryable(false)
        })?;

        Ok(InstantiatedPlugin {
            instance: PluginInstance::new(plugin_id, definition),
            metadata: loaded.metadata,
        })
    }

    /// Validates config and secrets, hydrates secrets into the variables,
    /// re-validates the hydrated result, then runs the plugin's own
    /// `initialize` hook.
    pub async fn initialize_plugin(
        &self,
        instantiated: InstantiatedPlugin,
        variables: serde_json::Value,
        secrets: serde_json::Value,
    ) -> ForgeResult<InitializedPlugin> {
        let InstantiatedPlugin { instance, metadata } = instantiated;
        let definition = instance.definition.clone();

        definition
            .config_schema()
            .variables
            .validate(&variables)
            .map_err(|cause| {
                ForgeError::new(forge_core::ErrorKind::ValidateConfig, "initializePlugin")
                    .with_plugin(&instance.id)
                    .with_cause(cause)
            })?;

        definition.config_schema().secrets.validate(&secrets).map_err(|cause| {
            ForgeError::new(forge_core::ErrorKind::ValidateSecrets, "initializePlugin")
                .with_plugin(&instance.id)
                .with_cause(cause)
        })?;

        let hydrated_variables = forge_core::hydrate(&variables, &secrets);

        definition
            .config_schema()
            .variables
            .validate(&hydrated_variables)
            .map_err(|cause| {
                ForgeError::new(forge_core::ErrorKind::ValidateHydratedConfig, "initializePlugin")
                    .with_plugin(&instance.id)
                    .with_cause(cause)
            })?;

        let config = PluginConfig::new(hydrated_variables, secrets);
        let scope = Scope::new();

        let context = definition
            .initialize(config.clone(), scope.clone())
            .await
            .map_err(|cause| ForgeError::initialize_plugin(&instance.id, cause.to_string()))?;

        info!(plugin_id = %instance.id, "plugin initialized");

        Ok(InitializedPlugin {
            instance,
            metadata,
            config,
            context,
            scope,
        })
    }
}

/// Checks a plugin's declared API version against the host's, logging a
/// warning rather than failing — an unrecognized version is surprising but
/// not necessarily incompatible, so loading proceeds.
pub fn check_api_compatibility(plugin_id: &str, declared_version: u32) {
    if !PluginInstance::is_api_compatible(declared_version) {
        warn!(
            plugin_id,
            declared_version,
            host_version = forge_core::FORGE_PLUGIN_API_VERSION,
            "plugin declares an incompatible API version; loading anyway"
        );
    }
}
