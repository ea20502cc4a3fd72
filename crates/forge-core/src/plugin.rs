//! The plugin black box itself: a constructible value exposing
//! `initialize`/`shutdown`/`createRouter`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::BoxError;
use crate::contract::Contract;
use crate::router::{Context, Router};
use crate::schema::{ConfigSchema, Schema};
use crate::scope::Scope;

/// The lowest API version this runtime will load without a compatibility
/// warning.
pub const FORGE_PLUGIN_API_VERSION: u32 = 1;

/// A validated, secrets-hydrated configuration tree, ready to be passed to
/// `initialize`.
#[derive(Clone, Debug)]
pub struct PluginConfig {
    pub variables: Value,
    pub secrets: Value,
}

impl PluginConfig {
    pub fn new(variables: Value, secrets: Value) -> Self {
        Self { variables, secrets }
    }
}

/// A loaded plugin's black-box surface. Implementors are produced by a
/// [`crate::error::BoxError`]-returning constructor loaded through a remote
/// loader; the runtime only ever calls through this trait afterward.
#[async_trait]
pub trait PluginDefinition: Send + Sync {
    /// The procedures this plugin exposes, with their schemas.
    fn contract(&self) -> &Contract;

    /// The `{ variables, secrets }` schema pair configuration must satisfy.
    fn config_schema(&self) -> &ConfigSchema;

    /// The schema any `nextState` this plugin emits from a streaming
    /// procedure must satisfy. `None` means no state-shape contract is
    /// declared, which callers should treat as permissive.
    fn state_schema(&self) -> Option<&Schema> {
        None
    }

    /// Brings the plugin instance to life for one cache entry, returning the
    /// opaque context later passed to every router invocation.
    async fn initialize(&self, config: PluginConfig, scope: Arc<Scope>) -> Result<Context, BoxError>;

    /// Best-effort teardown. Called once, before the instance's [`Scope`] is
    /// closed: callers shut down the instance first, then close its scope.
    async fn shutdown(&self, _context: Context) -> Result<(), BoxError> {
        Ok(())
    }

    /// Builds the dispatch table bound to one initialized instance's
    /// context.
    fn create_router(&self, context: Context) -> Router;
}

/// A plugin instance as stamped by the loader: the definition plus the
/// identifier the rest of the runtime addresses it by.
///
/// Kept as a wrapper rather than mutable state on the trait object so
/// `PluginDefinition` itself stays free of interior mutability concerns.
#[derive(Clone)]
pub struct PluginInstance {
    pub id: String,
    pub definition: Arc<dyn PluginDefinition>,
}

impl PluginInstance {
    pub fn new(id: impl Into<String>, definition: Arc<dyn PluginDefinition>) -> Self {
        Self {
            id: id.into(),
            definition,
        }
    }

    /// Whether this instance declares an API version compatible with the
    /// host runtime. Incompatibility is logged, not fatal.
    pub fn is_api_compatible(declared_version: u32) -> bool {
        declared_version == FORGE_PLUGIN_API_VERSION
    }
}
