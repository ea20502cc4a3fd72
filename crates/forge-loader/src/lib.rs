//! Remote loader adapter: the two-operation boundary the runtime uses to
//! turn a plugin identifier into a constructed, not-yet-initialized plugin
//! definition.
//!
//! Two implementations are provided: [`network::NetworkRemoteLoader`], which
//! fetches a manifest over HTTP and dynamically loads the shared library it
//! names, and [`memory::InMemoryRemoteLoader`], a registration-table stand-in
//! used by tests and the bundled demo host.

pub mod memory;
#[cfg(feature = "network")]
pub mod network;

use std::sync::Arc;

use async_trait::async_trait;
use forge_core::PluginDefinition;

/// A constructor that produces a fresh, uninitialized plugin definition.
///
/// Plugins are stateless definitions; each call to
/// [`RemoteLoader::load_constructor`]'s returned constructor yields an
/// instance ready for one `initialize` call, keeping "construct" and
/// "initialize" as distinct steps.
pub type ConstructorFn = Arc<dyn Fn() -> Result<Arc<dyn PluginDefinition>, forge_core::BoxError> + Send + Sync>;

/// The remote loader boundary.
///
/// `register_remote` makes a source of plugin code known to the runtime;
/// `load_constructor` resolves a previously registered (or directly
/// addressable) plugin identifier into a constructor.
#[async_trait]
pub trait RemoteLoader: Send + Sync {
    /// Registers a remote source (a URL, a manifest location, ...) under a
    /// plugin identifier so later `load_constructor` calls for that
    /// identifier know where to look.
    async fn register_remote(&self, plugin_id: &str, source: &str) -> Result<(), forge_core::BoxError>;

    /// Resolves a registered plugin identifier into a constructor.
    async fn load_constructor(&self, plugin_id: &str) -> Result<ConstructorFn, forge_core::BoxError>;
}
