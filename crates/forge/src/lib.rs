//! # Forge
//!
//! A dynamically-loaded, schema-validated plugin runtime for Rust.
//!
//! ## Overview
//!
//! Forge lets a host process load independently built plugins over the
//! network, validate and initialize them against declared schemas, cache
//! initialized instances keyed by configuration, expose their procedures as
//! typed clients, and drive streaming procedures through a controlled
//! execution loop with backpressure and termination semantics.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌────────────┐
//! │   Runtime   │────▶│ PluginCache │────▶│ PluginLoader│──▶ RemoteLoader
//! │  (facade)   │     │ (keyed,     │     │ (lifecycle) │
//! │             │     │  TTL, LRU)  │     └────────────┘
//! └─────────────┘     └─────────────┘
//!        │
//!        ▼
//! ┌─────────────┐     ┌────────────┐
//! │   Client    │────▶│   Router   │──▶ plugin's handlers
//! │ (validated) │     │ (dispatch) │
//! └─────────────┘     └────────────┘
//! ```
//!
//! - **Runtime**: owns the cache and lifecycle registry; the one object a
//!   host constructs and drives for the life of the process.
//! - **PluginLoader**: drives load → instantiate → initialize for one
//!   plugin instance.
//! - **Client/Router**: the typed, validated call surface derived from an
//!   initialized plugin's declared contract.
//! - **Streaming driver**: turns a streamable procedure into a bounded,
//!   cancellable item sequence.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use forge::prelude::*;
//! use forge_loader::memory::InMemoryRemoteLoader;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let loader = std::sync::Arc::new(InMemoryRemoteLoader::new());
//!     loader.insert("counter", my_counter_plugin_constructor());
//!
//!     let registry = [("counter".to_string(), RegistryEntry {
//!         remote_url: "mem://counter".to_string(),
//!         version: None,
//!         description: None,
//!     })].into_iter().collect();
//!
//!     let runtime = Runtime::new(loader, registry);
//!     let bundle = runtime
//!         .use_plugin("counter", serde_json::json!({}), serde_json::json!({}))
//!         .await?;
//!     let out = bundle.client.call("ping", serde_json::json!({})).await?;
//!     runtime.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `network` (default): the HTTP/dynamic-library-backed `RemoteLoader`.
//! - `json-log`: JSON-formatted `tracing` output.
//! - `macros`: the `contract!` proc-macro for declaring plugin contracts.

// Core data model (errors, schemas, contracts, scopes) re-exported flat.
pub use forge_core::*;

// Plugin lifecycle, contract adapter, and streaming driver.
pub use forge_framework;

// Remote loader adapter(s).
pub use forge_loader;

// Runtime facade, cache, config, logging.
pub use forge_runtime;

/// The `contract!` proc-macro, re-exported when the `macros` feature is enabled.
#[cfg(feature = "macros")]
pub use forge_macros::contract;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use forge::prelude::*;
/// ```
pub mod prelude {
    // Runtime — main entry point.
    pub use forge_runtime::{Runtime, RuntimeOptions, UseResult};

    // Plugin contract surface — for plugin authors.
    pub use forge_core::{
        Contract, PluginConfig, PluginDefinition, PluginInstance, ProcedureDescriptor, RouteMetadata, Schema,
    };

    // Context/router/client — for both plugin authors and host callers.
    pub use forge_core::{Context, Router};
    pub use forge_framework::Client;

    // Registry configuration.
    pub use forge_framework::RegistryEntry;

    // Streaming.
    pub use forge_framework::{stream_procedure, StreamOptions};

    // Errors.
    pub use forge_core::{ErrorKind, ForgeError, ForgeResult};

    #[cfg(feature = "macros")]
    pub use forge_macros::contract;
}
