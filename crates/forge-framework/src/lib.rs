//! Plugin lifecycle loader, lifecycle registry, contract/router/client
//! adapter, and streaming driver: the layer that turns a remote-loaded
//! plugin definition into a live, callable, cleanly-torn-down instance.

pub mod adapter;
pub mod loader;
pub mod registry;
pub mod streaming;

pub use adapter::Client;
pub use loader::{check_api_compatibility, InitializedPlugin, InstantiatedPlugin, LoadedPlugin, PluginLoader, RegistryEntry};
pub use registry::{shutdown_one, LifecycleRegistry};
pub use streaming::{stream_procedure, StateChangeHook, StreamOptions};
