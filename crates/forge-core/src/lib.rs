//! Data model shared by every crate in the Forge plugin runtime: errors,
//! schemas, scopes, contracts, routers, and the plugin black-box trait.

pub mod contract;
pub mod error;
pub mod plugin;
pub mod router;
pub mod schema;
pub mod scope;
pub mod secrets;

pub use contract::{Contract, ProcedureDescriptor, RouteMetadata};
pub use error::{BoxError, ErrorKind, ForgeError, ForgeResult};
pub use plugin::{PluginConfig, PluginDefinition, PluginInstance, FORGE_PLUGIN_API_VERSION};
pub use router::{poll_signal, Context, HandlerFn, PollSignal, ProcedureInvocation, ProcedureOutcome, Router, StreamBatch};
pub use schema::{ConfigSchema, Schema, SchemaError};
pub use scope::Scope;
pub use secrets::hydrate;
