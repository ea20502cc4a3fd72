//! Runtime facade for the Forge plugin runtime: the configuration-keyed
//! instance cache, registry/runtime configuration loading, and logging
//! bootstrap.
//!
//! A thin façade crate that wires together the lower-level crates
//! (`forge-core`, `forge-framework`, `forge-loader`) into the one object a
//! host actually constructs.

pub mod cache;
pub mod config;
pub mod facade;
pub mod hash;
pub mod logging;

pub use cache::{CacheStats, InitResult, PluginCache, DEFAULT_CAPACITY, DEFAULT_TTL};
pub use config::{load_config, load_config_from_file, ConfigError, ConfigLoader, ForgeConfig, GlobalConfig, PluginDescriptorConfig};
pub use facade::{Runtime, RuntimeOptions, UseResult};
pub use hash::structural_hash;
pub use logging::{LoggingBuilder, SpanEvents};

/// Re-exports convenient for downstream crates and the `forge` facade's
/// prelude: a flat, curated surface rather than requiring hosts to reach
/// into submodules.
pub mod prelude {
    pub use crate::cache::{CacheStats, DEFAULT_CAPACITY, DEFAULT_TTL};
    pub use crate::config::{ForgeConfig, GlobalConfig, PluginDescriptorConfig};
    pub use crate::facade::{Runtime, RuntimeOptions, UseResult};
    pub use crate::logging::{LoggingBuilder, SpanEvents};
}
