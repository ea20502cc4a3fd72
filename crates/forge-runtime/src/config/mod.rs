//! Registry/runtime configuration loading: finds, reads, and parses the
//! YAML file backing the plugin registry and global runtime settings.

pub mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, load_config_from_file, ConfigLoader};
pub use schema::{ForgeConfig, GlobalConfig, PluginDescriptorConfig};
