//! Serde shapes for the YAML configuration file backing the plugin
//! registry and global runtime settings.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use forge_framework::loader::RegistryEntry;

/// Top-level document: `registry:` plus `global:` settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    pub registry: HashMap<String, PluginDescriptorConfig>,
    pub global: GlobalConfig,
}

/// One entry of the plugin registry: where to fetch a plugin's
/// code, plus descriptive metadata carried through to the `useResult`
/// bundle untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginDescriptorConfig {
    pub remote_url: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl From<PluginDescriptorConfig> for RegistryEntry {
    fn from(value: PluginDescriptorConfig) -> Self {
        RegistryEntry {
            remote_url: value.remote_url,
            version: value.version,
            description: value.description,
        }
    }
}

/// Global runtime settings (cache capacity/TTL, manifest filename) — the
/// core runtime itself takes these as plain constructor arguments; this
/// struct is only the shape a config file loader produces them in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub cache_capacity: usize,
    #[serde(with = "humantime_secs")]
    pub cache_ttl: Duration,
    pub manifest_file: String,
    pub log_level: String,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            cache_capacity: crate::cache::DEFAULT_CAPACITY,
            cache_ttl: crate::cache::DEFAULT_TTL,
            manifest_file: "plugin.json".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// (De)serializes a [`Duration`] as a whole number of seconds — YAML has no
/// native duration type, and a bare integer is the least surprising
/// representation for a `cache_ttl_seconds`-shaped field.
mod humantime_secs {
    use super::Duration;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        value.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
