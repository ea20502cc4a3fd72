//! Configuration file loader: finds, reads, and parses `forge.yaml`, with
//! `${VAR}` / `${VAR:-default}` environment-variable expansion.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::error::{ConfigError, ConfigResult};
use super::schema::ForgeConfig;

const CONFIG_NAMES: &[&str] = &["forge.yaml", "forge.yml", ".forge.yaml", ".forge.yml"];

pub struct ConfigLoader {
    search_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { search_paths: Vec::new() }
    }

    pub fn add_search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    pub fn with_current_dir(self) -> Self {
        if let Ok(cwd) = std::env::current_dir() {
            self.add_search_path(cwd)
        } else {
            self
        }
    }

    pub fn with_user_config_dir(self) -> Self {
        match dirs::config_dir() {
            Some(dir) => self.add_search_path(dir.join("forge")),
            None => self,
        }
    }

    /// Loads from the first config file found on the search path, or
    /// returns [`ForgeConfig::default`] (an empty registry) if none exists —
    /// the registry itself always requires explicit entries, so an empty
    /// default is not silently dangerous.
    pub fn load(&self) -> ConfigResult<ForgeConfig> {
        match self.find_config_file() {
            Some(path) => self.load_from_file(&path),
            None => {
                info!("no forge configuration file found; starting with an empty registry");
                Ok(ForgeConfig::default())
            }
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<ForgeConfig> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading forge configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;

        let config = self.parse_yaml(&content)?;
        debug!(plugins = config.registry.len(), "configuration loaded");
        Ok(config)
    }

    pub fn load_from_str(&self, yaml: &str) -> ConfigResult<ForgeConfig> {
        self.parse_yaml(yaml)
    }

    fn find_config_file(&self) -> Option<PathBuf> {
        for search_path in &self.search_paths {
            for name in CONFIG_NAMES {
                let candidate = search_path.join(name);
                if candidate.exists() {
                    return Some(candidate);
                }
            }
        }
        None
    }

    fn parse_yaml(&self, content: &str) -> ConfigResult<ForgeConfig> {
        let expanded = expand_env_vars(content);
        serde_yaml::from_str(&expanded).map_err(ConfigError::from)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new().with_current_dir().with_user_config_dir()
    }
}

/// Expands `${VAR}` and `${VAR:-default}` occurrences against the process
/// environment.
fn expand_env_vars(content: &str) -> String {
    let re = regex_lite::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(:-([^}]*))?\}").unwrap();

    let mut result = content.to_string();
    for cap in re.captures_iter(content) {
        let full_match = cap.get(0).unwrap().as_str();
        let var_name = cap.get(1).unwrap().as_str();
        let default_value = cap.get(3).map(|m| m.as_str());

        let value = std::env::var(var_name)
            .ok()
            .or_else(|| default_value.map(String::from))
            .unwrap_or_default();

        result = result.replace(full_match, &value);
    }
    result
}

pub fn load_config() -> ConfigResult<ForgeConfig> {
    ConfigLoader::default().load()
}

pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<ForgeConfig> {
    ConfigLoader::new().load_from_file(path)
}
