//! HTTP-backed remote loader: fetches a plugin manifest, downloads the
//! shared library it names, and resolves its exported constructor symbol.
//!
//! Transient fetch failures are retried with exponential backoff rather
//! than failing on the first bad response — manifest hosting is expected to
//! be an ordinary HTTP endpoint, not a guaranteed-available service.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{ConstructorFn, RemoteLoader};
use forge_core::PluginDefinition;

/// The exported symbol every plugin shared library must provide: a
/// constructor returning a fresh, uninitialized [`PluginDefinition`].
pub type RawConstructor = unsafe extern "C" fn() -> *mut (dyn PluginDefinition + 'static);

const DEFAULT_MANIFEST_FILE: &str = "plugin.json";
const FETCH_RETRIES: u32 = 3;
const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
pub enum NetworkLoaderError {
    #[error("plugin '{0}' has no registered remote source")]
    NotRegistered(String),
    #[error("manifest fetch failed for '{url}': {reason}")]
    ManifestFetch { url: String, reason: String },
    #[error("manifest at '{0}' was not valid JSON")]
    ManifestParse(String),
    #[error("library fetch failed for '{url}': {reason}")]
    LibraryFetch { url: String, reason: String },
    #[error("failed to load dynamic library '{path}': {reason}")]
    DynamicLoad { path: String, reason: String },
    #[error("symbol '{symbol}' not found in '{path}': {reason}")]
    MissingSymbol {
        symbol: String,
        path: String,
        reason: String,
    },
}

#[derive(Debug, Deserialize)]
struct Manifest {
    /// URL (or filesystem path) of the compiled plugin's shared library.
    library: String,
    /// Exported symbol to resolve as the plugin's [`RawConstructor`].
    #[serde(default = "default_symbol")]
    symbol: String,
}

fn default_symbol() -> String {
    "forge_plugin_constructor".to_string()
}

/// Fetches manifests and shared libraries over HTTP and loads them
/// dynamically via `libloading`.
///
/// `manifest_file` is the canonical filename appended to a registered source
/// URL when that URL has no file extension of its own.
pub struct NetworkRemoteLoader {
    http: reqwest::Client,
    manifest_file: String,
    sources: DashMap<String, String>,
    cache_dir: PathBuf,
}

impl NetworkRemoteLoader {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            manifest_file: DEFAULT_MANIFEST_FILE.to_string(),
            sources: DashMap::new(),
            cache_dir: std::env::temp_dir().join("forge-loader"),
        }
    }

    pub fn with_manifest_file(mut self, manifest_file: impl Into<String>) -> Self {
        self.manifest_file = manifest_file.into();
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    fn manifest_url(&self, source: &str) -> String {
        let has_extension = source
            .rsplit('/')
            .next()
            .is_some_and(|segment| segment.contains('.'));
        if has_extension {
            source.to_string()
        } else {
            format!("{}/{}", source.trim_end_matches('/'), self.manifest_file)
        }
    }

    async fn fetch_manifest(&self, url: &str) -> Result<Manifest, NetworkLoaderError> {
        let body = self.fetch_with_retry(url).await?;
        serde_json::from_slice(&body).map_err(|_| NetworkLoaderError::ManifestParse(url.to_string()))
    }

    /// Fetches `url`'s body, retrying transient failures with exponential
    /// backoff, bounded to [`FETCH_RETRIES`] attempts.
    async fn fetch_with_retry(&self, url: &str) -> Result<Vec<u8>, NetworkLoaderError> {
        let mut delay = INITIAL_RETRY_DELAY;
        let mut last_error = String::new();

        for attempt in 0..FETCH_RETRIES {
            match self.http.get(url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    return resp
                        .bytes()
                        .await
                        .map(|b| b.to_vec())
                        .map_err(|e| NetworkLoaderError::ManifestFetch {
                            url: url.to_string(),
                            reason: e.to_string(),
                        });
                }
                Ok(resp) => {
                    last_error = format!("HTTP {}", resp.status());
                }
                Err(e) => {
                    last_error = e.to_string();
                }
            }

            if attempt + 1 < FETCH_RETRIES {
                warn!(url, attempt, delay_ms = delay.as_millis() as u64, "retrying fetch");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }

        Err(NetworkLoaderError::ManifestFetch {
            url: url.to_string(),
            reason: last_error,
        })
    }

    async fn download_library(&self, url: &str) -> Result<PathBuf, NetworkLoaderError> {
        let bytes = self
            .fetch_with_retry(url)
            .await
            .map_err(|e| NetworkLoaderError::LibraryFetch {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        tokio::fs::create_dir_all(&self.cache_dir)
            .await
            .map_err(|e| NetworkLoaderError::LibraryFetch {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let file_name = url.rsplit('/').next().unwrap_or("plugin.so");
        let dest = self.cache_dir.join(file_name);
        tokio::fs::write(&dest, &bytes)
            .await
            .map_err(|e| NetworkLoaderError::LibraryFetch {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        Ok(dest)
    }
}

impl Default for NetworkRemoteLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteLoader for NetworkRemoteLoader {
    async fn register_remote(&self, plugin_id: &str, source: &str) -> Result<(), forge_core::BoxError> {
        info!(plugin_id, source, "registering remote plugin source");
        self.sources.insert(plugin_id.to_string(), source.to_string());
        Ok(())
    }

    async fn load_constructor(&self, plugin_id: &str) -> Result<ConstructorFn, forge_core::BoxError> {
        let source = self
            .sources
            .get(plugin_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| NetworkLoaderError::NotRegistered(plugin_id.to_string()))?;

        let manifest_url = self.manifest_url(&source);
        debug!(plugin_id, manifest_url, "fetching plugin manifest");
        let manifest = self.fetch_manifest(&manifest_url).await?;

        let library_path = self.download_library(&manifest.library).await?;
        let symbol = manifest.symbol;

        let constructor: ConstructorFn = Arc::new(move || {
            load_symbol(&library_path, &symbol).map(|ctor| {
                // SAFETY: `ctor` is the raw constructor exported by the
                // plugin's shared library, contractually returning an
                // owned, heap-allocated trait object.
                unsafe { Arc::from_raw(ctor()) }
            })
        });

        Ok(constructor)
    }
}

fn load_symbol(path: &PathBuf, symbol: &str) -> Result<RawConstructor, forge_core::BoxError> {
    // SAFETY: loading a plugin's shared library is inherently trusting the
    // code it contains; the runtime only loads libraries it was explicitly
    // pointed at via `register_remote`.
    let library = unsafe {
        libloading::Library::new(path).map_err(|e| NetworkLoaderError::DynamicLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?
    };

    let ctor = unsafe {
        library
            .get::<RawConstructor>(symbol.as_bytes())
            .map_err(|e| NetworkLoaderError::MissingSymbol {
                symbol: symbol.to_string(),
                path: path.display().to_string(),
                reason: e.to_string(),
            })?
    };
    let ctor = *ctor;

    // Leak the library handle so the symbol stays valid for the lifetime of
    // the constructor closures built from it.
    std::mem::forget(library);

    Ok(ctor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_url_appends_default_file_when_extensionless() {
        let loader = NetworkRemoteLoader::new();
        assert_eq!(
            loader.manifest_url("https://plugins.example.com/weather"),
            "https://plugins.example.com/weather/plugin.json"
        );
    }

    #[test]
    fn manifest_url_is_used_verbatim_when_it_has_an_extension() {
        let loader = NetworkRemoteLoader::new();
        assert_eq!(
            loader.manifest_url("https://plugins.example.com/weather/manifest.json"),
            "https://plugins.example.com/weather/manifest.json"
        );
    }

    #[test]
    fn with_manifest_file_overrides_default() {
        let loader = NetworkRemoteLoader::new().with_manifest_file("remoteEntry.json");
        assert_eq!(
            loader.manifest_url("https://plugins.example.com/weather"),
            "https://plugins.example.com/weather/remoteEntry.json"
        );
    }
}
