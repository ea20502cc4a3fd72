//! In-memory remote loader: a registration table used by tests and the
//! bundled demo host, where plugin constructors live in-process rather than
//! behind a network boundary.

use dashmap::DashMap;
use thiserror::Error;

use crate::{ConstructorFn, RemoteLoader};
use async_trait::async_trait;

#[derive(Debug, Error)]
pub enum MemoryLoaderError {
    #[error("plugin '{0}' is not registered")]
    NotRegistered(String),
}

/// Maps plugin identifiers directly to constructors, bypassing any actual
/// remote fetch. `register_remote`'s `source` argument is ignored here — the
/// constructor itself is supplied up front via [`InMemoryRemoteLoader::insert`].
#[derive(Default)]
pub struct InMemoryRemoteLoader {
    constructors: DashMap<String, ConstructorFn>,
}

impl InMemoryRemoteLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constructor directly, without going through
    /// `register_remote` + `load_constructor`'s source indirection.
    pub fn insert(&self, plugin_id: impl Into<String>, constructor: ConstructorFn) {
        self.constructors.insert(plugin_id.into(), constructor);
    }
}

#[async_trait]
impl RemoteLoader for InMemoryRemoteLoader {
    async fn register_remote(&self, _plugin_id: &str, _source: &str) -> Result<(), forge_core::BoxError> {
        Ok(())
    }

    async fn load_constructor(&self, plugin_id: &str) -> Result<ConstructorFn, forge_core::BoxError> {
        self.constructors
            .get(plugin_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| Box::new(MemoryLoaderError::NotRegistered(plugin_id.to_string())) as forge_core::BoxError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn load_constructor_fails_for_unregistered_plugin() {
        let loader = InMemoryRemoteLoader::new();
        let err = loader.load_constructor("missing").await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn insert_then_load_roundtrips() {
        let loader = InMemoryRemoteLoader::new();
        loader.insert(
            "demo",
            Arc::new(|| Err("not a real plugin, just checking wiring".into())),
        );
        let constructor = loader.load_constructor("demo").await.unwrap();
        assert!(constructor().is_err());
    }
}
