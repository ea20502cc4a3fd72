//! Lifecycle registry: tracks initialized plugins for coordinated teardown.
//!
//! Keyed by the same cache key the runtime's cache stores the entry under,
//! rather than by reference identity — this keeps `register`/`unregister`
//! trivially idempotent without requiring `InitializedPlugin` to implement
//! equality or hashing of its own.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::warn;

use crate::loader::InitializedPlugin;

#[derive(Default)]
pub struct LifecycleRegistry {
    entries: DashMap<String, Arc<InitializedPlugin>>,
}

impl LifecycleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent insert.
    pub fn register(&self, key: impl Into<String>, initialized: Arc<InitializedPlugin>) {
        self.entries.insert(key.into(), initialized);
    }

    /// Idempotent remove.
    pub fn unregister(&self, key: &str) -> Option<Arc<InitializedPlugin>> {
        self.entries.remove(key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Shuts down every registered plugin concurrently, tolerating
    /// individual failures, then clears the set.
    ///
    /// Ordering contract per plugin: `shutdown()` first, then
    /// `scope.close()`, then drop from the registry — closing the scope
    /// before `shutdown()` returns would interrupt the plugin's own
    /// teardown mid-flight.
    pub async fn cleanup(&self) {
        let drained: Vec<(String, Arc<InitializedPlugin>)> =
            self.entries.iter().map(|e| (e.key().clone(), e.value().clone())).collect();

        futures::future::join_all(drained.into_iter().map(|(key, initialized)| async move {
            shutdown_one(&key, &initialized).await;
        }))
        .await;

        self.entries.clear();
    }
}

/// Shuts down a single initialized plugin following the ordering contract,
/// swallowing failures from either step so one bad plugin cannot block
/// cleanup of the rest.
pub async fn shutdown_one(key: &str, initialized: &InitializedPlugin) {
    if let Err(cause) = initialized
        .instance
        .definition
        .shutdown(initialized.context.clone())
        .await
    {
        warn!(key, error = %cause, "plugin shutdown returned an error, continuing teardown");
    }

    initialized.scope.close().await;
}
