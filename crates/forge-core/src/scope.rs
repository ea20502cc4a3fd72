//! Lifetime scope — the primitive scoped resources attach to so they can be
//! released deterministically on every exit path.
//!
//! Pairs a cancellation token background work can select on with a tracked
//! set of spawned task handles, so closing the scope reliably stops
//! everything a plugin started during initialization.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Bound on how long [`Scope::close`] waits for tracked tasks to notice
/// cancellation and exit on their own before aborting them outright.
const GRACEFUL_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// A lifetime token for resources acquired during a plugin's `initialize`.
///
/// Background work (timers, subscriptions, long-lived fibers) a plugin
/// spawns during initialization should register itself here via
/// [`Scope::spawn`] so that closing the scope reliably stops it.
pub struct Scope {
    token: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Scope {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            token: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// A token that becomes cancelled when this scope closes. Background
    /// work should select on this to know when to stop.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Whether the scope has already been closed.
    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Spawns a task tied to this scope's lifetime and tracks its handle so
    /// `close` can wait for or abort it.
    pub fn spawn<F>(&self, fut: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(fut);
        self.tasks.lock().push(handle);
    }

    /// Cancels the scope's token and stops all tracked background work.
    ///
    /// Tasks are given [`GRACEFUL_CLOSE_TIMEOUT`] to notice cancellation and
    /// exit on their own; any still running afterward are aborted. This
    /// method never fails — teardown is always best-effort.
    pub async fn close(&self) {
        self.token.cancel();

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        if handles.is_empty() {
            return;
        }

        let joined = tokio::time::timeout(GRACEFUL_CLOSE_TIMEOUT, futures::future::join_all(handles)).await;

        if let Err(_elapsed) = joined {
            warn!("scope close timed out waiting for background tasks; tasks were detached and may still be running");
        }
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self {
            token: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn close_cancels_token_and_joins_tasks() {
        let scope = Scope::new();
        let ran_to_cancellation = Arc::new(AtomicBool::new(false));

        let token = scope.cancellation_token();
        let flag = ran_to_cancellation.clone();
        scope.spawn(async move {
            token.cancelled().await;
            flag.store(true, Ordering::SeqCst);
        });

        assert!(!scope.is_closed());
        scope.close().await;
        assert!(scope.is_closed());
        assert!(ran_to_cancellation.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn close_is_idempotent_with_no_tasks() {
        let scope = Scope::new();
        scope.close().await;
        scope.close().await;
        assert!(scope.is_closed());
    }
}
