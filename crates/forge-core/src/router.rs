//! Router: the dispatch table a plugin's `createRouter(context)` produces,
//! bound to one initialized plugin's context.
//!
//! A router handler returns either a single value (non-streamable
//! procedures) or one batch of a streaming sequence (streamable procedures
//! — the streaming driver drives the repeated invocation, the handler
//! itself is single-shot per call).

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::ForgeError;

/// The opaque value returned by a plugin's `initialize`, threaded into every
/// router handler invocation. Type-erased because the runtime never
/// interprets it — only the plugin that created it downcasts back.
#[derive(Clone)]
pub struct Context(Arc<dyn Any + Send + Sync>);

impl Context {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn downcast_ref<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Context").field(&"<opaque>").finish()
    }
}

/// One batch of a streaming procedure's output: `{ items, nextState }`.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct StreamBatch {
    pub items: Vec<Value>,
    #[serde(rename = "nextState")]
    pub next_state: Value,
}

/// What a procedure's own schema says it returns: `Value` or `nextPollMs`
/// carried inside a [`StreamBatch`].
pub enum PollSignal {
    /// `nextPollMs` is absent or zero — proceed to the next iteration with
    /// no delay.
    Immediate,
    /// `nextPollMs` is a positive number of milliseconds to sleep before
    /// the next iteration.
    After(std::time::Duration),
    /// `nextPollMs` is explicitly `null` — terminate the stream.
    Terminate,
}

/// Interprets a batch's `nextState.nextPollMs` field to decide what the
/// streaming driver does next.
pub fn poll_signal(next_state: &Value) -> PollSignal {
    match next_state.get("nextPollMs") {
        None => PollSignal::Immediate,
        Some(Value::Null) => PollSignal::Terminate,
        Some(Value::Number(n)) => match n.as_i64() {
            Some(ms) if ms > 0 => PollSignal::After(std::time::Duration::from_millis(ms as u64)),
            _ => PollSignal::Immediate,
        },
        Some(_) => PollSignal::Immediate,
    }
}

/// The result of dispatching one call through the router.
pub enum ProcedureOutcome {
    Value(Value),
    Batch(StreamBatch),
}

/// Everything a router handler needs for one invocation.
pub struct ProcedureInvocation {
    pub input: Value,
    pub context: Context,
    pub errors: Arc<HashMap<String, crate::schema::Schema>>,
    pub cancellation: CancellationToken,
    pub last_event_id: Option<String>,
}

/// A type-erased, clonable router handler.
pub type HandlerFn = Arc<
    dyn Fn(ProcedureInvocation) -> BoxFuture<'static, Result<ProcedureOutcome, ForgeError>> + Send + Sync,
>;

/// Dispatch table from procedure name to handler, bound to one initialized
/// plugin's context.
#[derive(Clone, Default)]
pub struct Router {
    handlers: HashMap<String, HandlerFn>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(mut self, name: impl Into<String>, handler: HandlerFn) -> Self {
        self.handlers.insert(name.into(), handler);
        self
    }

    pub fn has(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub async fn dispatch(
        &self,
        name: &str,
        invocation: ProcedureInvocation,
    ) -> Result<ProcedureOutcome, ForgeError> {
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| ForgeError::new(crate::error::ErrorKind::ValidateInput, "dispatch").with_procedure(name))?;
        handler(invocation).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_signal_interprets_next_poll_ms_field() {
        assert!(matches!(poll_signal(&serde_json::json!({})), PollSignal::Immediate));
        assert!(matches!(
            poll_signal(&serde_json::json!({"nextPollMs": null})),
            PollSignal::Terminate
        ));
        assert!(matches!(
            poll_signal(&serde_json::json!({"nextPollMs": 50})),
            PollSignal::After(d) if d.as_millis() == 50
        ));
        assert!(matches!(
            poll_signal(&serde_json::json!({"nextPollMs": 0})),
            PollSignal::Immediate
        ));
    }
}
