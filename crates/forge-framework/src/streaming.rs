//! Streaming driver: turns a streamable procedure into a finite, bounded,
//! cancellable sequence of items.
//!
//! Repeats a stateful call to the same procedure until one of the
//! termination rules below fires, carrying plugin-produced state forward
//! between iterations rather than tracking a fixed retry count.

use std::sync::Arc;
use std::time::Duration;

use async_stream::try_stream;
use forge_core::{poll_signal, BoxError, ErrorKind, ForgeError, PollSignal, ProcedureOutcome};
use futures::future::BoxFuture;
use futures::Stream;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::adapter::Client;

/// Invoked after each iteration, before the inter-iteration delay. Failures
/// are logged and swallowed — they never terminate the stream.
pub type StateChangeHook =
    Arc<dyn Fn(Value, Vec<Value>) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// Caps and hooks governing one streaming session.
#[derive(Clone, Default)]
pub struct StreamOptions {
    pub max_invocations: Option<u64>,
    pub max_items: Option<u64>,
    pub stop_when_empty: bool,
    pub on_state_change: Option<StateChangeHook>,
}

impl StreamOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_invocations(mut self, max: u64) -> Self {
        self.max_invocations = Some(max);
        self
    }

    pub fn with_max_items(mut self, max: u64) -> Self {
        self.max_items = Some(max);
        self
    }

    pub fn with_stop_when_empty(mut self, stop: bool) -> Self {
        self.stop_when_empty = stop;
        self
    }

    pub fn with_on_state_change(mut self, hook: StateChangeHook) -> Self {
        self.on_state_change = Some(hook);
        self
    }
}

/// Builds `{ ...input, state }` for the next invocation. Non-object inputs
/// have nothing to spread, so only `state` is carried.
fn merge_input(input: &Value, state: &Value) -> Value {
    match input {
        Value::Object(map) => {
            let mut merged = map.clone();
            merged.insert("state".to_string(), state.clone());
            Value::Object(merged)
        }
        _ => {
            let mut merged = serde_json::Map::new();
            merged.insert("state".to_string(), state.clone());
            Value::Object(merged)
        }
    }
}

/// Turns a streamable procedure into a bounded item sequence.
///
/// Validates up front that `procedure_name` is declared streamable and that
/// `initial_state` satisfies the plugin's declared `stateSchema`; both
/// failures surface before the first invocation, never mid-stream.
pub fn stream_procedure(
    client: Client,
    procedure_name: String,
    input: Value,
    initial_state: Value,
    options: StreamOptions,
    cancellation: CancellationToken,
) -> impl Stream<Item = Result<Value, ForgeError>> {
    try_stream! {
        if !client.contract().is_streamable(&procedure_name) {
            Err::<(), ForgeError>(ForgeError::new(ErrorKind::StreamPluginValidate, "streamProcedure")
                .with_plugin(client.plugin_id())
                .with_procedure(&procedure_name)
                .with_cause("procedure is not declared streamable")
                .retryable(false))?;
        }

        if let Some(state_schema) = client.state_schema() {
            state_schema.validate(&initial_state).map_err(|cause| {
                ForgeError::new(ErrorKind::ValidateState, "streamProcedure")
                    .with_plugin(client.plugin_id())
                    .with_procedure(&procedure_name)
                    .with_cause(cause)
                    .retryable(false)
            })?;
        }

        let mut invocation_count: u64 = 0u64;
        let mut items_emitted: u64 = 0u64;
        let mut state = initial_state;

        loop {
            if cancellation.is_cancelled() {
                return;
            }

            // Rule 1: maxInvocations, checked before executing.
            if let Some(max) = options.max_invocations {
                if invocation_count >= max {
                    return;
                }
            }
            // Rule 2: maxItems, checked before executing.
            if let Some(max) = options.max_items {
                if items_emitted >= max {
                    return;
                }
            }

            // Rule 3: execute, then count the invocation.
            let merged_input = merge_input(&input, &state);
            let invocation = client.prepare_invocation(&procedure_name, merged_input, cancellation.clone(), None)?;
            let outcome = client.router().dispatch(&procedure_name, invocation).await.map_err(|cause| {
                ForgeError::new(ErrorKind::StreamTermination, "streamProcedure")
                    .with_plugin(client.plugin_id())
                    .with_procedure(&procedure_name)
                    .with_cause(cause.to_string())
                    .retryable(false)
            })?;
            invocation_count += 1;

            let batch = match outcome {
                ProcedureOutcome::Batch(batch) => batch,
                ProcedureOutcome::Value(_) => {
                    Err::<(), ForgeError>(ForgeError::new(ErrorKind::StreamPluginValidate, "streamProcedure")
                        .with_plugin(client.plugin_id())
                        .with_procedure(&procedure_name)
                        .with_cause("handler returned a single value for a streamable procedure")
                        .retryable(false))?;
                    return;
                }
            };

            // Rule 4: emit items one at a time, respecting maxItems mid-batch.
            for item in &batch.items {
                if let Some(max) = options.max_items {
                    if items_emitted >= max {
                        return;
                    }
                }
                yield item.clone();
                items_emitted += 1;
            }

            if let Some(hook) = &options.on_state_change {
                if let Err(cause) = hook(batch.next_state.clone(), batch.items.clone()).await {
                    warn!(procedure = %procedure_name, error = %cause, "onStateChange hook failed; continuing stream");
                }
            }

            let signal = poll_signal(&batch.next_state);
            state = batch.next_state;

            // Rule 5: explicit terminal signal.
            if matches!(signal, PollSignal::Terminate) {
                return;
            }
            // Rule 6: stopWhenEmpty, checked before the delay.
            if options.stop_when_empty && batch.items.is_empty() {
                return;
            }
            // Rule 7: positive nextPollMs delays the next iteration.
            if let PollSignal::After(delay) = signal {
                if !sleep_or_cancel(delay, &cancellation).await {
                    return;
                }
            }
        }
    }
}

/// Sleeps `delay`, returning `false` early if cancelled mid-sleep so the
/// caller can stop the stream instead of issuing another invocation.
async fn sleep_or_cancel(delay: Duration, cancellation: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = cancellation.cancelled() => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use forge_core::{Context, Contract, ProcedureDescriptor, ProcedureInvocation, Router, Schema};
    use parking_lot::Mutex;
    use tokio_stream::StreamExt;

    fn router_with_counter(stop_at: i64) -> Router {
        Router::new().with_handler(
            "count",
            Arc::new(move |invocation: ProcedureInvocation| {
                Box::pin(async move {
                    let n = invocation.input.get("state").and_then(|s| s.get("n")).and_then(|n| n.as_i64()).unwrap_or(0);
                    let next_n = n + 1;
                    let next_poll = if next_n >= stop_at { Value::Null } else { Value::from(0) };
                    Ok(ProcedureOutcome::Batch(forge_core::StreamBatch {
                        items: vec![Value::from(n)],
                        next_state: serde_json::json!({"n": next_n, "nextPollMs": next_poll}),
                    }))
                }) as BoxFuture<'static, Result<ProcedureOutcome, ForgeError>>
            }),
        )
    }

    fn streamable_client(router: Router) -> Client {
        let contract = Arc::new(
            Contract::new().with_procedure(
                "count",
                ProcedureDescriptor::new(Schema::any(), Schema::any()).streamable(),
            ),
        );
        Client::new("p", contract, Arc::new(router), Context::new(()))
    }

    #[tokio::test]
    async fn terminates_on_explicit_null_next_poll_ms() {
        let client = streamable_client(router_with_counter(3));
        let stream = stream_procedure(
            client,
            "count".into(),
            serde_json::json!({}),
            serde_json::json!({"n": 0}),
            StreamOptions::new(),
            CancellationToken::new(),
        );
        tokio::pin!(stream);

        let mut items = Vec::new();
        while let Some(item) = stream.next().await {
            items.push(item.unwrap());
        }
        assert_eq!(items, vec![Value::from(0), Value::from(1), Value::from(2)]);
    }

    #[tokio::test]
    async fn max_items_caps_emitted_sequence() {
        let client = streamable_client(router_with_counter(100));
        let stream = stream_procedure(
            client,
            "count".into(),
            serde_json::json!({}),
            serde_json::json!({"n": 0}),
            StreamOptions::new().with_max_items(2),
            CancellationToken::new(),
        );
        tokio::pin!(stream);

        let mut items = Vec::new();
        while let Some(item) = stream.next().await {
            items.push(item.unwrap());
        }
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn max_invocations_caps_invocation_count() {
        let invocation_count = Arc::new(Mutex::new(0u32));
        let count_clone = invocation_count.clone();
        let router = Router::new().with_handler(
            "count",
            Arc::new(move |_invocation: ProcedureInvocation| {
                let count_clone = count_clone.clone();
                Box::pin(async move {
                    *count_clone.lock() += 1;
                    Ok(ProcedureOutcome::Batch(forge_core::StreamBatch {
                        items: vec![Value::from(1)],
                        next_state: serde_json::json!({}),
                    }))
                }) as BoxFuture<'static, Result<ProcedureOutcome, ForgeError>>
            }),
        );
        let client = streamable_client(router);

        let stream = stream_procedure(
            client,
            "count".into(),
            serde_json::json!({}),
            serde_json::json!({}),
            StreamOptions::new().with_max_invocations(3),
            CancellationToken::new(),
        );
        tokio::pin!(stream);
        while stream.next().await.is_some() {}

        assert_eq!(*invocation_count.lock(), 3);
    }

    #[tokio::test]
    async fn stop_when_empty_terminates_on_first_empty_batch() {
        let router = Router::new().with_handler(
            "count",
            Arc::new(move |_invocation: ProcedureInvocation| {
                Box::pin(async move {
                    Ok(ProcedureOutcome::Batch(forge_core::StreamBatch {
                        items: vec![],
                        next_state: serde_json::json!({}),
                    }))
                }) as BoxFuture<'static, Result<ProcedureOutcome, ForgeError>>
            }),
        );
        let client = streamable_client(router);

        let stream = stream_procedure(
            client,
            "count".into(),
            serde_json::json!({}),
            serde_json::json!({}),
            StreamOptions::new().with_stop_when_empty(true),
            CancellationToken::new(),
        );
        tokio::pin!(stream);

        let mut items = Vec::new();
        while let Some(item) = stream.next().await {
            items.push(item.unwrap());
        }
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn non_streamable_procedure_fails_before_first_invocation() {
        let contract = Arc::new(Contract::new().with_procedure("ping", ProcedureDescriptor::new(Schema::any(), Schema::any())));
        let client = Client::new("p", contract, Arc::new(Router::new()), Context::new(()));

        let stream = stream_procedure(
            client,
            "ping".into(),
            serde_json::json!({}),
            serde_json::json!({}),
            StreamOptions::new(),
            CancellationToken::new(),
        );
        tokio::pin!(stream);

        let first = stream.next().await.unwrap();
        let err = first.unwrap_err();
        assert_eq!(err.kind, ErrorKind::StreamPluginValidate);
        assert!(stream.next().await.is_none());
    }
}
