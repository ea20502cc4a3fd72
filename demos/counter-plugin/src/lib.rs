//! A worked example [`PluginDefinition`]: exposes a non-streamable `ping`
//! procedure and a streamable `tail` procedure that counts upward by a
//! configurable step, optionally stopping at a configured limit.
//!
//! Wired end-to-end by `demos/plugin-host` against the real
//! cache/loader/streaming-driver stack.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use forge_core::{
    BoxError, ConfigSchema, Contract, Context, PluginConfig, PluginDefinition, ProcedureDescriptor,
    ProcedureOutcome, Router, Schema, StreamBatch,
};
use serde_json::{json, Value};
use tracing::info;

struct CounterState {
    step: i64,
    limit: Option<i64>,
    invocations: AtomicI64,
}

/// The counter plugin itself. Stateless until `initialize`: this value can
/// be constructed many times (once per cache miss) before any one of them
/// is ever initialized.
#[derive(Default)]
pub struct CounterPlugin;

fn contract() -> &'static Contract {
    static CONTRACT: std::sync::OnceLock<Contract> = std::sync::OnceLock::new();
    CONTRACT.get_or_init(|| {
        Contract::new()
            .with_procedure("ping", ProcedureDescriptor::new(Schema::any(), Schema::any()))
            .with_procedure(
                "tail",
                ProcedureDescriptor::new(Schema::any(), Schema::any()).streamable(),
            )
    })
}

fn config_schema() -> &'static ConfigSchema {
    static SCHEMA: std::sync::OnceLock<ConfigSchema> = std::sync::OnceLock::new();
    SCHEMA.get_or_init(|| {
        let variables = Schema::compile(json!({
            "type": "object",
            "properties": {
                "step": { "type": "integer", "minimum": 1 },
                "limit": { "type": ["integer", "null"] }
            }
        }))
        .expect("counter plugin's variables schema is valid");
        ConfigSchema::new(variables, Schema::any())
    })
}

fn state_schema() -> &'static Schema {
    static SCHEMA: std::sync::OnceLock<Schema> = std::sync::OnceLock::new();
    SCHEMA.get_or_init(|| {
        Schema::compile(json!({
            "type": "object",
            "properties": { "n": { "type": "integer" } }
        }))
        .expect("counter plugin's state schema is valid")
    })
}

#[async_trait]
impl PluginDefinition for CounterPlugin {
    fn contract(&self) -> &Contract {
        contract()
    }

    fn config_schema(&self) -> &ConfigSchema {
        config_schema()
    }

    fn state_schema(&self) -> Option<&Schema> {
        Some(state_schema())
    }

    async fn initialize(
        &self,
        config: PluginConfig,
        _scope: Arc<forge_core::Scope>,
    ) -> Result<Context, BoxError> {
        let step = config.variables.get("step").and_then(Value::as_i64).unwrap_or(1);
        let limit = config.variables.get("limit").and_then(Value::as_i64);

        info!(step, ?limit, "counter plugin initialized");

        Ok(Context::new(CounterState {
            step,
            limit,
            invocations: AtomicI64::new(0),
        }))
    }

    async fn shutdown(&self, _context: Context) -> Result<(), BoxError> {
        info!("counter plugin shutting down");
        Ok(())
    }

    fn create_router(&self, context: Context) -> Router {
        Router::new()
            .with_handler(
                "ping",
                Arc::new(move |_invocation| {
                    Box::pin(async move { Ok(ProcedureOutcome::Value(json!("pong"))) })
                        as futures::future::BoxFuture<'static, Result<ProcedureOutcome, forge_core::ForgeError>>
                }),
            )
            .with_handler("tail", {
                let context = context.clone();
                Arc::new(move |invocation| {
                    let context = context.clone();
                    Box::pin(async move {
                        let state = context
                            .downcast_ref::<CounterState>()
                            .expect("tail handler only ever runs against a CounterState context");

                        state.invocations.fetch_add(1, Ordering::SeqCst);

                        let current = invocation
                            .input
                            .get("state")
                            .and_then(|s| s.get("n"))
                            .and_then(Value::as_i64)
                            .unwrap_or(0);

                        let next = current + state.step;
                        let done = state.limit.is_some_and(|limit| next >= limit);

                        let next_poll_ms = if done { Value::Null } else { json!(20) };

                        Ok(ProcedureOutcome::Batch(StreamBatch {
                            items: vec![json!(current)],
                            next_state: json!({ "n": next, "nextPollMs": next_poll_ms }),
                        }))
                    }) as futures::future::BoxFuture<'static, Result<ProcedureOutcome, forge_core::ForgeError>>
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::{ProcedureInvocation, Scope};
    use std::collections::HashMap;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn ping_returns_pong() {
        let plugin = CounterPlugin;
        let context = plugin
            .initialize(PluginConfig::new(json!({"step": 1}), json!({})), Scope::new())
            .await
            .unwrap();
        let router = plugin.create_router(context);

        let outcome = router
            .dispatch(
                "ping",
                ProcedureInvocation {
                    input: json!({}),
                    context: Context::new(()),
                    errors: Arc::new(HashMap::new()),
                    cancellation: CancellationToken::new(),
                    last_event_id: None,
                },
            )
            .await
            .unwrap();

        assert!(matches!(outcome, ProcedureOutcome::Value(v) if v == json!("pong")));
    }

    #[tokio::test]
    async fn tail_counts_up_by_step_and_terminates_at_limit() {
        let plugin = CounterPlugin;
        let context = plugin
            .initialize(
                PluginConfig::new(json!({"step": 2, "limit": 6}), json!({})),
                Scope::new(),
            )
            .await
            .unwrap();
        let router = plugin.create_router(context.clone());

        let mut state = json!({"n": 0});
        let mut items = Vec::new();
        loop {
            let outcome = router
                .dispatch(
                    "tail",
                    ProcedureInvocation {
                        input: json!({"state": state}),
                        context: context.clone(),
                        errors: Arc::new(HashMap::new()),
                        cancellation: CancellationToken::new(),
                        last_event_id: None,
                    },
                )
                .await
                .unwrap();

            let ProcedureOutcome::Batch(batch) = outcome else {
                panic!("tail is a streamable procedure and must return a batch");
            };
            items.extend(batch.items.clone());
            state = batch.next_state.clone();

            if batch.next_state.get("nextPollMs").is_some_and(Value::is_null) {
                break;
            }
        }

        assert_eq!(items, vec![json!(0), json!(2), json!(4)]);
    }
}
