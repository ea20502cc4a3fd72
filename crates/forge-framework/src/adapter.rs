//! Contract/router/client adapter: materializes a callable surface from an
//! initialized plugin.

use std::sync::Arc;

use forge_core::{Context, Contract, ForgeError, ForgeResult, ProcedureInvocation, ProcedureOutcome, Router, Schema};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// A procedure-name-keyed callable façade over a [`Router`], validating
/// input against the declared [`Contract`] before dispatch.
///
/// Declared tagged errors (`contract.get(name).errors`) are never
/// reclassified here — whatever the handler returns passes straight
/// through to the caller verbatim.
#[derive(Clone)]
pub struct Client {
    plugin_id: Arc<str>,
    contract: Arc<Contract>,
    router: Arc<Router>,
    context: Context,
    state_schema: Option<Schema>,
}

impl Client {
    pub fn new(plugin_id: impl Into<Arc<str>>, contract: Arc<Contract>, router: Arc<Router>, context: Context) -> Self {
        Self::with_state_schema(plugin_id, contract, router, context, None)
    }

    /// Used by the runtime facade, which knows the underlying plugin
    /// definition's declared `stateSchema` — the streaming driver needs it
    /// to validate initial state, but the plain router/contract pair
    /// doesn't carry it.
    pub fn with_state_schema(
        plugin_id: impl Into<Arc<str>>,
        contract: Arc<Contract>,
        router: Arc<Router>,
        context: Context,
        state_schema: Option<Schema>,
    ) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            contract,
            router,
            context,
            state_schema,
        }
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    pub fn state_schema(&self) -> Option<&Schema> {
        self.state_schema.as_ref()
    }

    /// Calls a non-streamable procedure, validating `input` first.
    pub async fn call(&self, procedure_name: &str, input: Value) -> ForgeResult<Value> {
        let invocation = self.prepare_invocation(procedure_name, input, CancellationToken::new(), None)?;

        match self.router.dispatch(procedure_name, invocation).await? {
            ProcedureOutcome::Value(value) => Ok(value),
            ProcedureOutcome::Batch(_) => Err(ForgeError::new(forge_core::ErrorKind::ValidateInput, "call")
                .with_plugin(self.plugin_id.as_ref())
                .with_procedure(procedure_name)
                .with_cause("procedure is streamable; use the streaming driver instead")),
        }
    }

    /// Validates input and builds the invocation handed to the router,
    /// without dispatching — used directly by the streaming driver so it
    /// can supply its own cancellation token and carried-forward state.
    pub fn prepare_invocation(
        &self,
        procedure_name: &str,
        input: Value,
        cancellation: CancellationToken,
        last_event_id: Option<String>,
    ) -> ForgeResult<ProcedureInvocation> {
        let descriptor = self.contract.get(procedure_name).ok_or_else(|| {
            ForgeError::new(forge_core::ErrorKind::ValidateInput, "call")
                .with_plugin(self.plugin_id.as_ref())
                .with_procedure(procedure_name)
                .with_cause("no such procedure in contract")
        })?;

        descriptor.input_schema.validate(&input).map_err(|cause| {
            ForgeError::new(forge_core::ErrorKind::ValidateInput, "call")
                .with_plugin(self.plugin_id.as_ref())
                .with_procedure(procedure_name)
                .with_cause(cause)
        })?;

        Ok(ProcedureInvocation {
            input,
            context: self.context.clone(),
            errors: Arc::new(descriptor.errors.clone()),
            cancellation,
            last_event_id,
        })
    }

    pub fn contract(&self) -> &Arc<Contract> {
        &self.contract
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }
}
