//! Unified error taxonomy for the Forge plugin runtime.
//!
//! Every fault that can escape the runtime is represented by [`ForgeError`]:
//! a tagged [`ErrorKind`] plus enough structured context (`plugin_id`,
//! `operation`, optional `procedure_name`, `retryable`, and an optional
//! boxed `cause`) to be logged and routed by callers.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Type-erased source error, boxed so [`ForgeError`] doesn't need a generic parameter.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Tagged error kinds, matching the runtime's error taxonomy one-to-one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ValidatePluginId,
    RegisterRemote,
    LoadRemote,
    InstantiatePlugin,
    ValidateConfig,
    ValidateSecrets,
    ValidateHydratedConfig,
    InitializePlugin,
    ValidateInput,
    StreamPluginValidate,
    ValidateState,
    ShutdownPlugin,
    CacheLookup,
    StreamTermination,
}

impl ErrorKind {
    /// The wire/log tag for this kind.
    pub const fn tag(self) -> &'static str {
        match self {
            Self::ValidatePluginId => "validate-plugin-id",
            Self::RegisterRemote => "register-remote",
            Self::LoadRemote => "load-remote",
            Self::InstantiatePlugin => "instantiate-plugin",
            Self::ValidateConfig => "validate-config",
            Self::ValidateSecrets => "validate-secrets",
            Self::ValidateHydratedConfig => "validate-hydrated-config",
            Self::InitializePlugin => "initialize-plugin",
            Self::ValidateInput => "validate-input",
            Self::StreamPluginValidate => "stream-plugin-validate",
            Self::ValidateState => "validate-state",
            Self::ShutdownPlugin => "shutdown-plugin",
            Self::CacheLookup => "cache-lookup",
            Self::StreamTermination => "stream-termination",
        }
    }

    /// Default retryability absent any more specific classification.
    ///
    /// Only `register-remote` is retryable by default; `initialize-plugin`
    /// inherits retryability from its cause instead (see
    /// [`ForgeError::initialize_plugin`]).
    pub const fn default_retryable(self) -> bool {
        matches!(self, Self::RegisterRemote)
    }
}

/// A runtime fault, tagged with enough context to log and route without
/// re-parsing a message string.
///
/// `cause` is kept behind an `Arc` rather than a bare `Box` so the whole
/// error is `Clone` — the plugin cache's single-flight future shares one
/// initialization outcome across every concurrent caller, and a
/// shared `Err` must be handed back to each of them independently.
#[derive(Debug, Error, Clone)]
#[error("{operation} failed for plugin '{pid}' ({tag}, retryable={retryable})",
    pid = self.plugin_id.as_deref().unwrap_or("<unresolved>"),
    tag = self.kind.tag())]
pub struct ForgeError {
    pub kind: ErrorKind,
    pub plugin_id: Option<String>,
    pub operation: &'static str,
    pub procedure_name: Option<String>,
    pub retryable: bool,
    #[source]
    pub cause: Option<Arc<dyn std::error::Error + Send + Sync + 'static>>,
}

impl ForgeError {
    pub fn new(kind: ErrorKind, operation: &'static str) -> Self {
        Self {
            retryable: kind.default_retryable(),
            kind,
            operation,
            plugin_id: None,
            procedure_name: None,
            cause: None,
        }
    }

    pub fn with_plugin(mut self, plugin_id: impl Into<String>) -> Self {
        self.plugin_id = Some(plugin_id.into());
        self
    }

    pub fn with_procedure(mut self, name: impl Into<String>) -> Self {
        self.procedure_name = Some(name.into());
        self
    }

    pub fn with_cause(mut self, cause: impl Into<BoxError>) -> Self {
        self.cause = Some(Arc::from(cause.into()));
        self
    }

    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Constructs an `initialize-plugin` error whose retryability is
    /// inherited from the cause's classification, defaulting to `false`
    /// when the cause gives no signal.
    pub fn initialize_plugin(plugin_id: impl Into<String>, cause: impl fmt::Display) -> Self {
        let message = cause.to_string();
        let retryable = classify_retryable(&message).unwrap_or(false);
        Self::new(ErrorKind::InitializePlugin, "initializePlugin")
            .with_plugin(plugin_id)
            .with_cause(message)
            .retryable(retryable)
    }
}

/// Result alias used throughout the runtime.
pub type ForgeResult<T> = Result<T, ForgeError>;

/// Classifies a fault signal according to the runtime's propagation-policy
/// rules.
///
/// Returns `None` when the signal carries no recognizable classification
/// keyword, so the caller can fall back to a context-appropriate default.
pub fn classify_retryable(signal: &str) -> Option<bool> {
    let lower = signal.to_ascii_lowercase();
    const RETRYABLE: &[&str] = &["timeout", "timed out", "rate-limited", "rate limited", "service-unavailable", "service unavailable", "transport"];
    const NOT_RETRYABLE: &[&str] = &["unauthorized", "forbidden", "bad-request", "bad request", "not-found", "not found"];

    if RETRYABLE.iter().any(|needle| lower.contains(needle)) {
        Some(true)
    } else if NOT_RETRYABLE.iter().any(|needle| lower.contains(needle)) {
        Some(false)
    } else {
        None
    }
}
