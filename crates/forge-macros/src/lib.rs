//! Procedural macros for the Forge plugin runtime.
//!
//! This crate provides:
//!
//! - `contract!` — builds a [`forge_core::Contract`] from a declarative list
//!   of procedures, each with an input/output schema, an optional
//!   `streamable` marker, and optional tagged error schemas.

mod contract;

use proc_macro::TokenStream;

/// Builds a `Contract` from a declarative list of procedure declarations.
///
/// ```rust,ignore
/// use forge_macros::contract;
///
/// let contract = contract! {
///     ping {
///         input: serde_json::json!({"type": "object"}),
///         output: serde_json::json!({"type": "string"}),
///     },
///     tail {
///         input: serde_json::json!({"type": "object"}),
///         output: serde_json::json!({"type": "array"}),
///         streamable,
///         errors: {
///             "not-found" => serde_json::json!({"type": "object"}),
///         },
///     },
/// };
/// ```
///
/// Each procedure's `input`/`output` (and any `errors` entries) are
/// expressions evaluating to `serde_json::Value`; they're compiled into
/// `forge_core::Schema` at the call site, so a malformed schema document
/// panics at construction time rather than silently validating nothing.
#[proc_macro]
pub fn contract(input: TokenStream) -> TokenStream {
    contract::expand(input.into()).into()
}
