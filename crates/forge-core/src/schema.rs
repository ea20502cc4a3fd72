//! Opaque schema values with validate/infer operations.
//!
//! `Schema` wraps a compiled JSON Schema document. The schema/validation
//! library itself is out of scope for the runtime; this is the minimal
//! concrete stand-in the rest of the crate is built against.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

/// A compiled JSON Schema document.
///
/// Cheap to clone — the compiled validator and raw document are both behind
/// an `Arc`.
#[derive(Clone)]
pub struct Schema {
    document: Arc<Value>,
    validator: Arc<jsonschema::Validator>,
}

#[derive(Debug, Error)]
#[error("schema error: {0}")]
pub struct SchemaError(pub String);

impl Schema {
    /// Compiles a JSON Schema document. Fails if the document itself is not
    /// a valid schema.
    pub fn compile(document: Value) -> Result<Self, SchemaError> {
        let validator = jsonschema::validator_for(&document).map_err(|e| SchemaError(e.to_string()))?;
        Ok(Self {
            document: Arc::new(document),
            validator: Arc::new(validator),
        })
    }

    /// The permissive schema `{}`, which accepts any instance. Useful as a
    /// default for plugins that declare no `stateSchema`.
    pub fn any() -> Self {
        Self::compile(serde_json::json!({})).expect("`{}` is always a valid schema")
    }

    /// Validates `instance`, returning the first violation as a
    /// human-readable message.
    pub fn validate(&self, instance: &Value) -> Result<(), SchemaError> {
        self.validator
            .validate(instance)
            .map_err(|e| SchemaError(e.to_string()))
    }

    pub fn document(&self) -> &Value {
        &self.document
    }
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema").field("document", &self.document).finish()
    }
}

/// The two sub-schemas every plugin declares under `configSchema`.
#[derive(Clone, Debug)]
pub struct ConfigSchema {
    pub variables: Schema,
    pub secrets: Schema,
}

impl ConfigSchema {
    pub fn new(variables: Schema, secrets: Schema) -> Self {
        Self { variables, secrets }
    }

    pub fn permissive() -> Self {
        Self {
            variables: Schema::any(),
            secrets: Schema::any(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_and_validates_object_schema() {
        let schema = Schema::compile(serde_json::json!({
            "type": "object",
            "required": ["url"],
            "properties": { "url": { "type": "string" } }
        }))
        .unwrap();

        assert!(schema.validate(&serde_json::json!({"url": "http://x"})).is_ok());
        assert!(schema.validate(&serde_json::json!({})).is_err());
    }

    #[test]
    fn any_schema_accepts_everything() {
        let schema = Schema::any();
        assert!(schema.validate(&serde_json::json!(42)).is_ok());
        assert!(schema.validate(&serde_json::json!(null)).is_ok());
    }
}
