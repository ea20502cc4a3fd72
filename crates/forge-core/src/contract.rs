//! Contract model: the declared set of procedures a plugin exposes, each
//! with input/output/error schemas and a streamable marker.

use std::collections::HashMap;

use crate::schema::Schema;

/// Optional route metadata consumed by external HTTP adapters. The runtime
/// itself never interprets this; it only carries it through to the
/// router/client surface.
#[derive(Clone, Debug, Default)]
pub struct RouteMetadata {
    pub method: Option<String>,
    pub path: Option<String>,
}

/// One procedure's declaration within a [`Contract`].
#[derive(Clone, Debug)]
pub struct ProcedureDescriptor {
    pub input_schema: Schema,
    pub output_schema: Schema,
    pub errors: HashMap<String, Schema>,
    pub streamable: bool,
    pub route: Option<RouteMetadata>,
}

impl ProcedureDescriptor {
    pub fn new(input_schema: Schema, output_schema: Schema) -> Self {
        Self {
            input_schema,
            output_schema,
            errors: HashMap::new(),
            streamable: false,
            route: None,
        }
    }

    pub fn streamable(mut self) -> Self {
        self.streamable = true;
        self
    }

    pub fn with_error(mut self, tag: impl Into<String>, schema: Schema) -> Self {
        self.errors.insert(tag.into(), schema);
        self
    }

    pub fn with_route(mut self, route: RouteMetadata) -> Self {
        self.route = Some(route);
        self
    }
}

/// A plugin's declared contract: a mapping from procedure name to descriptor.
#[derive(Clone, Debug, Default)]
pub struct Contract {
    procedures: HashMap<String, ProcedureDescriptor>,
}

impl Contract {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_procedure(mut self, name: impl Into<String>, descriptor: ProcedureDescriptor) -> Self {
        self.procedures.insert(name.into(), descriptor);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ProcedureDescriptor> {
        self.procedures.get(name)
    }

    pub fn is_streamable(&self, name: &str) -> bool {
        self.procedures.get(name).is_some_and(|p| p.streamable)
    }

    pub fn procedure_names(&self) -> impl Iterator<Item = &str> {
        self.procedures.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }
}
