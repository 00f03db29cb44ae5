mod builder;
pub use builder::{SchemaBuilder, enumeration, string_array};

use serde::Serialize;
use serde_json::Value;

/// Schema is a representation of a JSON Schema that describes the structure
/// a reasoning service should return for one kind of request.
///
/// It travels with every [`PromptContext`](crate::PromptContext) so that a
/// gateway backend can ask the service for exactly that shape (for instance
/// through function calling), while the stage that issued the request still
/// does the actual validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Schema {
    pub schema: Value,
}

impl Schema {
    pub fn new(schema: Value) -> Self {
        Self { schema }
    }

    pub fn to_json(&self) -> &Value {
        &self.schema
    }

    /// Create a schema builder for an object type
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::object()
    }
}

/// SchemaType trait defines a type that can be converted to a JSON Schema
pub trait SchemaType {
    /// Generate a JSON Schema representation of this type
    fn schema() -> Schema;

    /// Optional name for the schema
    fn schema_name() -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests;
