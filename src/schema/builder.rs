use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};

use super::Schema;

/// SchemaBuilder helps construct JSON Schema incrementally.
///
/// Properties and required names are kept in ordered collections so that the
/// same builder calls always produce byte-identical schemas.
#[derive(Default)]
pub struct SchemaBuilder {
    schema_type: String,
    title: Option<String>,
    description: Option<String>,
    properties: BTreeMap<String, Value>,
    required: BTreeSet<String>,
    items: Option<Value>,
    examples: Vec<Value>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self {
            schema_type: "object".to_string(),
            ..Default::default()
        }
    }

    pub fn object() -> Self {
        Self::new()
    }

    pub fn array(items: Value) -> Self {
        Self {
            schema_type: "array".to_string(),
            items: Some(items),
            ..Default::default()
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn property(
        mut self,
        name: impl Into<String>,
        property_schema: Value,
        required: bool,
    ) -> Self {
        let name = name.into();
        self.properties.insert(name.clone(), property_schema);
        if required {
            self.required.insert(name);
        }
        self
    }

    pub fn example(mut self, example: Value) -> Self {
        self.examples.push(example);
        self
    }

    pub fn build(self) -> Schema {
        Schema::new(self.build_value())
    }

    /// Build into a bare JSON value, for nesting inside another builder.
    pub fn build_value(self) -> Value {
        let mut schema = json!({
            "type": self.schema_type
        });

        if let Some(title) = self.title {
            schema["title"] = json!(title);
        }

        if let Some(description) = self.description {
            schema["description"] = json!(description);
        }

        if self.schema_type == "array" {
            if let Some(items) = self.items {
                schema["items"] = items;
            }
        } else if !self.properties.is_empty() {
            schema["properties"] = json!(self.properties);
            if !self.required.is_empty() {
                schema["required"] = json!(self.required);
            }
        }

        if !self.examples.is_empty() {
            if self.examples.len() == 1 {
                schema["example"] = self.examples[0].clone();
            } else {
                schema["examples"] = json!(self.examples);
            }
        }

        schema
    }
}

/// String property restricted to a fixed set of values.
pub fn enumeration(description: &str, values: &[&str]) -> Value {
    json!({
        "type": "string",
        "description": description,
        "enum": values,
    })
}

/// Array-of-strings property.
pub fn string_array(description: &str) -> Value {
    json!({
        "type": "array",
        "description": description,
        "items": { "type": "string" },
    })
}
