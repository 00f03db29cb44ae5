use super::{Schema, SchemaBuilder, enumeration, string_array};
use serde_json::json;

#[test]
fn test_schema_wraps_value_transparently() {
    let schema_json = json!({
        "type": "object",
        "properties": {
            "condition": { "type": "string" }
        },
        "required": ["condition"]
    });

    let schema = Schema::new(schema_json.clone());
    assert_eq!(serde_json::to_value(&schema).unwrap(), schema_json);
}

#[test]
fn test_schema_builder() {
    let schema = SchemaBuilder::object()
        .title("Diagnosis")
        .description("One candidate condition")
        .property(
            "condition",
            json!({ "type": "string", "description": "Condition name" }),
            true,
        )
        .property(
            "probability",
            json!({ "type": "number", "minimum": 0.0, "maximum": 1.0 }),
            true,
        )
        .property("red_flags", string_array("Warning signs"), false)
        .build();

    let schema_json = schema.to_json();
    assert_eq!(schema_json["type"], "object");
    assert_eq!(schema_json["title"], "Diagnosis");
    assert_eq!(schema_json["description"], "One candidate condition");
    assert_eq!(schema_json["properties"]["condition"]["type"], "string");
    assert_eq!(schema_json["properties"]["probability"]["maximum"], 1.0);
    assert_eq!(schema_json["properties"]["red_flags"]["items"]["type"], "string");

    // ordered, and optional properties are not required
    assert_eq!(schema_json["required"], json!(["condition", "probability"]));
}

#[test]
fn test_schema_builder_is_deterministic() {
    let build = || {
        SchemaBuilder::object()
            .property("b", json!({ "type": "string" }), true)
            .property("a", json!({ "type": "string" }), true)
            .build()
    };
    assert_eq!(
        serde_json::to_string(&build()).unwrap(),
        serde_json::to_string(&build()).unwrap()
    );
}

#[test]
fn test_array_builder() {
    let item = SchemaBuilder::object()
        .property("document_id", json!({ "type": "string" }), true)
        .build_value();
    let schema = SchemaBuilder::array(item).description("Summaries").build();
    let schema_json = schema.to_json();
    assert_eq!(schema_json["type"], "array");
    assert_eq!(schema_json["items"]["required"], json!(["document_id"]));
    assert!(schema_json.get("properties").is_none());
}

#[test]
fn test_enumeration_and_example() {
    let schema = SchemaBuilder::object()
        .property("level", enumeration("Acuity", &["routine", "urgent"]), true)
        .example(json!({ "level": "urgent" }))
        .build();
    let schema_json = schema.to_json();
    assert_eq!(
        schema_json["properties"]["level"]["enum"],
        json!(["routine", "urgent"])
    );
    assert_eq!(schema_json["example"]["level"], "urgent");
}
