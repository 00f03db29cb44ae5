use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, error};

use crate::error::GatewayError;
use crate::model::{Diagnosis, DocumentId, TriageLevel};
use crate::schema::{Schema, SchemaBuilder, SchemaType, enumeration, string_array};

/// A result shape a stage expects back from the reasoning service.
///
/// Combines the JSON schema sent along with the request and the validation
/// applied to the answer. Validation happens in the stage, not in the
/// gateway: a backend only transports JSON.
pub trait StructuredResult: SchemaType + DeserializeOwned + Serialize {
    /// Domain checks beyond what deserialization already enforces.
    ///
    /// The default implementation accepts everything.
    fn validate(&self) -> Result<(), GatewayError> {
        Ok(())
    }
}

/// Deserialize and validate a raw structured answer.
///
/// Any failure is reported as [`GatewayError::MalformedOutput`], which the
/// pipeline never retries.
pub fn parse_structured<T: StructuredResult>(value: Value) -> Result<T, GatewayError> {
    let type_name = std::any::type_name::<T>();
    let parsed: T = serde_json::from_value(value).map_err(|e| {
        error!(error = %e, type_name, "Structured result does not match schema");
        GatewayError::MalformedOutput(format!("{type_name}: {e}"))
    })?;
    parsed.validate().map_err(|e| {
        error!(error = %e, type_name, "Structured result failed validation");
        e
    })?;
    debug!(type_name, "Structured result parsed and validated");
    Ok(parsed)
}

/// Expected answer to a triage request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageResult {
    pub level: TriageLevel,
    pub assessment: String,
}

impl SchemaType for TriageResult {
    fn schema() -> Schema {
        SchemaBuilder::object()
            .title("TriageResult")
            .description("Initial urgency classification of a clinical case")
            .property(
                "level",
                enumeration("Acuity level", &["routine", "urgent", "emergent"]),
                true,
            )
            .property(
                "assessment",
                json!({"type": "string", "description": "Brief initial assessment"}),
                true,
            )
            .build()
    }

    fn schema_name() -> Option<String> {
        Some("triage_result".to_string())
    }
}

impl StructuredResult for TriageResult {}

/// Expected answer to a diagnosis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifferentialResult {
    pub diagnoses: Vec<Diagnosis>,
    #[serde(default)]
    pub recommended_tests: Vec<String>,
    #[serde(default)]
    pub clinical_reasoning: String,
}

impl SchemaType for DifferentialResult {
    fn schema() -> Schema {
        let diagnosis = SchemaBuilder::object()
            .title("Diagnosis")
            .property(
                "condition",
                json!({"type": "string", "description": "Medical condition name"}),
                true,
            )
            .property(
                "probability",
                json!({"type": "number", "minimum": 0.0, "maximum": 1.0}),
                true,
            )
            .property(
                "reasoning",
                json!({"type": "string", "description": "Clinical reasoning for this diagnosis"}),
                true,
            )
            .property(
                "typical_symptoms",
                string_array("Symptoms typically associated with this condition"),
                false,
            )
            .property(
                "red_flags",
                string_array("Warning signs requiring immediate attention"),
                false,
            )
            .property(
                "classification_code",
                json!({"type": "string", "description": "ICD-10 diagnosis code"}),
                false,
            )
            .build_value();

        SchemaBuilder::object()
            .title("DifferentialResult")
            .description("Differential diagnosis with 3-5 candidates ordered by probability")
            .property(
                "diagnoses",
                SchemaBuilder::array(diagnosis).build_value(),
                true,
            )
            .property(
                "recommended_tests",
                string_array("Diagnostic tests to confirm or rule out conditions"),
                false,
            )
            .property(
                "clinical_reasoning",
                json!({"type": "string"}),
                false,
            )
            .build()
    }

    fn schema_name() -> Option<String> {
        Some("differential_result".to_string())
    }
}

impl StructuredResult for DifferentialResult {
    fn validate(&self) -> Result<(), GatewayError> {
        if self.diagnoses.is_empty() {
            return Err(GatewayError::MalformedOutput(
                "differential contains no diagnoses".to_string(),
            ));
        }
        for dx in &self.diagnoses {
            if dx.condition.trim().is_empty() {
                return Err(GatewayError::MalformedOutput(
                    "diagnosis with empty condition name".to_string(),
                ));
            }
            if !dx.probability.is_finite() || !(0.0..=1.0).contains(&dx.probability) {
                return Err(GatewayError::MalformedOutput(format!(
                    "probability for {} out of range: {}",
                    dx.condition, dx.probability
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub document_id: DocumentId,
    pub summary: String,
}

/// Expected answer to a summarize request covering a batch of documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryBatch {
    pub summaries: Vec<DocumentSummary>,
}

impl SummaryBatch {
    pub fn get(&self, id: &DocumentId) -> Option<&str> {
        self.summaries
            .iter()
            .find(|s| &s.document_id == id && !s.summary.trim().is_empty())
            .map(|s| s.summary.as_str())
    }
}

impl SchemaType for SummaryBatch {
    fn schema() -> Schema {
        let entry = SchemaBuilder::object()
            .property("document_id", json!({"type": "string"}), true)
            .property(
                "summary",
                json!({"type": "string", "description": "Key clinical findings relevant to the case"}),
                true,
            )
            .build_value();
        SchemaBuilder::object()
            .title("SummaryBatch")
            .description("One short clinical summary per supplied document")
            .property("summaries", SchemaBuilder::array(entry).build_value(), true)
            .build()
    }

    fn schema_name() -> Option<String> {
        Some("summary_batch".to_string())
    }
}

impl StructuredResult for SummaryBatch {}
