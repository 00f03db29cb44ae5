use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::error::GatewayError;
use crate::model::{ClinicalCaseState, DocumentId, Sex, StructuredResult, Symptom, TriageLevel};
use crate::schema::Schema;

/// The three kinds of question the pipeline asks a reasoning service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Triage,
    Diagnosis,
    Summarize,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Triage => "triage",
            RequestKind::Diagnosis => "diagnosis",
            RequestKind::Summarize => "summarize",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compact, serializable view of a case handed to the reasoning service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseSummary {
    pub age: i32,
    pub sex: Sex,
    /// "pediatric", "geriatric" or "adult"
    pub age_group: &'static str,
    pub bmi: Option<f64>,
    pub allergies: Vec<String>,
    pub current_medications: Vec<String>,
    pub chronic_conditions: Vec<String>,
    pub chief_complaint: String,
    pub symptoms: Vec<Symptom>,
    pub vital_signs: BTreeMap<String, f64>,
    pub triage_level: Option<TriageLevel>,
}

impl CaseSummary {
    pub fn from_state(state: &ClinicalCaseState) -> Self {
        let patient = state.patient();
        let age_group = if patient.is_pediatric() {
            "pediatric"
        } else if patient.is_geriatric() {
            "geriatric"
        } else {
            "adult"
        };
        Self {
            age: patient.age,
            sex: patient.sex,
            age_group,
            bmi: patient.bmi(),
            allergies: patient.allergies.iter().cloned().collect(),
            current_medications: patient.current_medications.clone(),
            chronic_conditions: patient.chronic_conditions.clone(),
            chief_complaint: state.chief_complaint().to_string(),
            symptoms: state.symptoms().to_vec(),
            vital_signs: state.vital_signs().clone(),
            triage_level: state.triage().map(|t| t.level),
        }
    }
}

/// A bounded slice of a stored document, sent for summarization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentExcerpt {
    pub document_id: DocumentId,
    pub title: String,
    pub excerpt: String,
}

/// Everything a reasoning backend needs to answer one request: the case,
/// optional document excerpts, and the schema the answer must follow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptContext {
    pub run_id: Uuid,
    pub case: CaseSummary,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub documents: Vec<DocumentExcerpt>,
    /// Free-form focus for the request, e.g. the literature query
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus: Option<String>,
    pub schema_name: String,
    pub schema: Schema,
}

impl PromptContext {
    /// Context for a request whose answer must have the shape of `T`.
    pub fn for_result<T: StructuredResult>(state: &ClinicalCaseState) -> Self {
        Self {
            run_id: state.run_id(),
            case: CaseSummary::from_state(state),
            documents: Vec::new(),
            focus: None,
            schema_name: T::schema_name().unwrap_or_else(|| "output".to_string()),
            schema: T::schema(),
        }
    }

    pub fn documents(mut self, documents: Vec<DocumentExcerpt>) -> Self {
        self.documents = documents;
        self
    }

    pub fn focus(mut self, focus: impl Into<String>) -> Self {
        self.focus = Some(focus.into());
        self
    }
}

/// Capability interface to an external structured-reasoning service.
///
/// Implementations return the raw JSON answer; they do not validate it
/// against `context.schema`. The calling stage does that, and treats a
/// mismatch as [`GatewayError::MalformedOutput`].
#[async_trait]
pub trait ReasoningGateway: Send + Sync {
    async fn infer(&self, kind: RequestKind, context: &PromptContext)
    -> Result<Value, GatewayError>;
}
