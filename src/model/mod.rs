//! The clinical case model: immutable case input plus the output the
//! pipeline accumulates for it.

mod alert;
mod diagnosis;
mod evidence;
mod patient;
mod state;
mod structured;
mod task;
mod triage;

pub use alert::{AlertSeverity, AlertTag, SafetyAlert};
pub use diagnosis::{Diagnosis, rank_diagnoses};
pub use evidence::{Citation, DocumentId, EvidenceDocument, EvidenceRef, RetrievedDocument};
pub use patient::{PatientProfile, Sex, Symptom, SymptomSeverity};
pub use state::{ClinicalCaseState, StateDelta, TRIAGE_EMERGENT};
pub use structured::{
    DifferentialResult, DocumentSummary, StructuredResult, SummaryBatch, TriageResult,
    parse_structured,
};
pub use task::{TaskKind, TaskPriority, TaskStatus, Todo};
pub use triage::{TriageAssessment, TriageLevel, TriageSource};
