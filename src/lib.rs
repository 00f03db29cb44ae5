//! clinflow: a deterministic clinical-case workflow engine
//!
//! # Overview
//!
//! clinflow turns a raw patient case into a ranked differential diagnosis,
//! evidence citations and safety alerts by running it through a fixed
//! sequence of stages: triage, task planning, symptom analysis and safety
//! validation. Each stage produces a delta that the engine merges into the
//! case state, so the state only ever grows.
//!
//! Key features:
//! - Pattern-based red-flag detection with configurable keyword sets
//! - Mandatory human review whenever an emergency alert is raised
//! - Retrieval-augmented analysis with context offloading: full documents
//!   live in an [`EvidenceStore`], the state keeps ids and summaries only
//! - Per-call timeouts, bounded retries with exponential backoff, and a
//!   bounded retrieval worker pool
//! - Built-in OpenAI reasoning, plus PubMed and web-search retrieval gateways
//!
//! # Quick Start
//!
//! ```no_run
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//! use clinflow::{ClinicalCaseState, Engine, OpenAiGateway, PatientProfile, Sex};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Engine::builder(Arc::new(OpenAiGateway::from_env()?.build())).build();
//!
//!     let mut vitals = BTreeMap::new();
//!     vitals.insert("temperature".to_string(), 38.5);
//!     let case = ClinicalCaseState::new(
//!         PatientProfile::new("P-042", 8, Sex::Female),
//!         "sore throat and fever",
//!         vec![],
//!         vitals,
//!     );
//!
//!     let report = engine.run(case).await?;
//!     for diagnosis in report.state.diagnoses() {
//!         println!("{} ({:.2})", diagnosis.condition, diagnosis.probability);
//!     }
//!     println!("alerts: {:?}", report.alert_tags);
//!     Ok(())
//! }
//! ```

pub mod backend;
mod error;
pub mod evidence;
#[cfg(feature = "logging")]
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod redflag;
pub mod schema;

// Re-exports for convenience
pub use error::{EvidenceError, GatewayError, PipelineError, Result, ValidationError};
pub use evidence::EvidenceStore;
pub use model::{
    AlertSeverity, AlertTag, Citation, ClinicalCaseState, Diagnosis, DocumentId,
    EvidenceDocument, EvidenceRef, PatientProfile, RetrievedDocument, SafetyAlert, Sex,
    StateDelta, Symptom, SymptomSeverity, TriageLevel,
};
pub use pipeline::{
    ChannelSink, DeepResearchPolicy, Engine, EngineBuilder, EngineConfig, FinalReport,
    ObservabilitySink, QueryStrategy, RetryPolicy, SinkError, Stage, StageRecord, TracingSink,
};
pub use redflag::{RedFlagDetector, RedFlagRules};
pub use schema::{Schema, SchemaBuilder, SchemaType};

pub use backend::{
    PromptContext, ReasoningGateway, RequestKind, RetrievalGateway, RetrievalRouter,
};

#[cfg(feature = "openai")]
pub use backend::{OpenAiGateway, OpenAiModel};

#[cfg(feature = "pubmed")]
pub use backend::PubMedGateway;

#[cfg(feature = "web-search")]
pub use backend::WebSearchGateway;
