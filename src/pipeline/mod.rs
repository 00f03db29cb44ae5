//! The fixed four-stage pipeline and the engine that drives it.

mod analysis;
mod config;
mod engine;
mod observe;
mod planning;
mod report;
mod safety;
mod triage;

pub use config::{DeepResearchPolicy, EngineConfig, QueryStrategy, RetryPolicy};
pub use engine::{Engine, EngineBuilder};
pub use observe::{ChannelSink, ObservabilitySink, SinkError, StageRecord, TracingSink};
pub use report::FinalReport;
pub use triage::heuristic_triage;

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::backend::{ReasoningGateway, RetrievalGateway};
use crate::evidence::EvidenceStore;
use crate::redflag::RedFlagDetector;

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Triage,
    Planning,
    SymptomAnalysis,
    SafetyValidation,
}

impl Stage {
    pub const ORDER: [Stage; 4] = [
        Stage::Triage,
        Stage::Planning,
        Stage::SymptomAnalysis,
        Stage::SafetyValidation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Triage => "triage",
            Stage::Planning => "planning",
            Stage::SymptomAnalysis => "symptom_analysis",
            Stage::SafetyValidation => "safety_validation",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collaborators shared by every stage of every run.
pub(crate) struct StageContext {
    pub reasoning: Arc<dyn ReasoningGateway>,
    pub retrieval: Arc<dyn RetrievalGateway>,
    pub store: EvidenceStore,
    pub detector: RedFlagDetector,
    pub config: EngineConfig,
}
