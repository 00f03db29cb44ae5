use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{Instrument, Span, debug, info, info_span, instrument, warn};
use uuid::Uuid;

use crate::backend::{ReasoningGateway, RetrievalGateway, RetrievalRouter};
use crate::error::PipelineError;
use crate::evidence::EvidenceStore;
use crate::model::{ClinicalCaseState, StateDelta};
use crate::redflag::{RedFlagDetector, RedFlagRules};

use super::observe::{ObservabilitySink, StageRecord, TracingSink};
use super::{EngineConfig, FinalReport, Stage, StageContext, analysis, planning, safety, triage};

/// Runs a case through triage, planning, symptom analysis and safety
/// validation, in that order.
///
/// An engine holds no per-run state and can serve any number of runs,
/// concurrently or not. All runs share its [`EvidenceStore`].
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// use std::collections::BTreeMap;
/// use std::sync::Arc;
/// use clinflow::{
///     ClinicalCaseState, Engine, EngineConfig, OpenAiGateway, PatientProfile, RetrievalRouter,
///     Sex, WebSearchGateway,
/// };
///
/// let engine = Engine::builder(Arc::new(OpenAiGateway::from_env()?.build()))
///     .retrieval(Arc::new(
///         RetrievalRouter::new().register("web", WebSearchGateway::from_env()?.build()),
///     ))
///     .config(EngineConfig::default().sources(["web"]))
///     .build();
///
/// let case = ClinicalCaseState::new(
///     PatientProfile::new("P-001", 67, Sex::Male),
///     "crushing chest pain radiating to left arm",
///     vec![],
///     BTreeMap::new(),
/// );
/// let report = engine.run(case).await?;
/// if report.requires_human_review {
///     println!("review: {}", report.review_reasons.join(", "));
/// }
/// # Ok(())
/// # }
/// ```
pub struct Engine {
    ctx: StageContext,
    sink: Arc<dyn ObservabilitySink>,
}

pub struct EngineBuilder {
    reasoning: Arc<dyn ReasoningGateway>,
    retrieval: Arc<dyn RetrievalGateway>,
    store: EvidenceStore,
    sink: Arc<dyn ObservabilitySink>,
    rules: RedFlagRules,
    config: EngineConfig,
}

impl EngineBuilder {
    pub fn retrieval(mut self, retrieval: Arc<dyn RetrievalGateway>) -> Self {
        self.retrieval = retrieval;
        self
    }

    /// Share an existing store, e.g. one already read by downstream consumers.
    pub fn evidence_store(mut self, store: EvidenceStore) -> Self {
        self.store = store;
        self
    }

    pub fn sink(mut self, sink: Arc<dyn ObservabilitySink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn rules(mut self, rules: RedFlagRules) -> Self {
        debug!(families = rules.families.len(), "Setting red-flag rules");
        self.rules = rules;
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        debug!(?config, "Setting engine configuration");
        self.config = config;
        self
    }

    pub fn build(self) -> Engine {
        info!(
            sources = ?self.config.sources,
            width = self.config.retrieval_width(),
            timeout_ms = self.config.call_timeout_ms,
            "Engine configuration complete"
        );
        Engine {
            ctx: StageContext {
                reasoning: self.reasoning,
                retrieval: self.retrieval,
                store: self.store,
                detector: RedFlagDetector::new(self.rules),
                config: self.config,
            },
            sink: self.sink,
        }
    }
}

impl Engine {
    /// Start building an engine around a reasoning gateway.
    ///
    /// Retrieval defaults to an empty [`RetrievalRouter`], which together
    /// with the default empty source list means no literature search.
    pub fn builder(reasoning: Arc<dyn ReasoningGateway>) -> EngineBuilder {
        EngineBuilder {
            reasoning,
            retrieval: Arc::new(RetrievalRouter::new()),
            store: EvidenceStore::new(),
            sink: Arc::new(TracingSink),
            rules: RedFlagRules::default(),
            config: EngineConfig::default(),
        }
    }

    pub fn evidence_store(&self) -> &EvidenceStore {
        &self.ctx.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.ctx.config
    }

    pub fn detector(&self) -> &RedFlagDetector {
        &self.ctx.detector
    }

    /// Run one case through every stage.
    ///
    /// Input is validated first; an invalid case never reaches a stage.
    /// Gateway failures degrade the report (and add alerts) instead of
    /// failing the run. Only validation errors and
    /// [`PipelineError::FatalConsistency`] are returned as errors.
    #[instrument(name = "pipeline_run", skip(self, state), fields(run_id = %state.run_id()))]
    pub async fn run(&self, state: ClinicalCaseState) -> Result<FinalReport, PipelineError> {
        state.validate().inspect_err(|e| {
            warn!(error = %e, "Rejected invalid case");
        })?;
        let run_id = state.run_id();
        info!(
            age = state.patient().age,
            symptoms = state.symptoms().len(),
            "Starting clinical pipeline"
        );

        let started = Instant::now();
        let input = describe_state(&state);
        let delta = triage::run(&self.ctx, &state)
            .instrument(stage_span(run_id, Stage::Triage))
            .await;
        let state = self.commit(Stage::Triage, state, delta, started, input);

        let started = Instant::now();
        let input = describe_state(&state);
        let delta = stage_span(run_id, Stage::Planning)
            .in_scope(|| planning::plan(&self.ctx.detector, &state));
        let state = self.commit(Stage::Planning, state, delta, started, input);

        let started = Instant::now();
        let input = describe_state(&state);
        let delta = analysis::run(&self.ctx, &state)
            .instrument(stage_span(run_id, Stage::SymptomAnalysis))
            .await;
        let state = self.commit(Stage::SymptomAnalysis, state, delta, started, input);

        let started = Instant::now();
        let input = describe_state(&state);
        let span = stage_span(run_id, Stage::SafetyValidation);
        let delta = span.in_scope(|| safety::check(&self.ctx.detector, &state))?;
        let state = self.commit(Stage::SafetyValidation, state, delta, started, input);
        span.in_scope(|| safety::verify(&state))?;

        let report = FinalReport::from_state(state);
        info!(
            requires_human_review = report.requires_human_review,
            alerts = report.alert_tags.len(),
            diagnoses = report.state.diagnoses().len(),
            evidence = report.state.evidence().len(),
            "Clinical pipeline complete"
        );
        Ok(report)
    }

    /// [`run`](Self::run) with an overall deadline.
    ///
    /// When the deadline passes, the run future is dropped, which cancels
    /// every gateway call still in flight. Store inserts are atomic, so the
    /// [`EvidenceStore`] only ever holds complete documents.
    pub async fn run_with_deadline(
        &self,
        state: ClinicalCaseState,
        deadline: Duration,
    ) -> Result<FinalReport, PipelineError> {
        let run_id = state.run_id();
        match tokio::time::timeout(deadline, self.run(state)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(%run_id, deadline_ms = deadline.as_millis() as u64, "Pipeline run cancelled at deadline");
                Err(PipelineError::Cancelled)
            }
        }
    }

    fn commit(
        &self,
        stage: Stage,
        state: ClinicalCaseState,
        delta: StateDelta,
        started: Instant,
        input_summary: String,
    ) -> ClinicalCaseState {
        let output_summary = describe_delta(&delta);
        let state = state.apply(delta);
        let record = StageRecord {
            run_id: state.run_id(),
            stage,
            input_summary,
            output_summary,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        if let Err(e) = self.sink.record(&record) {
            debug!(error = %e, stage = stage.as_str(), "Observability sink dropped record");
        }
        state
    }
}

fn stage_span(run_id: Uuid, stage: Stage) -> Span {
    info_span!("stage", %run_id, stage = stage.as_str())
}

fn describe_state(state: &ClinicalCaseState) -> String {
    format!(
        "age={} symptoms={} diagnoses={} evidence={} alerts={}",
        state.patient().age,
        state.symptoms().len(),
        state.diagnoses().len(),
        state.evidence().len(),
        state.alerts().len()
    )
}

fn describe_delta(delta: &StateDelta) -> String {
    let mut parts = Vec::new();
    if let Some(triage) = &delta.triage {
        parts.push(format!("triage={}", triage.level));
    }
    if !delta.todos.is_empty() {
        parts.push(format!("todos={}", delta.todos.len()));
    }
    if let Some(diagnoses) = &delta.diagnoses {
        parts.push(format!("diagnoses={}", diagnoses.len()));
    }
    if !delta.evidence.is_empty() {
        parts.push(format!("evidence={}", delta.evidence.len()));
    }
    if !delta.alerts.is_empty() {
        let tags: Vec<&str> = delta.alerts.iter().map(|a| a.tag.as_str()).collect();
        parts.push(format!("alerts={}", tags.join(",")));
    }
    if parts.is_empty() {
        "no changes".to_string()
    } else {
        parts.join(" ")
    }
}
