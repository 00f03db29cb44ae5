//! Symptom analysis: differential diagnosis plus literature retrieval.
//!
//! Retrieved documents go to the [`EvidenceStore`](crate::EvidenceStore) in
//! full; the state only ever receives an [`EvidenceRef`] with a summary.

use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::backend::utils::call_with_retry;
use crate::backend::{DocumentExcerpt, PromptContext, RequestKind};
use crate::error::GatewayError;
use crate::model::{
    AlertSeverity, AlertTag, ClinicalCaseState, DifferentialResult, EvidenceDocument,
    EvidenceRef, SafetyAlert, StateDelta, SummaryBatch, TaskKind, parse_structured,
    rank_diagnoses,
};

use super::{DeepResearchPolicy, QueryStrategy, StageContext};

/// One search to run against every configured source.
struct Lookup {
    query: String,
    max_results: usize,
}

pub(crate) async fn run(ctx: &StageContext, state: &ClinicalCaseState) -> StateDelta {
    let config = &ctx.config;
    let complaint = Lookup {
        query: state.chief_complaint().to_string(),
        max_results: config.max_results_per_source,
    };
    let (differential, focus, mut documents) = match config.query_strategy {
        QueryStrategy::ChiefComplaint | QueryStrategy::DeepResearch => {
            let (differential, documents) = tokio::join!(
                generate_differential(ctx, state),
                retrieve(ctx, std::slice::from_ref(&complaint))
            );
            (differential, complaint.query, documents)
        }
        QueryStrategy::TopDiagnosis => {
            let differential = generate_differential(ctx, state).await;
            let query = differential
                .as_ref()
                .ok()
                .and_then(|d| d.diagnoses.first())
                .map(|d| format!("{} diagnosis and management", d.condition))
                .unwrap_or(complaint.query);
            let lookup = Lookup {
                query,
                max_results: config.max_results_per_source,
            };
            let documents = retrieve(ctx, std::slice::from_ref(&lookup)).await;
            (differential, lookup.query, documents)
        }
    };

    if config.query_strategy == QueryStrategy::DeepResearch
        && !config.sources.is_empty()
        && let Ok(result) = &differential
        && let Some(trigger) = deep_research_trigger(&config.deep_research, state, result)
    {
        let policy = &config.deep_research;
        let lookups: Vec<Lookup> = result
            .diagnoses
            .iter()
            .take(policy.max_conditions)
            .map(|d| Lookup {
                query: format!("{} clinical presentation and diagnosis", d.condition),
                max_results: policy.results_per_query,
            })
            .collect();
        info!(trigger, conditions = lookups.len(), "Starting literature deep dive");
        for document in retrieve(ctx, &lookups).await {
            if !documents.iter().any(|d| d.id == document.id) {
                documents.push(document);
            }
        }
    }

    let evidence = summarize_evidence(ctx, state, &focus, &documents).await;

    let mut delta = StateDelta {
        completed_tasks: vec![TaskKind::SymptomAnalysis, TaskKind::LiteratureSearch],
        ..StateDelta::default()
    };

    match differential {
        Ok(result) => {
            if let Some(top) = result.diagnoses.first() {
                delta
                    .confidence
                    .insert("diagnosis".to_string(), top.probability);
            }
            delta.recommended_tests = result.recommended_tests;
            delta.diagnoses = Some(result.diagnoses);
        }
        Err(e) => {
            warn!(error = %e, "Differential diagnosis unavailable");
            delta.diagnoses = Some(Vec::new());
            delta.alerts.push(SafetyAlert::new(
                AlertTag::InsufficientAnalysis,
                AlertSeverity::Critical,
                format!("INSUFFICIENT ANALYSIS - no differential diagnosis could be produced ({e})"),
            ));
        }
    }

    if !config.sources.is_empty() && evidence.is_empty() {
        delta.alerts.push(SafetyAlert::new(
            AlertTag::EvidenceUnavailable,
            AlertSeverity::Warning,
            format!(
                "EVIDENCE UNAVAILABLE - no documents retrieved from {} source(s)",
                config.sources.len()
            ),
        ));
    }
    delta.evidence = evidence;

    // Diagnoses can carry red-flag terms the raw symptoms did not.
    let provisional = state.clone().apply(delta.clone());
    let detected = ctx.detector.detect(&provisional);
    debug!(count = detected.len(), "Red-flag detection after analysis");
    delta.alerts.extend(detected);

    delta
}

/// One diagnosis request, validated and ranked.
async fn generate_differential(
    ctx: &StageContext,
    state: &ClinicalCaseState,
) -> Result<DifferentialResult, GatewayError> {
    let context = PromptContext::for_result::<DifferentialResult>(state);
    let value = call_with_retry(
        "diagnosis",
        ctx.config.call_timeout(),
        &ctx.config.retry,
        || ctx.reasoning.infer(RequestKind::Diagnosis, &context),
    )
    .await?;
    let mut result: DifferentialResult = parse_structured(value)?;
    result.diagnoses = rank_diagnoses(result.diagnoses, ctx.config.diagnosis_limit());
    info!(
        count = result.diagnoses.len(),
        top = result.diagnoses.first().map(|d| d.condition.as_str()),
        "Differential diagnosis generated"
    );
    Ok(result)
}

/// Why the differential needs condition-level literature, if it does.
fn deep_research_trigger(
    policy: &DeepResearchPolicy,
    state: &ClinicalCaseState,
    differential: &DifferentialResult,
) -> Option<&'static str> {
    let top = differential.diagnoses.first()?;
    if top.probability < policy.confidence_below {
        return Some("low confidence");
    }
    if state.patient().chronic_conditions.len() >= policy.chronic_condition_threshold {
        return Some("complex history");
    }
    let condition = top.condition.to_lowercase();
    if policy
        .rare_terms
        .iter()
        .any(|term| condition.contains(&term.to_lowercase()))
    {
        return Some("rare condition");
    }
    None
}

/// Run every lookup against every configured source through the bounded
/// worker pool and store what comes back.
///
/// Failed or timed-out searches contribute nothing. The result keeps
/// lookup and source order, without duplicates.
async fn retrieve(ctx: &StageContext, lookups: &[Lookup]) -> Vec<Arc<EvidenceDocument>> {
    let config = &ctx.config;
    let jobs: Vec<(&Lookup, &String)> = lookups
        .iter()
        .flat_map(|lookup| config.sources.iter().map(move |source| (lookup, source)))
        .collect();
    if jobs.is_empty() {
        return Vec::new();
    }
    let width = config.pool_width(jobs.len());

    let responses: Vec<_> = stream::iter(jobs)
        .map(|(lookup, source)| async move {
            let label = format!("retrieval:{source}");
            let outcome = call_with_retry(&label, config.call_timeout(), &config.retry, || {
                ctx.retrieval.search(source, &lookup.query, lookup.max_results)
            })
            .await;
            (lookup, source, outcome)
        })
        .buffered(width)
        .collect()
        .await;

    let mut documents: Vec<Arc<EvidenceDocument>> = Vec::new();
    for (lookup, source, outcome) in responses {
        let hits = match outcome {
            Ok(hits) => hits,
            Err(e) => {
                warn!(source = source.as_str(), error = %e, "Retrieval source unavailable");
                continue;
            }
        };
        debug!(source = source.as_str(), count = hits.len(), "Retrieved documents");
        for hit in hits.into_iter().take(lookup.max_results) {
            let document = EvidenceDocument::from_retrieved(source, hit);
            let id = document.id.clone();
            ctx.store.insert(document);
            if documents.iter().any(|d| d.id == id) {
                continue;
            }
            match ctx.store.get(&id) {
                Ok(stored) => documents.push(stored),
                Err(e) => warn!(error = %e, "Stored document vanished"),
            }
        }
    }
    documents
}

/// Summarize stored documents in a single batch and turn them into the
/// references the state keeps.
async fn summarize_evidence(
    ctx: &StageContext,
    state: &ClinicalCaseState,
    focus: &str,
    documents: &[Arc<EvidenceDocument>],
) -> Vec<EvidenceRef> {
    if documents.is_empty() {
        return Vec::new();
    }

    let max_chars = ctx.config.summary_fallback_chars;
    let summaries = summarize(ctx, state, focus, documents).await;
    documents
        .iter()
        .map(|document| {
            let generated = summaries.as_ref().and_then(|batch| batch.get(&document.id));
            EvidenceRef {
                document_id: document.id.clone(),
                title: document.title.clone(),
                summary: offload_summary(document, generated, max_chars),
                citation: document.citation.clone(),
            }
        })
        .collect()
}

async fn summarize(
    ctx: &StageContext,
    state: &ClinicalCaseState,
    query: &str,
    documents: &[Arc<EvidenceDocument>],
) -> Option<SummaryBatch> {
    let excerpts = documents
        .iter()
        .map(|d| DocumentExcerpt {
            document_id: d.id.clone(),
            title: d.title.clone(),
            excerpt: truncate_chars(&d.full_text, ctx.config.summary_excerpt_chars),
        })
        .collect();
    let context = PromptContext::for_result::<SummaryBatch>(state)
        .focus(query)
        .documents(excerpts);

    let outcome = call_with_retry(
        "summarize",
        ctx.config.call_timeout(),
        &ctx.config.retry,
        || ctx.reasoning.infer(RequestKind::Summarize, &context),
    )
    .await
    .and_then(parse_structured::<SummaryBatch>);

    match outcome {
        Ok(batch) => Some(batch),
        Err(e) => {
            warn!(error = %e, documents = documents.len(), "Summarization failed, using excerpts");
            None
        }
    }
}

/// The summary a document is known by in the case state.
///
/// Never the document's full text: a generated summary is capped at
/// `max_chars` and dropped if it reproduces the text, and the fallback is a
/// strictly shorter prefix, or the title and citation when the text is too
/// short to abbreviate.
fn offload_summary(document: &EvidenceDocument, generated: Option<&str>, max_chars: usize) -> String {
    let text = document.full_text.trim();
    let keeps_text_out = |summary: &str| text.is_empty() || !summary.contains(text);

    if let Some(summary) = generated.map(|s| abbreviate(s.trim(), max_chars))
        && keeps_text_out(summary.as_str())
    {
        return summary;
    }

    if text.chars().count() > max_chars {
        let prefix = abbreviate(text, max_chars);
        if keeps_text_out(prefix.as_str()) {
            return prefix;
        }
    }

    let reference = format!("{} ({})", document.title.trim(), document.citation.format());
    if keeps_text_out(reference.as_str()) {
        return reference;
    }
    format!("{} document {}", document.citation.source, document.citation.external_id)
}

/// The first `max_chars` characters, with an ellipsis when anything was cut.
fn abbreviate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out = truncate_chars(text, max_chars);
    out.push('…');
    out
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
