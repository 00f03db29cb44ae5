//! Deterministic in-memory gateways for pipeline tests.

#![allow(dead_code)]

use async_trait::async_trait;
use clinflow::{
    Citation, ClinicalCaseState, EngineConfig, GatewayError, PatientProfile, PromptContext,
    ReasoningGateway, RequestKind, RetrievalGateway, RetrievedDocument, RetryPolicy, Sex,
};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// How a stub answers one kind of call.
#[derive(Debug, Clone)]
pub enum Behavior {
    Respond,
    Fail(GatewayError),
    /// Fail with a transient error this many times, then respond
    FailFirst(usize),
    /// Respond with JSON that does not match the expected schema
    Malformed,
    /// Never answer
    Hang,
    /// Answer after a delay
    Delay(Duration),
}

async fn behave(behavior: &Behavior, attempts: usize) -> Result<(), GatewayError> {
    match behavior {
        Behavior::Respond | Behavior::Malformed => Ok(()),
        Behavior::Fail(e) => Err(e.clone()),
        Behavior::FailFirst(n) if attempts < *n => Err(GatewayError::ServiceUnavailable(
            "stub overloaded".to_string(),
        )),
        Behavior::FailFirst(_) => Ok(()),
        Behavior::Hang => {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
        Behavior::Delay(d) => {
            tokio::time::sleep(*d).await;
            Ok(())
        }
    }
}

pub fn differential(entries: &[(&str, f64)]) -> Value {
    let diagnoses: Vec<Value> = entries
        .iter()
        .map(|(condition, probability)| {
            json!({
                "condition": condition,
                "probability": probability,
                "reasoning": format!("{condition} fits the presentation"),
                "typical_symptoms": ["fever"],
                "red_flags": [],
            })
        })
        .collect();
    json!({
        "diagnoses": diagnoses,
        "recommended_tests": ["CBC", "Rapid strep test"],
        "clinical_reasoning": "Stub reasoning",
    })
}

pub struct StubReasoning {
    pub triage: Behavior,
    pub diagnosis: Behavior,
    pub summarize: Behavior,
    pub differential: Value,
    pub triage_level: &'static str,
    calls: Mutex<Vec<RequestKind>>,
}

impl StubReasoning {
    pub fn new() -> Self {
        Self {
            triage: Behavior::Respond,
            diagnosis: Behavior::Respond,
            summarize: Behavior::Respond,
            differential: differential(&[
                ("Streptococcal pharyngitis", 0.6),
                ("Viral pharyngitis", 0.3),
                ("Infectious mononucleosis", 0.1),
            ]),
            triage_level: "urgent",
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn triage(mut self, behavior: Behavior) -> Self {
        self.triage = behavior;
        self
    }

    pub fn diagnosis(mut self, behavior: Behavior) -> Self {
        self.diagnosis = behavior;
        self
    }

    pub fn summarize(mut self, behavior: Behavior) -> Self {
        self.summarize = behavior;
        self
    }

    pub fn differential(mut self, value: Value) -> Self {
        self.differential = value;
        self
    }

    pub fn triage_level(mut self, level: &'static str) -> Self {
        self.triage_level = level;
        self
    }

    pub fn calls(&self) -> Vec<RequestKind> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, kind: RequestKind) -> usize {
        self.calls().iter().filter(|k| **k == kind).count()
    }
}

#[async_trait]
impl ReasoningGateway for StubReasoning {
    async fn infer(
        &self,
        kind: RequestKind,
        context: &PromptContext,
    ) -> Result<Value, GatewayError> {
        let attempts = {
            let mut calls = self.calls.lock().unwrap();
            let attempts = calls.iter().filter(|k| **k == kind).count();
            calls.push(kind);
            attempts
        };
        let behavior = match kind {
            RequestKind::Triage => &self.triage,
            RequestKind::Diagnosis => &self.diagnosis,
            RequestKind::Summarize => &self.summarize,
        };
        behave(behavior, attempts).await?;
        if matches!(behavior, Behavior::Malformed) {
            return Ok(json!({ "unexpected": true }));
        }

        Ok(match kind {
            RequestKind::Triage => json!({
                "level": self.triage_level,
                "assessment": "Febrile illness requiring prompt evaluation",
            }),
            RequestKind::Diagnosis => self.differential.clone(),
            RequestKind::Summarize => {
                let summaries: Vec<Value> = context
                    .documents
                    .iter()
                    .map(|d| {
                        json!({
                            "document_id": d.document_id,
                            "summary": format!("Summary of {}", d.title),
                        })
                    })
                    .collect();
                json!({ "summaries": summaries })
            }
        })
    }
}

pub fn full_text(source: &str, n: usize) -> String {
    format!("Full text of {source} document {n}. ").repeat(20)
}

pub struct StubRetrieval {
    behaviors: HashMap<String, Behavior>,
    pub per_source: usize,
    /// Serve this single document instead of the generated ones
    document: Option<(String, String)>,
    /// Derive external ids from the query, so different queries find
    /// different documents
    scoped: bool,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    queries: Mutex<Vec<String>>,
}

impl StubRetrieval {
    pub fn new() -> Self {
        Self {
            behaviors: HashMap::new(),
            per_source: 2,
            document: None,
            scoped: false,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn source(mut self, id: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(id.to_string(), behavior);
        self
    }

    pub fn document(mut self, external_id: &str, text: &str) -> Self {
        self.document = Some((external_id.to_string(), text.to_string()));
        self
    }

    pub fn scoped_by_query(mut self) -> Self {
        self.scoped = true;
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl RetrievalGateway for StubRetrieval {
    async fn search(
        &self,
        source_id: &str,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<RetrievedDocument>, GatewayError> {
        self.queries.lock().unwrap().push(query.to_string());
        let behavior = self
            .behaviors
            .get(source_id)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownSource(source_id.to_string()))?;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let outcome = behave(&behavior, 0).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome?;

        let citation = |external_id: &str| Citation {
            source: source_id.to_string(),
            year: Some("2024".to_string()),
            external_id: external_id.to_string(),
            url: None,
            authors: vec!["Smith J".to_string()],
        };
        if let Some((external_id, text)) = &self.document {
            return Ok(vec![RetrievedDocument {
                external_id: external_id.clone(),
                title: format!("{source_id} article"),
                full_text: text.clone(),
                citation: citation(external_id),
            }]);
        }

        let scope = if self.scoped {
            let first = query.split_whitespace().next().unwrap_or("query");
            format!("{}-", first.to_lowercase())
        } else {
            String::new()
        };
        Ok((1..=self.per_source.min(max_results))
            .map(|n| {
                let external_id = format!("{source_id}-{scope}{n}");
                RetrievedDocument {
                    title: format!("{source_id} article {n}"),
                    full_text: full_text(source_id, n),
                    citation: citation(&external_id),
                    external_id,
                }
            })
            .collect())
    }
}

pub fn fast_config(sources: &[&str]) -> EngineConfig {
    EngineConfig::default()
        .sources(sources.iter().copied())
        .call_timeout_ms(200)
        .retry(RetryPolicy {
            max_retries: 2,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            multiplier: 2.0,
        })
}

pub fn case(age: i32, complaint: &str, vitals: &[(&str, f64)]) -> ClinicalCaseState {
    let vitals: BTreeMap<String, f64> = vitals.iter().map(|(k, v)| (k.to_string(), *v)).collect();
    ClinicalCaseState::new(PatientProfile::new("P-test", age, Sex::Female), complaint, vec![], vitals)
}
