//! End-to-end pipeline runs against deterministic stub gateways.

mod common;

#[cfg(test)]
mod pipeline_scenarios_tests {
    use super::common::{
        Behavior, StubReasoning, StubRetrieval, case, differential, fast_config, full_text,
    };
    use clinflow::model::{TRIAGE_EMERGENT, TaskKind, TaskStatus, TriageSource};
    use clinflow::{
        AlertTag, ChannelSink, ClinicalCaseState, DocumentId, Engine, EngineConfig, GatewayError,
        PatientProfile, PipelineError, QueryStrategy, RequestKind, Sex, Stage, TriageLevel,
        ValidationError,
    };
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    fn engine(
        reasoning: &Arc<StubReasoning>,
        retrieval: &Arc<StubRetrieval>,
        config: EngineConfig,
    ) -> Engine {
        Engine::builder(reasoning.clone())
            .retrieval(retrieval.clone())
            .config(config)
            .build()
    }

    fn pubmed() -> Arc<StubRetrieval> {
        Arc::new(StubRetrieval::new().source("pubmed", Behavior::Respond))
    }

    #[tokio::test]
    async fn test_pediatric_fever_scenario() {
        let reasoning = Arc::new(StubReasoning::new());
        let retrieval = pubmed();
        let engine = engine(&reasoning, &retrieval, fast_config(&["pubmed"]));

        let report = engine
            .run(case(8, "sore throat and fever", &[("temperature", 38.5)]))
            .await
            .unwrap();

        assert_eq!(report.alert_tags, vec![AlertTag::Pediatric]);
        assert!(!report.requires_human_review);
        assert!(report.review_reasons.is_empty());
        assert_eq!(report.state.diagnoses().len(), 3);
        assert_eq!(report.state.evidence().len(), 2);
        assert_eq!(
            report.state.triage().map(|t| t.level),
            Some(TriageLevel::Urgent)
        );
    }

    #[tokio::test]
    async fn test_geriatric_cardiac_scenario() {
        let reasoning = Arc::new(StubReasoning::new().differential(differential(&[
            ("Acute myocardial infarction", 0.7),
            ("Unstable angina", 0.2),
            ("Aortic dissection", 0.1),
        ])));
        let retrieval = pubmed();
        let engine = engine(&reasoning, &retrieval, fast_config(&["pubmed"]));

        let report = engine
            .run(case(67, "crushing chest pain radiating to left arm", &[]))
            .await
            .unwrap();

        assert!(report.has_alert(AlertTag::Geriatric));
        assert!(report.has_alert(AlertTag::CardiacEmergency));
        assert!(report.requires_human_review);
        assert!(
            report
                .review_reasons
                .contains(&"CARDIAC_EMERGENCY".to_string())
        );
        assert!(
            report
                .state
                .todos()
                .iter()
                .any(|t| t.task == TaskKind::Escalation)
        );
    }

    #[tokio::test]
    async fn test_all_sources_time_out() {
        let reasoning = Arc::new(StubReasoning::new());
        let retrieval = Arc::new(
            StubRetrieval::new()
                .source("pubmed", Behavior::Hang)
                .source("web", Behavior::Hang),
        );
        let config = fast_config(&["pubmed", "web"]).call_timeout_ms(50);
        let engine = engine(&reasoning, &retrieval, config);

        let report = engine
            .run(case(40, "persistent cough", &[]))
            .await
            .unwrap();

        assert!(!report.state.diagnoses().is_empty());
        assert!(report.state.evidence().is_empty());
        assert!(report.has_alert(AlertTag::EvidenceUnavailable));
        assert!(engine.evidence_store().is_empty());
        // nothing to summarize
        assert_eq!(reasoning.count(RequestKind::Summarize), 0);
    }

    #[tokio::test]
    async fn test_partial_evidence_is_kept() {
        let reasoning = Arc::new(StubReasoning::new());
        let retrieval = Arc::new(
            StubRetrieval::new()
                .source("pubmed", Behavior::Respond)
                .source("web", Behavior::Fail(GatewayError::Rejected {
                    status: 403,
                    message: "forbidden".into(),
                })),
        );
        let engine = engine(&reasoning, &retrieval, fast_config(&["pubmed", "web"]));

        let report = engine.run(case(40, "persistent cough", &[])).await.unwrap();

        assert_eq!(report.state.evidence().len(), 2);
        assert!(!report.has_alert(AlertTag::EvidenceUnavailable));
    }

    #[tokio::test]
    async fn test_no_sources_means_no_evidence_alert() {
        let reasoning = Arc::new(StubReasoning::new());
        let retrieval = Arc::new(StubRetrieval::new());
        let engine = engine(&reasoning, &retrieval, fast_config(&[]));

        let report = engine.run(case(40, "persistent cough", &[])).await.unwrap();

        assert!(report.state.evidence().is_empty());
        assert!(!report.has_alert(AlertTag::EvidenceUnavailable));
    }

    #[tokio::test]
    async fn test_runs_are_idempotent() {
        let reasoning = Arc::new(StubReasoning::new().differential(differential(&[
            ("A", 0.3),
            ("B", 0.5),
            ("C", 0.3),
        ])));
        let retrieval = pubmed();
        let engine = engine(&reasoning, &retrieval, fast_config(&["pubmed"]));

        let first = engine.run(case(70, "dizziness", &[])).await.unwrap();
        let second = engine.run(case(70, "dizziness", &[])).await.unwrap();

        let conditions = |r: &clinflow::FinalReport| -> Vec<String> {
            r.state.diagnoses().iter().map(|d| d.condition.clone()).collect()
        };
        assert_eq!(conditions(&first), vec!["B", "A", "C"]);
        assert_eq!(conditions(&first), conditions(&second));
        assert_eq!(first.alert_tags, second.alert_tags);
        assert_eq!(first.state.evidence(), second.state.evidence());
        assert_ne!(first.run_id, second.run_id);
    }

    #[tokio::test]
    async fn test_age_alerts_hold_for_all_ages() {
        let reasoning = Arc::new(StubReasoning::new());
        let retrieval = pubmed();
        let engine = engine(&reasoning, &retrieval, fast_config(&["pubmed"]));

        for age in [0, 1, 8, 17] {
            let report = engine.run(case(age, "rash", &[])).await.unwrap();
            assert!(report.has_alert(AlertTag::Pediatric), "age {age}");
            assert!(!report.has_alert(AlertTag::Geriatric), "age {age}");
        }
        for age in [65, 80, 104] {
            let report = engine.run(case(age, "rash", &[])).await.unwrap();
            assert!(report.has_alert(AlertTag::Geriatric), "age {age}");
        }
        let report = engine.run(case(18, "rash", &[])).await.unwrap();
        assert!(report.alert_tags.is_empty());
    }

    #[tokio::test]
    async fn test_state_holds_no_full_text() {
        let reasoning = Arc::new(StubReasoning::new());
        let retrieval = pubmed();
        let engine = engine(&reasoning, &retrieval, fast_config(&["pubmed"]));

        let report = engine.run(case(40, "back pain", &[])).await.unwrap();

        let serialized = serde_json::to_string(&report).unwrap();
        for n in 1..=2 {
            let id = DocumentId::new("pubmed", &format!("pubmed-{n}"));
            let stored = engine.evidence_store().get(&id).unwrap();
            assert_eq!(stored.full_text, full_text("pubmed", n));
            assert!(!serialized.contains(&stored.full_text));
        }
        let summaries: Vec<&str> = report
            .state
            .evidence()
            .iter()
            .map(|e| e.summary.as_str())
            .collect();
        assert_eq!(
            summaries,
            vec!["Summary of pubmed article 1", "Summary of pubmed article 2"]
        );
    }

    #[tokio::test]
    async fn test_summaries_are_batched() {
        let reasoning = Arc::new(StubReasoning::new());
        let retrieval = Arc::new(
            StubRetrieval::new()
                .source("pubmed", Behavior::Respond)
                .source("web", Behavior::Respond),
        );
        let engine = engine(&reasoning, &retrieval, fast_config(&["pubmed", "web"]));

        let report = engine.run(case(40, "back pain", &[])).await.unwrap();

        assert_eq!(report.state.evidence().len(), 4);
        assert_eq!(reasoning.count(RequestKind::Summarize), 1);
    }

    #[tokio::test]
    async fn test_summary_failure_falls_back_to_excerpt() {
        let reasoning = Arc::new(StubReasoning::new().summarize(Behavior::Malformed));
        let retrieval = pubmed();
        let engine = engine(&reasoning, &retrieval, fast_config(&["pubmed"]));

        let report = engine.run(case(40, "back pain", &[])).await.unwrap();

        let prefix: String = full_text("pubmed", 1).trim().chars().take(200).collect();
        assert_eq!(report.state.evidence()[0].summary, format!("{prefix}…"));
        assert!(!report.has_alert(AlertTag::EvidenceUnavailable));
    }

    #[tokio::test]
    async fn test_short_document_never_lands_in_state() {
        let text = "Strep pharyngitis: treat with amoxicillin for 10 days.";
        let reasoning = Arc::new(StubReasoning::new().summarize(Behavior::Malformed));
        let retrieval = Arc::new(
            StubRetrieval::new()
                .source("pubmed", Behavior::Respond)
                .document("31", text),
        );
        let engine = engine(&reasoning, &retrieval, fast_config(&["pubmed"]));

        let report = engine.run(case(30, "sore throat", &[])).await.unwrap();

        let stored = engine
            .evidence_store()
            .get(&DocumentId::new("pubmed", "31"))
            .unwrap();
        assert_eq!(stored.full_text, text);
        let reference = &report.state.evidence()[0];
        assert_ne!(reference.summary, stored.full_text);
        assert!(!reference.summary.contains(text));
        assert!(!serde_json::to_string(&report).unwrap().contains(text));
    }

    #[tokio::test]
    async fn test_malformed_diagnosis_forces_review() {
        let reasoning = Arc::new(StubReasoning::new().diagnosis(Behavior::Malformed));
        let retrieval = pubmed();
        let engine = engine(&reasoning, &retrieval, fast_config(&["pubmed"]));

        let report = engine.run(case(40, "fatigue", &[])).await.unwrap();

        assert!(report.state.diagnoses().is_empty());
        assert!(report.has_alert(AlertTag::InsufficientAnalysis));
        assert!(report.requires_human_review);
        assert!(
            report
                .review_reasons
                .contains(&"INSUFFICIENT_ANALYSIS".to_string())
        );
        // malformed output is not retried
        assert_eq!(reasoning.count(RequestKind::Diagnosis), 1);
    }

    #[tokio::test]
    async fn test_out_of_range_probability_is_malformed() {
        let reasoning = Arc::new(
            StubReasoning::new().differential(differential(&[("A", 1.4), ("B", 0.2)])),
        );
        let retrieval = pubmed();
        let engine = engine(&reasoning, &retrieval, fast_config(&["pubmed"]));

        let report = engine.run(case(40, "fatigue", &[])).await.unwrap();

        assert!(report.state.diagnoses().is_empty());
        assert!(report.has_alert(AlertTag::InsufficientAnalysis));
    }

    #[tokio::test]
    async fn test_transient_diagnosis_errors_are_retried() {
        let reasoning = Arc::new(StubReasoning::new().diagnosis(Behavior::FailFirst(2)));
        let retrieval = pubmed();
        let engine = engine(&reasoning, &retrieval, fast_config(&["pubmed"]));

        let report = engine.run(case(40, "fatigue", &[])).await.unwrap();

        assert_eq!(report.state.diagnoses().len(), 3);
        assert!(!report.has_alert(AlertTag::InsufficientAnalysis));
        assert_eq!(reasoning.count(RequestKind::Diagnosis), 3);
    }

    #[tokio::test]
    async fn test_triage_falls_back_to_heuristic() {
        let reasoning = Arc::new(
            StubReasoning::new().triage(Behavior::Fail(GatewayError::Rejected {
                status: 400,
                message: "bad request".into(),
            })),
        );
        let retrieval = pubmed();
        let engine = engine(&reasoning, &retrieval, fast_config(&["pubmed"]));

        let report = engine
            .run(case(30, "fever", &[("temperature", 39.2), ("spo2", 88.0)]))
            .await
            .unwrap();

        let triage = report.state.triage().unwrap();
        assert_eq!(triage.source, TriageSource::Heuristic);
        assert_eq!(triage.level, TriageLevel::Emergent);
        assert!(!report.has_alert(AlertTag::InsufficientAnalysis));
        assert!(report.requires_human_review);
        assert!(report.review_reasons.contains(&TRIAGE_EMERGENT.to_string()));
    }

    #[tokio::test]
    async fn test_emergent_triage_forces_review_without_red_flags() {
        let reasoning = Arc::new(StubReasoning::new().triage_level("emergent"));
        let retrieval = pubmed();
        let engine = engine(&reasoning, &retrieval, fast_config(&["pubmed"]));

        let report = engine.run(case(40, "feeling unwell", &[])).await.unwrap();

        assert_eq!(
            report.state.triage().map(|t| t.source),
            Some(TriageSource::Reasoning)
        );
        assert!(report.alert_tags.is_empty());
        assert!(report.requires_human_review);
        assert_eq!(report.review_reasons, vec![TRIAGE_EMERGENT.to_string()]);
        assert!(
            report
                .state
                .todos()
                .iter()
                .any(|t| t.task == TaskKind::Escalation)
        );
    }

    #[tokio::test]
    async fn test_invalid_case_never_reaches_stages() {
        let reasoning = Arc::new(StubReasoning::new());
        let retrieval = pubmed();
        let engine = engine(&reasoning, &retrieval, fast_config(&["pubmed"]));

        let err = engine.run(case(-1, "cough", &[])).await.unwrap_err();
        assert_eq!(err, PipelineError::Validation(ValidationError::Age(-1)));

        let err = engine.run(case(30, "   ", &[])).await.unwrap_err();
        assert_eq!(
            err,
            PipelineError::Validation(ValidationError::Empty("chief_complaint"))
        );

        let patient = PatientProfile::new("P1", 30, Sex::Male).weight_kg(-70.0);
        let err = engine
            .run(ClinicalCaseState::new(patient, "cough", vec![], BTreeMap::new()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Validation(ValidationError::Measurement { field: "weight_kg", .. })
        ));

        assert!(reasoning.calls().is_empty());
        assert!(retrieval.queries().is_empty());
    }

    #[tokio::test]
    async fn test_deadline_cancels_run() {
        let reasoning = Arc::new(StubReasoning::new().diagnosis(Behavior::Hang));
        let retrieval = pubmed();
        let config = fast_config(&["pubmed"]).call_timeout_ms(60_000);
        let engine = engine(&reasoning, &retrieval, config);

        let err = engine
            .run_with_deadline(case(40, "cough", &[]), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert_eq!(err, PipelineError::Cancelled);

        // whatever was stored before cancellation is complete
        for n in 1..=2 {
            let id = DocumentId::new("pubmed", &format!("pubmed-{n}"));
            if let Ok(doc) = engine.evidence_store().get(&id) {
                assert_eq!(doc.full_text, full_text("pubmed", n));
            }
        }
    }

    #[tokio::test]
    async fn test_prepopulated_output_is_rejected_before_stages() {
        let reasoning = Arc::new(StubReasoning::new());
        let retrieval = pubmed();
        let engine = engine(&reasoning, &retrieval, fast_config(&["pubmed"]));

        let mut value = serde_json::to_value(case(50, "chest pain", &[])).unwrap();
        value["alerts"] = serde_json::json!([{
            "tag": "CARDIAC_EMERGENCY",
            "severity": "EMERGENCY",
            "message": "CARDIAC EMERGENCY: crushing chest pain",
        }]);
        let state: ClinicalCaseState = serde_json::from_value(value).unwrap();

        let err = engine.run(state).await.unwrap_err();
        assert_eq!(
            err,
            PipelineError::Validation(ValidationError::PrepopulatedOutput("alerts"))
        );

        let mut value = serde_json::to_value(case(50, "chest pain", &[])).unwrap();
        value["requires_human_review"] = serde_json::json!(true);
        let state: ClinicalCaseState = serde_json::from_value(value).unwrap();
        let err = engine.run(state).await.unwrap_err();
        assert_eq!(
            err,
            PipelineError::Validation(ValidationError::PrepopulatedOutput(
                "requires_human_review"
            ))
        );

        assert!(reasoning.calls().is_empty());
        assert!(retrieval.queries().is_empty());
    }

    #[tokio::test]
    async fn test_pediatric_complexity_forces_review() {
        let reasoning = Arc::new(StubReasoning::new());
        let retrieval = pubmed();
        let engine = engine(&reasoning, &retrieval, fast_config(&["pubmed"]));

        let patient = PatientProfile::new("P1", 12, Sex::Male)
            .chronic_condition("Asthma")
            .chronic_condition("Type 1 diabetes")
            .chronic_condition("Epilepsy");
        let state = ClinicalCaseState::new(patient, "wheezing", vec![], BTreeMap::new());

        let report = engine.run(state).await.unwrap();

        assert!(report.has_alert(AlertTag::Pediatric));
        assert!(report.has_alert(AlertTag::MedicationReview));
        assert!(report.requires_human_review);
        assert!(report.review_reasons.contains(&"PEDIATRIC".to_string()));
        assert!(report.review_reasons.contains(&"MEDICATION_REVIEW".to_string()));
    }

    #[tokio::test]
    async fn test_retrieval_pool_is_bounded() {
        let sources = ["s1", "s2", "s3", "s4", "s5", "s6"];
        let mut stub = StubRetrieval::new();
        for source in sources {
            stub = stub.source(source, Behavior::Delay(Duration::from_millis(30)));
        }
        let retrieval = Arc::new(stub);
        let reasoning = Arc::new(StubReasoning::new());
        let config = fast_config(&sources).max_concurrency(2);
        let engine = engine(&reasoning, &retrieval, config);

        let report = engine.run(case(40, "cough", &[])).await.unwrap();

        assert_eq!(report.state.evidence().len(), 12);
        assert!(retrieval.max_in_flight() <= 2);
        assert!(retrieval.max_in_flight() >= 1);
    }

    #[tokio::test]
    async fn test_top_diagnosis_query_strategy() {
        let reasoning = Arc::new(StubReasoning::new());
        let retrieval = pubmed();
        let config = fast_config(&["pubmed"]).query_strategy(QueryStrategy::TopDiagnosis);
        let engine = engine(&reasoning, &retrieval, config);

        engine.run(case(30, "sore throat", &[])).await.unwrap();

        assert_eq!(
            retrieval.queries(),
            vec!["Streptococcal pharyngitis diagnosis and management".to_string()]
        );
    }

    #[tokio::test]
    async fn test_deep_research_follows_up_on_uncertain_differential() {
        let reasoning = Arc::new(StubReasoning::new());
        let retrieval = Arc::new(
            StubRetrieval::new()
                .source("pubmed", Behavior::Respond)
                .scoped_by_query(),
        );
        let config = fast_config(&["pubmed"]).query_strategy(QueryStrategy::DeepResearch);
        let engine = engine(&reasoning, &retrieval, config);

        let report = engine.run(case(30, "sore throat", &[])).await.unwrap();

        let mut queries = retrieval.queries();
        queries.sort();
        assert_eq!(
            queries,
            vec![
                "Infectious mononucleosis clinical presentation and diagnosis".to_string(),
                "Streptococcal pharyngitis clinical presentation and diagnosis".to_string(),
                "Viral pharyngitis clinical presentation and diagnosis".to_string(),
                "sore throat".to_string(),
            ]
        );
        // two from the complaint, two per researched condition
        assert_eq!(report.state.evidence().len(), 8);
        assert_eq!(engine.evidence_store().len(), 8);
        assert_eq!(reasoning.count(RequestKind::Summarize), 1);
        assert!(report.state.evidence().iter().any(|e| {
            e.document_id == DocumentId::new("pubmed", "pubmed-streptococcal-1")
        }));
    }

    #[tokio::test]
    async fn test_deep_research_skipped_for_confident_differential() {
        let reasoning = Arc::new(
            StubReasoning::new().differential(differential(&[("Acute otitis media", 0.9)])),
        );
        let retrieval = Arc::new(
            StubRetrieval::new()
                .source("pubmed", Behavior::Respond)
                .scoped_by_query(),
        );
        let config = fast_config(&["pubmed"]).query_strategy(QueryStrategy::DeepResearch);
        let engine = engine(&reasoning, &retrieval, config);

        let report = engine.run(case(30, "ear pain", &[])).await.unwrap();

        assert_eq!(retrieval.queries(), vec!["ear pain".to_string()]);
        assert_eq!(report.state.evidence().len(), 2);
    }

    #[tokio::test]
    async fn test_zero_diagnosis_limit_keeps_top_diagnosis() {
        let reasoning = Arc::new(StubReasoning::new());
        let retrieval = pubmed();
        let config: EngineConfig = serde_json::from_str(r#"{"max_diagnoses": 0}"#).unwrap();
        let config = EngineConfig {
            max_diagnoses: config.max_diagnoses,
            ..fast_config(&["pubmed"])
        };
        let engine = engine(&reasoning, &retrieval, config);

        let report = engine.run(case(30, "sore throat", &[])).await.unwrap();

        let conditions: Vec<&str> = report
            .state
            .diagnoses()
            .iter()
            .map(|d| d.condition.as_str())
            .collect();
        assert_eq!(conditions, vec!["Streptococcal pharyngitis"]);
        assert!(!report.has_alert(AlertTag::InsufficientAnalysis));
    }

    #[tokio::test]
    async fn test_stage_records_and_tasks() {
        let reasoning = Arc::new(StubReasoning::new());
        let retrieval = pubmed();
        let (sink, mut records) = ChannelSink::new(16);
        let engine = Engine::builder(reasoning.clone())
            .retrieval(retrieval.clone())
            .sink(Arc::new(sink))
            .config(fast_config(&["pubmed"]))
            .build();

        let report = engine.run(case(30, "sore throat", &[])).await.unwrap();

        let mut stages = Vec::new();
        while let Ok(record) = records.try_recv() {
            assert_eq!(record.run_id, report.run_id);
            stages.push(record.stage);
        }
        assert_eq!(stages, Stage::ORDER.to_vec());

        let analysis = report
            .state
            .todos()
            .iter()
            .find(|t| t.task == TaskKind::SymptomAnalysis)
            .unwrap();
        assert_eq!(analysis.status, TaskStatus::Completed);
        assert_eq!(report.state.confidence().get("diagnosis"), Some(&0.6));
        assert_eq!(report.version, env!("CARGO_PKG_VERSION"));
    }
}
