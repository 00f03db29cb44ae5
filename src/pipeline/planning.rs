use crate::model::{
    AlertTag, ClinicalCaseState, SafetyAlert, StateDelta, TaskKind, TaskPriority, Todo,
    TriageLevel,
};
use crate::redflag::RedFlagDetector;

/// Build the ordered task list for a case.
///
/// Complexity is judged from the alerts already on the state together with
/// what the detector would raise now. Detected alerts are only consulted
/// here, not merged; merging is left to the analysis and safety stages.
pub fn plan(detector: &RedFlagDetector, state: &ClinicalCaseState) -> StateDelta {
    let mut alerts: Vec<SafetyAlert> = state.alerts().to_vec();
    for alert in detector.detect(state) {
        if !alerts.iter().any(|a| a.tag == alert.tag) {
            alerts.push(alert);
        }
    }
    let level = state.triage().map(|t| t.level).unwrap_or(TriageLevel::Routine);
    let patient = state.patient();

    let mut todos = vec![Todo::pending(
        TaskKind::SymptomAnalysis,
        format!(
            "Analyze {} reported symptom(s) and generate a differential diagnosis",
            state.symptoms().len()
        ),
        TaskPriority::High,
    )];

    if !patient.current_medications.is_empty()
        || alerts.iter().any(|a| a.tag == AlertTag::MedicationReview)
    {
        todos.push(Todo::pending(
            TaskKind::MedicationReview,
            format!(
                "Check drug interactions for {} current medication(s)",
                patient.current_medications.len()
            ),
            TaskPriority::High,
        ));
    }

    todos.push(Todo::pending(
        TaskKind::LiteratureSearch,
        format!("Search literature for: {}", state.chief_complaint()),
        TaskPriority::Medium,
    ));

    if level >= TriageLevel::Urgent {
        todos.push(Todo::pending(
            TaskKind::ConfirmatoryTests,
            format!("Order confirmatory tests ({level} triage)"),
            TaskPriority::High,
        ));
    }

    if level == TriageLevel::Emergent || alerts.iter().any(SafetyAlert::is_emergency) {
        todos.push(Todo::pending(
            TaskKind::Escalation,
            "Escalate to a clinician immediately",
            TaskPriority::Urgent,
        ));
    }

    if !alerts.is_empty() {
        let tags: Vec<&str> = alerts.iter().map(|a| a.tag.as_str()).collect();
        todos.push(Todo::pending(
            TaskKind::AlertReview,
            format!("Review safety alerts: {}", tags.join(", ")),
            TaskPriority::Medium,
        ));
    }

    StateDelta {
        todos,
        ..StateDelta::default()
    }
}
