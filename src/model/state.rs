use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::model::{
    AlertTag, Diagnosis, EvidenceRef, PatientProfile, SafetyAlert, Symptom, TaskKind, TaskStatus,
    Todo, TriageAssessment, TriageLevel,
};

/// Review reason recorded when triage classifies a case as emergent.
pub const TRIAGE_EMERGENT: &str = "TRIAGE_EMERGENT";

/// Everything known about one case as it moves through the pipeline.
///
/// Input fields are fixed at construction. Output fields only change through
/// [`ClinicalCaseState::apply`], which merges a [`StateDelta`] produced by a
/// stage. Alerts, evidence and todos are append-only, and the review flag
/// can only go from `false` to `true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalCaseState {
    #[serde(default = "Uuid::new_v4")]
    run_id: Uuid,
    patient: PatientProfile,
    chief_complaint: String,
    #[serde(default)]
    symptoms: Vec<Symptom>,
    #[serde(default)]
    vital_signs: BTreeMap<String, f64>,

    #[serde(default)]
    triage: Option<TriageAssessment>,
    #[serde(default)]
    todos: Vec<Todo>,
    #[serde(default)]
    diagnoses: Vec<Diagnosis>,
    #[serde(default)]
    recommended_tests: Vec<String>,
    #[serde(default)]
    confidence: BTreeMap<String, f64>,
    #[serde(default)]
    evidence: Vec<EvidenceRef>,
    #[serde(default)]
    alerts: Vec<SafetyAlert>,
    #[serde(default)]
    requires_human_review: bool,
    #[serde(default)]
    review_reasons: Vec<String>,
}

impl ClinicalCaseState {
    pub fn new(
        patient: PatientProfile,
        chief_complaint: impl Into<String>,
        symptoms: Vec<Symptom>,
        vital_signs: BTreeMap<String, f64>,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            patient,
            chief_complaint: chief_complaint.into(),
            symptoms,
            vital_signs,
            triage: None,
            todos: Vec::new(),
            diagnoses: Vec::new(),
            recommended_tests: Vec::new(),
            confidence: BTreeMap::new(),
            evidence: Vec::new(),
            alerts: Vec::new(),
            requires_human_review: false,
            review_reasons: Vec::new(),
        }
    }

    /// Check the case input before it is allowed into the pipeline.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.patient.validate()?;
        if self.chief_complaint.trim().is_empty() {
            return Err(ValidationError::Empty("chief_complaint"));
        }
        if self.symptoms.iter().any(|s| s.description.trim().is_empty()) {
            return Err(ValidationError::Empty("symptom description"));
        }
        if let Some((name, value)) = self.vital_signs.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ValidationError::VitalSign {
                name: name.clone(),
                value: *value,
            });
        }
        if let Some(field) = self.prepopulated_output() {
            return Err(ValidationError::PrepopulatedOutput(field));
        }
        Ok(())
    }

    /// First output field that is not in its initial state.
    fn prepopulated_output(&self) -> Option<&'static str> {
        let filled = [
            ("triage", self.triage.is_some()),
            ("todos", !self.todos.is_empty()),
            ("diagnoses", !self.diagnoses.is_empty()),
            ("recommended_tests", !self.recommended_tests.is_empty()),
            ("confidence", !self.confidence.is_empty()),
            ("evidence", !self.evidence.is_empty()),
            ("alerts", !self.alerts.is_empty()),
            ("requires_human_review", self.requires_human_review),
            ("review_reasons", !self.review_reasons.is_empty()),
        ];
        filled
            .into_iter()
            .find(|(_, filled)| *filled)
            .map(|(field, _)| field)
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn patient(&self) -> &PatientProfile {
        &self.patient
    }

    pub fn chief_complaint(&self) -> &str {
        &self.chief_complaint
    }

    pub fn symptoms(&self) -> &[Symptom] {
        &self.symptoms
    }

    pub fn vital_signs(&self) -> &BTreeMap<String, f64> {
        &self.vital_signs
    }

    /// First reading found under any of the given names.
    pub fn vital(&self, names: &[&str]) -> Option<f64> {
        names.iter().find_map(|n| self.vital_signs.get(*n).copied())
    }

    pub fn triage(&self) -> Option<&TriageAssessment> {
        self.triage.as_ref()
    }

    pub fn todos(&self) -> &[Todo] {
        &self.todos
    }

    pub fn diagnoses(&self) -> &[Diagnosis] {
        &self.diagnoses
    }

    pub fn recommended_tests(&self) -> &[String] {
        &self.recommended_tests
    }

    pub fn confidence(&self) -> &BTreeMap<String, f64> {
        &self.confidence
    }

    pub fn evidence(&self) -> &[EvidenceRef] {
        &self.evidence
    }

    pub fn alerts(&self) -> &[SafetyAlert] {
        &self.alerts
    }

    pub fn has_alert(&self, tag: AlertTag) -> bool {
        self.alerts.iter().any(|a| a.tag == tag)
    }

    pub fn requires_human_review(&self) -> bool {
        self.requires_human_review
    }

    pub fn review_reasons(&self) -> &[String] {
        &self.review_reasons
    }

    /// Merge a stage's output into the state.
    ///
    /// Only alerts that were not present before are considered for the
    /// review rules, so an inconsistency that predates this merge is left in
    /// place for the safety validation stage to report.
    pub fn apply(mut self, delta: StateDelta) -> Self {
        if let Some(triage) = delta.triage {
            if triage.level == TriageLevel::Emergent {
                self.flag_for_review(TRIAGE_EMERGENT);
            }
            self.triage = Some(triage);
        }

        self.todos.extend(delta.todos);
        for task in delta.completed_tasks {
            for todo in self.todos.iter_mut().filter(|t| t.task == task) {
                todo.status = TaskStatus::Completed;
            }
        }

        if let Some(diagnoses) = delta.diagnoses {
            self.diagnoses = diagnoses;
        }
        for test in delta.recommended_tests {
            if !self.recommended_tests.contains(&test) {
                self.recommended_tests.push(test);
            }
        }
        self.confidence.extend(delta.confidence);

        for reference in delta.evidence {
            if !self
                .evidence
                .iter()
                .any(|e| e.document_id == reference.document_id)
            {
                self.evidence.push(reference);
            }
        }

        let mut added = Vec::new();
        for alert in delta.alerts {
            if self.has_alert(alert.tag) {
                continue;
            }
            added.push(alert.tag);
            self.alerts.push(alert);
        }
        self.enforce_review_rules(&added);

        self
    }

    fn enforce_review_rules(&mut self, added: &[AlertTag]) {
        let forcing: Vec<AlertTag> = self
            .alerts
            .iter()
            .filter(|a| added.contains(&a.tag) && a.forces_review())
            .map(|a| a.tag)
            .collect();
        for tag in forcing {
            self.flag_for_review(tag.as_str());
        }

        let combination = [AlertTag::Pediatric, AlertTag::MedicationReview];
        if combination.iter().any(|t| added.contains(t))
            && combination.iter().all(|t| self.has_alert(*t))
        {
            for tag in combination {
                self.flag_for_review(tag.as_str());
            }
        }
    }

    fn flag_for_review(&mut self, reason: &str) {
        if !self.requires_human_review {
            debug!(run_id = %self.run_id, reason, "Case flagged for human review");
        }
        self.requires_human_review = true;
        if !self.review_reasons.iter().any(|r| r == reason) {
            self.review_reasons.push(reason.to_string());
        }
    }
}

/// Output of a single stage, merged into the state by the engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateDelta {
    pub triage: Option<TriageAssessment>,
    pub todos: Vec<Todo>,
    pub completed_tasks: Vec<TaskKind>,
    pub diagnoses: Option<Vec<Diagnosis>>,
    pub recommended_tests: Vec<String>,
    pub confidence: BTreeMap<String, f64>,
    pub evidence: Vec<EvidenceRef>,
    pub alerts: Vec<SafetyAlert>,
}

impl StateDelta {
    pub fn is_empty(&self) -> bool {
        *self == StateDelta::default()
    }

    pub fn alert(mut self, alert: SafetyAlert) -> Self {
        self.alerts.push(alert);
        self
    }

    pub fn alerts(mut self, alerts: impl IntoIterator<Item = SafetyAlert>) -> Self {
        self.alerts.extend(alerts);
        self
    }
}
