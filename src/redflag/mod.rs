//! Red-flag detection: demographic and keyword rules that classify a case
//! against emergency patterns.

mod rules;
pub use rules::{EmergencyFamily, RedFlagRules};

use tracing::debug;

use crate::model::{AlertSeverity, AlertTag, ClinicalCaseState, SafetyAlert};

/// Pure classifier from case state to safety alerts.
///
/// Every rule family is evaluated on every call (no early exit), so several
/// alerts can fire together. The output holds at most one alert per tag, in
/// a fixed order: age, complexity, then emergency families in rule order.
/// Detection has no side effects and can be re-run on any state.
#[derive(Debug, Clone, Default)]
pub struct RedFlagDetector {
    rules: RedFlagRules,
}

impl RedFlagDetector {
    pub fn new(rules: RedFlagRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RedFlagRules {
        &self.rules
    }

    pub fn detect(&self, state: &ClinicalCaseState) -> Vec<SafetyAlert> {
        let rules = &self.rules;
        let patient = state.patient();
        let pediatric = patient.age < rules.pediatric_age_below;
        let mut alerts = Vec::new();

        if pediatric {
            alerts.push(SafetyAlert::new(
                AlertTag::Pediatric,
                AlertSeverity::Warning,
                format!(
                    "PEDIATRIC PATIENT (age {}) - age-appropriate dosing required",
                    patient.age
                ),
            ));
        }
        if patient.age >= rules.geriatric_age_from {
            alerts.push(SafetyAlert::new(
                AlertTag::Geriatric,
                AlertSeverity::Warning,
                format!(
                    "GERIATRIC PATIENT (age {}) - consider reduced dosing and drug interactions",
                    patient.age
                ),
            ));
        }

        let conditions = patient.chronic_conditions.len();
        let medications = patient.current_medications.len();
        if conditions >= rules.chronic_condition_threshold
            || medications >= rules.medication_threshold
        {
            alerts.push(SafetyAlert::new(
                AlertTag::MedicationReview,
                AlertSeverity::Warning,
                format!(
                    "COMPLEX HISTORY ({conditions} chronic conditions, {medications} medications) - medication review required"
                ),
            ));
        }

        let texts = scan_texts(state);
        for family in &rules.families {
            if family.pediatric_only && !pediatric {
                continue;
            }
            let matched: Vec<&str> = family
                .terms
                .iter()
                .filter(|term| {
                    let term = term.to_lowercase();
                    !term.is_empty() && texts.iter().any(|t| t.contains(&term))
                })
                .map(String::as_str)
                .collect();
            if matched.is_empty() || alerts.iter().any(|a| a.tag == family.tag) {
                continue;
            }
            alerts.push(SafetyAlert::new(
                family.tag,
                AlertSeverity::Emergency,
                format!("{} EMERGENCY: {}", family.label, matched.join(", ")),
            ));
        }

        debug!(
            run_id = %state.run_id(),
            alerts = alerts.len(),
            "Red-flag detection complete"
        );
        alerts
    }
}

/// Lower-cased free text of the case: complaint, symptom details and the
/// red flags attached to any diagnosis.
fn scan_texts(state: &ClinicalCaseState) -> Vec<String> {
    std::iter::once(state.chief_complaint())
        .chain(state.symptoms().iter().flat_map(|s| s.texts()))
        .chain(
            state
                .diagnoses()
                .iter()
                .flat_map(|d| d.red_flags.iter().map(String::as_str)),
        )
        .map(str::to_lowercase)
        .collect()
}
