use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One candidate condition in a differential diagnosis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub condition: String,
    /// Likelihood estimate in [0, 1]
    pub probability: f64,
    pub reasoning: String,
    #[serde(default)]
    pub typical_symptoms: BTreeSet<String>,
    /// Warning signs associated with the condition
    #[serde(default)]
    pub red_flags: BTreeSet<String>,
    /// ICD-10 code when the reasoning service supplies one
    #[serde(default)]
    pub classification_code: Option<String>,
}

/// Sort a differential by probability, highest first.
///
/// The sort is stable: candidates with equal probability keep the order in
/// which the reasoning service generated them. The list is then cut to at
/// most `limit` entries.
pub fn rank_diagnoses(mut diagnoses: Vec<Diagnosis>, limit: usize) -> Vec<Diagnosis> {
    diagnoses.sort_by(|a, b| b.probability.total_cmp(&a.probability));
    diagnoses.truncate(limit);
    diagnoses
}
