use serde::{Deserialize, Serialize};

use crate::model::AlertTag;

/// One family of emergency presentations, matched by keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyFamily {
    pub tag: AlertTag,
    /// Human-readable family name used in alert messages
    pub label: String,
    /// Only evaluated for pediatric patients
    #[serde(default)]
    pub pediatric_only: bool,
    /// Case-insensitive substrings that indicate the emergency
    pub terms: Vec<String>,
}

impl EmergencyFamily {
    fn new(tag: AlertTag, label: &str, pediatric_only: bool, terms: &[&str]) -> Self {
        Self {
            tag,
            label: label.to_string(),
            pediatric_only,
            terms: terms.iter().map(|t| t.to_string()).collect(),
        }
    }
}

/// Keyword sets and thresholds driving the red-flag detector.
///
/// Kept as data so hosts can extend the term lists without touching the
/// detector. `Default` holds the curated sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedFlagRules {
    pub pediatric_age_below: i32,
    pub geriatric_age_from: i32,
    pub chronic_condition_threshold: usize,
    pub medication_threshold: usize,
    pub families: Vec<EmergencyFamily>,
}

impl Default for RedFlagRules {
    fn default() -> Self {
        Self {
            pediatric_age_below: 18,
            geriatric_age_from: 65,
            chronic_condition_threshold: 3,
            medication_threshold: 5,
            families: vec![
                EmergencyFamily::new(
                    AlertTag::CardiacEmergency,
                    "CARDIAC",
                    false,
                    &[
                        "crushing chest pain",
                        "radiating to left arm",
                        "severe shortness of breath with chest pain",
                        "syncope with chest pain",
                    ],
                ),
                EmergencyFamily::new(
                    AlertTag::NeurologicEmergency,
                    "NEUROLOGIC",
                    false,
                    &[
                        "worst headache of life",
                        "sudden severe headache",
                        "neck stiffness with fever",
                        "altered mental status",
                        "new onset seizure",
                        "focal neurological deficit",
                    ],
                ),
                EmergencyFamily::new(
                    AlertTag::RespiratoryEmergency,
                    "RESPIRATORY",
                    false,
                    &[
                        "severe respiratory distress",
                        "cyanosis",
                        "stridor",
                        "inability to speak in full sentences",
                    ],
                ),
                EmergencyFamily::new(
                    AlertTag::GiEmergency,
                    "GI",
                    false,
                    &[
                        "severe abdominal pain with rigidity",
                        "hematemesis",
                        "bright red blood per rectum with hypotension",
                    ],
                ),
                EmergencyFamily::new(
                    AlertTag::PediatricEmergency,
                    "PEDIATRIC",
                    true,
                    &[
                        "inconsolable crying in infant",
                        "lethargy in child",
                        "difficulty breathing in child",
                    ],
                ),
            ],
        }
    }
}

impl RedFlagRules {
    /// Load rules from JSON. Missing fields take their default values.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Add a term to the family with the given tag, if that family exists.
    pub fn with_term(mut self, tag: AlertTag, term: impl Into<String>) -> Self {
        if let Some(family) = self.families.iter_mut().find(|f| f.tag == tag) {
            family.terms.push(term.into());
        }
        self
    }
}
