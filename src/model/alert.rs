use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine-readable category of a safety alert.
///
/// Serialized in SCREAMING_SNAKE_CASE (`CARDIAC_EMERGENCY`, `PEDIATRIC`, ...),
/// which is also the form appended to a case's review reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertTag {
    Pediatric,
    Geriatric,
    MedicationReview,
    CardiacEmergency,
    NeurologicEmergency,
    RespiratoryEmergency,
    GiEmergency,
    PediatricEmergency,
    InsufficientAnalysis,
    EvidenceUnavailable,
}

impl AlertTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertTag::Pediatric => "PEDIATRIC",
            AlertTag::Geriatric => "GERIATRIC",
            AlertTag::MedicationReview => "MEDICATION_REVIEW",
            AlertTag::CardiacEmergency => "CARDIAC_EMERGENCY",
            AlertTag::NeurologicEmergency => "NEUROLOGIC_EMERGENCY",
            AlertTag::RespiratoryEmergency => "RESPIRATORY_EMERGENCY",
            AlertTag::GiEmergency => "GI_EMERGENCY",
            AlertTag::PediatricEmergency => "PEDIATRIC_EMERGENCY",
            AlertTag::InsufficientAnalysis => "INSUFFICIENT_ANALYSIS",
            AlertTag::EvidenceUnavailable => "EVIDENCE_UNAVAILABLE",
        }
    }
}

impl fmt::Display for AlertTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered from least to most serious.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
    Emergency,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SafetyAlert {
    pub tag: AlertTag,
    pub severity: AlertSeverity,
    pub message: String,
}

impl SafetyAlert {
    pub fn new(tag: AlertTag, severity: AlertSeverity, message: impl Into<String>) -> Self {
        Self {
            tag,
            severity,
            message: message.into(),
        }
    }

    pub fn is_emergency(&self) -> bool {
        self.severity == AlertSeverity::Emergency
    }

    /// Alerts at or above `Critical` put the case in front of a clinician.
    pub fn forces_review(&self) -> bool {
        self.severity >= AlertSeverity::Critical
    }
}

impl fmt::Display for SafetyAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.severity, self.message)
    }
}
