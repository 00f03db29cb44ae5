use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{AlertTag, ClinicalCaseState};

/// Result of a completed run.
///
/// `requires_human_review` and `review_reasons` are the top-level safety
/// signal; `alert_tags` lists every alert on the final state in the order
/// they were raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    /// Crate version that produced the report
    pub version: String,
    pub requires_human_review: bool,
    pub review_reasons: Vec<String>,
    pub alert_tags: Vec<AlertTag>,
    pub state: ClinicalCaseState,
}

impl FinalReport {
    pub fn from_state(state: ClinicalCaseState) -> Self {
        Self {
            run_id: state.run_id(),
            generated_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            requires_human_review: state.requires_human_review(),
            review_reasons: state.review_reasons().to_vec(),
            alert_tags: state.alerts().iter().map(|a| a.tag).collect(),
            state,
        }
    }

    pub fn has_alert(&self, tag: AlertTag) -> bool {
        self.alert_tags.contains(&tag)
    }
}
