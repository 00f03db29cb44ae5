use tracing::{error, info};

use crate::error::PipelineError;
use crate::model::{ClinicalCaseState, StateDelta, TRIAGE_EMERGENT, TriageLevel};
use crate::redflag::RedFlagDetector;

/// Check the state handed to the safety stage, then re-run detection over
/// everything accumulated so far.
///
/// An emergency alert that reached this point without the review flag means
/// an earlier stage merged it without applying the review rules. That is an
/// engine bug, so it aborts the run.
pub fn check(
    detector: &RedFlagDetector,
    state: &ClinicalCaseState,
) -> Result<StateDelta, PipelineError> {
    if !state.requires_human_review()
        && let Some(alert) = state.alerts().iter().find(|a| a.is_emergency())
    {
        error!(tag = %alert.tag, "Emergency alert present without human review");
        return Err(PipelineError::FatalConsistency(format!(
            "{} alert present but human review was not requested",
            alert.tag
        )));
    }

    let alerts = detector.detect(state);
    let new = alerts.iter().filter(|a| !state.has_alert(a.tag)).count();
    if new > 0 {
        info!(new, "Safety validation raised additional alerts");
    }
    Ok(StateDelta::default().alerts(alerts))
}

/// Terminal invariant on the merged state: every alert that forces review,
/// and an emergent triage, has set the flag and is listed among the review
/// reasons.
pub fn verify(state: &ClinicalCaseState) -> Result<(), PipelineError> {
    let emergent = state
        .triage()
        .is_some_and(|t| t.level == TriageLevel::Emergent);
    if emergent
        && (!state.requires_human_review()
            || !state.review_reasons().iter().any(|r| r == TRIAGE_EMERGENT))
    {
        error!("Emergent triage missing from review reasons");
        return Err(PipelineError::FatalConsistency(
            "emergent triage is not surfaced for human review".to_string(),
        ));
    }
    for alert in state.alerts().iter().filter(|a| a.forces_review()) {
        let listed = state
            .review_reasons()
            .iter()
            .any(|r| r == alert.tag.as_str());
        if !state.requires_human_review() || !listed {
            error!(tag = %alert.tag, "Review-forcing alert missing from review reasons");
            return Err(PipelineError::FatalConsistency(format!(
                "{} alert is not surfaced for human review",
                alert.tag
            )));
        }
    }
    Ok(())
}
