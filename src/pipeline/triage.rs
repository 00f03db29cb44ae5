use tracing::{debug, warn};

use crate::backend::utils::call_with_retry;
use crate::backend::{PromptContext, RequestKind};
use crate::model::{
    ClinicalCaseState, StateDelta, TriageAssessment, TriageLevel, TriageResult, TriageSource,
    parse_structured,
};

use super::StageContext;

const TEMPERATURE: &[&str] = &["temperature", "temp"];
const HEART_RATE: &[&str] = &["heart_rate", "pulse", "hr"];
const RESPIRATORY_RATE: &[&str] = &["respiratory_rate", "rr"];
const SYSTOLIC: &[&str] = &["bp_systolic", "systolic_bp"];
const SPO2: &[&str] = &["oxygen_saturation", "spo2"];

/// Ask the reasoning service for a triage level, falling back to
/// [`heuristic_triage`] when the call fails in any way.
pub(crate) async fn run(ctx: &StageContext, state: &ClinicalCaseState) -> StateDelta {
    let context = PromptContext::for_result::<TriageResult>(state);
    let outcome = call_with_retry(
        "triage",
        ctx.config.call_timeout(),
        &ctx.config.retry,
        || ctx.reasoning.infer(RequestKind::Triage, &context),
    )
    .await
    .and_then(parse_structured::<TriageResult>);

    let assessment = match outcome {
        Ok(result) => {
            debug!(level = %result.level, "Triage level from reasoning service");
            TriageAssessment {
                level: result.level,
                assessment: result.assessment,
                source: TriageSource::Reasoning,
            }
        }
        Err(e) => {
            warn!(error = %e, "Triage request failed, using vital-sign heuristic");
            heuristic_triage(state)
        }
    };

    StateDelta {
        triage: Some(assessment),
        ..StateDelta::default()
    }
}

/// Deterministic triage from vital signs alone.
///
/// Missing vitals never raise the level.
pub fn heuristic_triage(state: &ClinicalCaseState) -> TriageAssessment {
    let temp = state.vital(TEMPERATURE);
    let hr = state.vital(HEART_RATE);
    let rr = state.vital(RESPIRATORY_RATE);
    let sbp = state.vital(SYSTOLIC);
    let spo2 = state.vital(SPO2);

    let mut emergent = Vec::new();
    if let Some(v) = spo2.filter(|v| *v < 90.0) {
        emergent.push(format!("oxygen saturation {v}"));
    }
    if let Some(v) = sbp.filter(|v| *v < 80.0) {
        emergent.push(format!("systolic pressure {v}"));
    }
    if let Some(v) = hr.filter(|v| *v > 130.0) {
        emergent.push(format!("heart rate {v}"));
    }
    if let Some(v) = rr.filter(|v| *v > 30.0) {
        emergent.push(format!("respiratory rate {v}"));
    }
    if !emergent.is_empty() {
        return heuristic(TriageLevel::Emergent, &emergent);
    }

    let mut urgent = Vec::new();
    if let Some(v) = temp.filter(|v| *v >= 38.0 || *v <= 35.0) {
        urgent.push(format!("temperature {v}"));
    }
    if let Some(v) = hr.filter(|v| *v > 100.0 || *v < 50.0) {
        urgent.push(format!("heart rate {v}"));
    }
    if let Some(v) = rr.filter(|v| *v > 24.0 || *v < 10.0) {
        urgent.push(format!("respiratory rate {v}"));
    }
    if let Some(v) = sbp.filter(|v| *v < 90.0 || *v >= 180.0) {
        urgent.push(format!("systolic pressure {v}"));
    }
    if let Some(v) = spo2.filter(|v| *v < 94.0) {
        urgent.push(format!("oxygen saturation {v}"));
    }
    if !urgent.is_empty() {
        return heuristic(TriageLevel::Urgent, &urgent);
    }

    heuristic(TriageLevel::Routine, &[])
}

fn heuristic(level: TriageLevel, findings: &[String]) -> TriageAssessment {
    let assessment = if findings.is_empty() {
        "Vital signs within normal limits".to_string()
    } else {
        format!("Abnormal vital signs: {}", findings.join(", "))
    };
    TriageAssessment {
        level,
        assessment,
        source: TriageSource::Heuristic,
    }
}
