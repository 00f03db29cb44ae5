//! Plain-text rendering of a [`PromptContext`] for text-based reasoning
//! services.

use super::reasoning::{PromptContext, RequestKind};

fn or_none(items: &[String]) -> String {
    if items.is_empty() {
        "None reported".to_string()
    } else {
        items.join(", ")
    }
}

/// Render the instruction text for one request.
///
/// The wording is not part of the engine's contract; only the structure of
/// the answer is, and that is carried separately by `context.schema`.
pub fn render_prompt(kind: RequestKind, context: &PromptContext) -> String {
    let case = &context.case;
    let mut out = String::new();

    out.push_str("You are a clinical decision support system.\n\n");
    out.push_str("PATIENT:\n");
    out.push_str(&format!(
        "- Age: {} years ({})\n- Sex: {:?}\n",
        case.age, case.age_group, case.sex
    ));
    if let Some(bmi) = case.bmi {
        out.push_str(&format!("- BMI: {bmi}\n"));
    }
    out.push_str(&format!("- Allergies: {}\n", or_none(&case.allergies)));
    out.push_str(&format!(
        "- Current medications: {}\n",
        or_none(&case.current_medications)
    ));
    out.push_str(&format!(
        "- Chronic conditions: {}\n\n",
        or_none(&case.chronic_conditions)
    ));

    out.push_str(&format!("CHIEF COMPLAINT:\n{}\n\n", case.chief_complaint));

    if !case.symptoms.is_empty() {
        out.push_str("SYMPTOMS:\n");
        for s in &case.symptoms {
            out.push_str(&format!(
                "- {}: {:?} severity, onset {}, duration {}\n",
                s.description, s.severity, s.onset, s.duration
            ));
        }
        out.push('\n');
    }

    if !case.vital_signs.is_empty() {
        out.push_str("VITAL SIGNS:\n");
        for (name, value) in &case.vital_signs {
            out.push_str(&format!("- {name}: {value}\n"));
        }
        out.push('\n');
    }

    match kind {
        RequestKind::Triage => {
            out.push_str(
                "TASK:\nClassify the acuity of this case as routine, urgent or emergent and give a brief initial assessment.",
            );
        }
        RequestKind::Diagnosis => {
            out.push_str(
                "TASK:\nGenerate a differential diagnosis with the 3-5 most likely conditions. For each, give a probability between 0.0 and 1.0, the clinical reasoning, typical symptoms, red flags and an ICD-10 code where known. Recommend diagnostic tests. Consider age, sex, chronic conditions and medications.",
            );
        }
        RequestKind::Summarize => {
            if let Some(focus) = &context.focus {
                out.push_str(&format!("CLINICAL QUESTION:\n{focus}\n\n"));
            }
            out.push_str("DOCUMENTS:\n");
            for doc in &context.documents {
                out.push_str(&format!(
                    "[{}] {}\n{}\n\n",
                    doc.document_id, doc.title, doc.excerpt
                ));
            }
            out.push_str(
                "TASK:\nFor every document above, write one concise summary of its key clinical findings and their relevance to this case in your own words, in one or two sentences. Do not quote the document. Use the document id shown in brackets.",
            );
        }
    }

    out
}
