use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::ValidationError;

const MAX_AGE: i32 = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
    Other,
}

/// Demographics and history of the patient a case is about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub patient_id: String,
    /// Age in whole years
    pub age: i32,
    pub sex: Sex,
    #[serde(default)]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub height_cm: Option<f64>,
    #[serde(default)]
    pub allergies: BTreeSet<String>,
    #[serde(default)]
    pub current_medications: Vec<String>,
    #[serde(default)]
    pub chronic_conditions: Vec<String>,
}

impl PatientProfile {
    pub fn new(patient_id: impl Into<String>, age: i32, sex: Sex) -> Self {
        Self {
            patient_id: patient_id.into(),
            age,
            sex,
            weight_kg: None,
            height_cm: None,
            allergies: BTreeSet::new(),
            current_medications: Vec::new(),
            chronic_conditions: Vec::new(),
        }
    }

    pub fn weight_kg(mut self, weight: f64) -> Self {
        self.weight_kg = Some(weight);
        self
    }

    pub fn height_cm(mut self, height: f64) -> Self {
        self.height_cm = Some(height);
        self
    }

    pub fn allergy(mut self, allergy: impl Into<String>) -> Self {
        self.allergies.insert(allergy.into());
        self
    }

    pub fn medication(mut self, medication: impl Into<String>) -> Self {
        self.current_medications.push(medication.into());
        self
    }

    pub fn chronic_condition(mut self, condition: impl Into<String>) -> Self {
        self.chronic_conditions.push(condition.into());
        self
    }

    /// Body-mass index rounded to two decimals, when both measurements are known.
    pub fn bmi(&self) -> Option<f64> {
        let weight = self.weight_kg?;
        let height_m = self.height_cm? / 100.0;
        if height_m <= 0.0 {
            return None;
        }
        Some((weight / (height_m * height_m) * 100.0).round() / 100.0)
    }

    pub fn is_pediatric(&self) -> bool {
        self.age < 18
    }

    pub fn is_geriatric(&self) -> bool {
        self.age >= 65
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.patient_id.trim().is_empty() {
            return Err(ValidationError::Empty("patient_id"));
        }
        if !(0..=MAX_AGE).contains(&self.age) {
            return Err(ValidationError::Age(self.age));
        }
        for (field, value) in [("weight_kg", self.weight_kg), ("height_cm", self.height_cm)] {
            if let Some(value) = value
                && (!value.is_finite() || value < 0.0)
            {
                return Err(ValidationError::Measurement { field, value });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymptomSeverity {
    Mild,
    Moderate,
    Severe,
}

/// A single presenting symptom. Never modified after it is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symptom {
    pub description: String,
    pub severity: SymptomSeverity,
    pub onset: String,
    pub duration: String,
    #[serde(default)]
    pub location: Option<String>,
    /// e.g. "sharp", "radiating to left arm"
    #[serde(default)]
    pub characteristics: Option<String>,
}

impl Symptom {
    pub fn new(
        description: impl Into<String>,
        severity: SymptomSeverity,
        onset: impl Into<String>,
        duration: impl Into<String>,
    ) -> Self {
        Self {
            description: description.into(),
            severity,
            onset: onset.into(),
            duration: duration.into(),
            location: None,
            characteristics: None,
        }
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn characteristics(mut self, characteristics: impl Into<String>) -> Self {
        self.characteristics = Some(characteristics.into());
        self
    }

    pub fn is_severe(&self) -> bool {
        self.severity == SymptomSeverity::Severe
    }

    /// All free text recorded for the symptom, for keyword scanning.
    pub(crate) fn texts(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.description.as_str())
            .chain(self.location.as_deref())
            .chain(self.characteristics.as_deref())
    }
}
