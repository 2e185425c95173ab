use crate::error::{SimError, SimResult};
use crate::treatment::Treatment;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const AGE_RANGE: (u32, u32) = (30, 85);
pub const BMI_RANGE: (f64, f64) = (18.0, 50.0);
pub const SYSTOLIC_RANGE: (f64, f64) = (90.0, 180.0);
pub const DIASTOLIC_RANGE: (f64, f64) = (60.0, 120.0);
pub const GLUCOSE_RANGE: (f64, f64) = (70.0, 180.0);
pub const HBA1C_RANGE: (f64, f64) = (4.5, 10.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Disease {
    #[serde(rename = "Type 2 Diabetes")]
    Type2Diabetes,
    Hypertension,
    Both,
}

impl Disease {
    pub const ALL: [Disease; 3] = [Disease::Type2Diabetes, Disease::Hypertension, Disease::Both];
}

impl fmt::Display for Disease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disease::Type2Diabetes => f.write_str("Type 2 Diabetes"),
            Disease::Hypertension => f.write_str("Hypertension"),
            Disease::Both => f.write_str("Both"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub patient_id: String,
    pub age: u32,
    pub gender: Gender,
    pub bmi: f64,
    pub baseline_systolic: f64,
    pub baseline_diastolic: f64,
    pub baseline_glucose: f64,
    pub baseline_hba1c: f64,
    pub disease: Disease,
    pub treatment: Treatment,
    pub baseline_severity: f64,
}

impl Patient {
    pub fn with_treatment(&self, treatment: Treatment) -> Patient {
        Patient {
            treatment,
            ..self.clone()
        }
    }

    pub fn recompute_severity(&mut self) {
        let score = severity_score(
            self.bmi,
            self.baseline_systolic,
            self.baseline_glucose,
            self.baseline_hba1c,
        );
        self.baseline_severity = round_to(score, 1);
    }

    pub fn validate(&self) -> SimResult<()> {
        if !self.baseline_severity.is_finite() || !(0.0..=100.0).contains(&self.baseline_severity) {
            return Err(SimError::InvalidParameter(format!(
                "patient {} has baseline severity {} outside [0, 100]",
                self.patient_id, self.baseline_severity
            )));
        }
        if !self.bmi.is_finite() || self.bmi <= 0.0 {
            return Err(SimError::InvalidParameter(format!(
                "patient {} has invalid BMI {}",
                self.patient_id, self.bmi
            )));
        }
        Ok(())
    }
}

/// Weighted severity score in [0, 100]; each sub-score contributes at most 25 points.
pub fn severity_score(bmi: f64, systolic: f64, glucose: f64, hba1c: f64) -> f64 {
    let bmi_part = normalize(bmi, BMI_RANGE);
    let pressure_part = normalize(systolic, SYSTOLIC_RANGE);
    let glucose_part = normalize(glucose, GLUCOSE_RANGE);
    let hba1c_part = normalize(hba1c, HBA1C_RANGE);

    let score = (bmi_part + pressure_part + glucose_part + hba1c_part) * 25.0;
    score.clamp(0.0, 100.0)
}

fn normalize(value: f64, (lower, upper): (f64, f64)) -> f64 {
    ((value - lower) / (upper - lower)).clamp(0.0, 1.0)
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
