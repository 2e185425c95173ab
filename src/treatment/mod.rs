use crate::error::SimError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Treatment {
    StandardCare,
    IntensiveTherapy,
    ExperimentalTreatment,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreatmentProfile {
    pub efficacy_mean: f64,
    pub efficacy_spread: f64,
    pub recovery_days_optimistic: f64,
    pub recovery_days_likely: f64,
    pub recovery_days_pessimistic: f64,
    pub complication_rate: f64,
    pub side_effect_severity: f64,
}

static PROFILES: [TreatmentProfile; 3] = [
    TreatmentProfile {
        efficacy_mean: 0.65,
        efficacy_spread: 0.15,
        recovery_days_optimistic: 30.0,
        recovery_days_likely: 60.0,
        recovery_days_pessimistic: 120.0,
        complication_rate: 0.10,
        side_effect_severity: 2.5,
    },
    TreatmentProfile {
        efficacy_mean: 0.78,
        efficacy_spread: 0.18,
        recovery_days_optimistic: 20.0,
        recovery_days_likely: 45.0,
        recovery_days_pessimistic: 90.0,
        complication_rate: 0.18,
        side_effect_severity: 4.5,
    },
    TreatmentProfile {
        efficacy_mean: 0.72,
        efficacy_spread: 0.22,
        recovery_days_optimistic: 15.0,
        recovery_days_likely: 40.0,
        recovery_days_pessimistic: 100.0,
        complication_rate: 0.25,
        side_effect_severity: 5.5,
    },
];

impl Treatment {
    pub const ALL: [Treatment; 3] = [
        Treatment::StandardCare,
        Treatment::IntensiveTherapy,
        Treatment::ExperimentalTreatment,
    ];

    pub fn profile(self) -> &'static TreatmentProfile {
        &PROFILES[self as usize]
    }

    pub fn name(self) -> &'static str {
        match self {
            Treatment::StandardCare => "Standard Care",
            Treatment::IntensiveTherapy => "Intensive Therapy",
            Treatment::ExperimentalTreatment => "Experimental Treatment",
        }
    }
}

impl fmt::Display for Treatment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Treatment {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Treatment::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| SimError::UnknownTreatment(trimmed.to_string()))
    }
}

impl TryFrom<String> for Treatment {
    type Error = SimError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Treatment> for String {
    fn from(treatment: Treatment) -> Self {
        treatment.name().to_string()
    }
}
