use crate::error::{SimError, SimResult};
use crate::statistics::{mean, percentile, percentile_sorted, population_std};
use crate::treatment::Treatment;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityStats {
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub percentile_5: f64,
    pub percentile_25: f64,
    pub percentile_75: f64,
    pub percentile_95: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryStats {
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub percentile_5: f64,
    pub percentile_25: f64,
    pub percentile_50: f64,
    pub percentile_75: f64,
    pub percentile_90: f64,
    pub percentile_95: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeSummary {
    pub patient_id: String,
    pub treatment: Treatment,
    pub baseline_severity: f64,
    pub simulations: usize,
    pub final_severity: SeverityStats,
    pub severity_reduction: SeverityStats,
    pub recovery_time: RecoveryStats,
    pub probability_of_success: f64,
    pub probability_of_complications: f64,
    pub expected_efficacy: f64,
    pub side_effect_severity: f64,
}

#[derive(Debug, Clone)]
pub struct TrialSet {
    pub patient_id: String,
    pub treatment: Treatment,
    pub baseline_severity: f64,
    pub expected_efficacy: f64,
    pub side_effect_severity: f64,
    pub severity_reduction: Vec<f64>,
    pub recovery_time: Vec<f64>,
    pub complication: Vec<bool>,
    pub success: Vec<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueAtRisk {
    pub var_score: f64,
    pub confidence_level: f64,
    pub expected_improvement: f64,
    pub interpretation: String,
}

impl SeverityStats {
    pub fn from_samples(samples: &[f64]) -> Self {
        let sorted = sorted_copy(samples);
        Self {
            mean: mean(samples),
            median: percentile_sorted(&sorted, 50.0),
            std: population_std(samples),
            percentile_5: percentile_sorted(&sorted, 5.0),
            percentile_25: percentile_sorted(&sorted, 25.0),
            percentile_75: percentile_sorted(&sorted, 75.0),
            percentile_95: percentile_sorted(&sorted, 95.0),
        }
    }
}

impl RecoveryStats {
    pub fn from_samples(samples: &[f64]) -> Self {
        let sorted = sorted_copy(samples);
        let median = percentile_sorted(&sorted, 50.0);
        Self {
            mean: mean(samples),
            median,
            std: population_std(samples),
            percentile_5: percentile_sorted(&sorted, 5.0),
            percentile_25: percentile_sorted(&sorted, 25.0),
            percentile_50: median,
            percentile_75: percentile_sorted(&sorted, 75.0),
            percentile_90: percentile_sorted(&sorted, 90.0),
            percentile_95: percentile_sorted(&sorted, 95.0),
        }
    }
}

impl TrialSet {
    pub fn len(&self) -> usize {
        self.severity_reduction.len()
    }

    pub fn is_empty(&self) -> bool {
        self.severity_reduction.is_empty()
    }

    pub fn final_severity(&self) -> Vec<f64> {
        self.severity_reduction
            .iter()
            .map(|reduction| self.baseline_severity - reduction)
            .collect()
    }

    pub fn summarize(&self) -> OutcomeSummary {
        let trials = self.len();
        OutcomeSummary {
            patient_id: self.patient_id.clone(),
            treatment: self.treatment,
            baseline_severity: self.baseline_severity,
            simulations: trials,
            final_severity: SeverityStats::from_samples(&self.final_severity()),
            severity_reduction: SeverityStats::from_samples(&self.severity_reduction),
            recovery_time: RecoveryStats::from_samples(&self.recovery_time),
            probability_of_success: fraction(&self.success),
            probability_of_complications: fraction(&self.complication),
            expected_efficacy: self.expected_efficacy,
            side_effect_severity: self.side_effect_severity,
        }
    }

    pub fn value_at_risk(&self, confidence_level: f64) -> SimResult<ValueAtRisk> {
        if !(confidence_level > 0.0 && confidence_level < 1.0) {
            return Err(SimError::InvalidParameter(format!(
                "Confidence level must lie in (0, 1), got {}",
                confidence_level
            )));
        }
        if self.is_empty() {
            return Err(SimError::InvalidParameter(
                "Value at risk needs at least one trial".to_string(),
            ));
        }

        let var_score = percentile(&self.final_severity(), confidence_level * 100.0);
        Ok(ValueAtRisk {
            var_score,
            confidence_level,
            expected_improvement: self.baseline_severity - var_score,
            interpretation: format!(
                "With {:.1}% confidence, severity will decrease to at most {:.1}",
                confidence_level * 100.0,
                var_score
            ),
        })
    }
}

fn sorted_copy(samples: &[f64]) -> Vec<f64> {
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

fn fraction(flags: &[bool]) -> f64 {
    if flags.is_empty() {
        0.0
    } else {
        flags.iter().filter(|&&flag| flag).count() as f64 / flags.len() as f64
    }
}
