pub mod intervals;
pub mod risk;

use crate::error::{SimError, SimResult};
use crate::simulation::OutcomeSummary;
use crate::statistics::{mean, median, sample_std};
use crate::treatment::Treatment;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use intervals::*;
pub use risk::*;

pub const HIGH_RISK_SEVERITY: f64 = 70.0;
pub const LOW_RISK_SEVERITY: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    ProbabilityOfSuccess,
    ProbabilityOfComplications,
    ExpectedEfficacy,
    MeanRecoveryTime,
    MeanSeverityReduction,
    MeanFinalSeverity,
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::ProbabilityOfSuccess,
        Metric::ProbabilityOfComplications,
        Metric::ExpectedEfficacy,
        Metric::MeanRecoveryTime,
        Metric::MeanSeverityReduction,
        Metric::MeanFinalSeverity,
    ];

    pub fn value(self, summary: &OutcomeSummary) -> f64 {
        match self {
            Metric::ProbabilityOfSuccess => summary.probability_of_success,
            Metric::ProbabilityOfComplications => summary.probability_of_complications,
            Metric::ExpectedEfficacy => summary.expected_efficacy,
            Metric::MeanRecoveryTime => summary.recovery_time.mean,
            Metric::MeanSeverityReduction => summary.severity_reduction.mean,
            Metric::MeanFinalSeverity => summary.final_severity.mean,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Metric::ProbabilityOfSuccess => "probability_of_success",
            Metric::ProbabilityOfComplications => "probability_of_complications",
            Metric::ExpectedEfficacy => "expected_efficacy",
            Metric::MeanRecoveryTime => "mean_recovery_time",
            Metric::MeanSeverityReduction => "mean_severity_reduction",
            Metric::MeanFinalSeverity => "mean_final_severity",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|m| m.name() == s.trim())
            .ok_or_else(|| SimError::InvalidParameter(format!("Unknown metric: {}", s)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreatmentSuccessRate {
    pub treatment: Treatment,
    pub patients: usize,
    pub mean: f64,
    pub std: f64,
    pub median: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortSummary {
    pub total_patients: usize,
    pub treatments: Vec<TreatmentSuccessRate>,
    pub mean_success_rate: f64,
    pub mean_complication_rate: f64,
    pub high_risk_patients: usize,
    pub low_risk_patients: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreatmentComparison {
    pub treatment: Treatment,
    pub n_patients: usize,
    pub mean_success_rate: f64,
    pub mean_complication_rate: f64,
    pub mean_recovery_days: f64,
    pub mean_severity_reduction: f64,
    pub success_rate_std: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct ResultsAnalyzer<'a> {
    results: &'a [OutcomeSummary],
}

impl<'a> ResultsAnalyzer<'a> {
    pub fn new(results: &'a [OutcomeSummary]) -> Self {
        Self { results }
    }

    pub fn summarize(&self) -> CohortSummary {
        let treatments = group_by_treatment(self.results)
            .into_iter()
            .map(|(treatment, rows)| {
                let success = collect(&rows, Metric::ProbabilityOfSuccess);
                TreatmentSuccessRate {
                    treatment,
                    patients: rows.len(),
                    mean: mean(&success),
                    std: sample_std(&success),
                    median: median(&success),
                }
            })
            .collect();

        let all: Vec<&OutcomeSummary> = self.results.iter().collect();

        CohortSummary {
            total_patients: self.results.len(),
            treatments,
            mean_success_rate: mean(&collect(&all, Metric::ProbabilityOfSuccess)),
            mean_complication_rate: mean(&collect(&all, Metric::ProbabilityOfComplications)),
            high_risk_patients: self.results
                .iter()
                .filter(|r| r.baseline_severity > HIGH_RISK_SEVERITY)
                .count(),
            low_risk_patients: self.results
                .iter()
                .filter(|r| r.baseline_severity < LOW_RISK_SEVERITY)
                .count(),
        }
    }

    /// Per-treatment averages, best mean success rate first.
    pub fn compare_treatments(&self) -> Vec<TreatmentComparison> {
        let mut rows: Vec<TreatmentComparison> = group_by_treatment(self.results)
            .into_iter()
            .map(|(treatment, rows)| {
                let success = collect(&rows, Metric::ProbabilityOfSuccess);
                TreatmentComparison {
                    treatment,
                    n_patients: rows.len(),
                    mean_success_rate: mean(&success),
                    mean_complication_rate: mean(&collect(&rows, Metric::ProbabilityOfComplications)),
                    mean_recovery_days: mean(&collect(&rows, Metric::MeanRecoveryTime)),
                    mean_severity_reduction: mean(&collect(&rows, Metric::MeanSeverityReduction)),
                    success_rate_std: sample_std(&success),
                }
            })
            .collect();

        rows.sort_by(|a, b| b.mean_success_rate.total_cmp(&a.mean_success_rate));
        rows
    }

    pub fn stratify_by_risk(&self) -> Vec<RiskStratum> {
        risk::stratify(self.results)
    }

    pub fn confidence_intervals(
        &self,
        metric: Metric,
        confidence_level: f64,
    ) -> SimResult<Vec<ConfidenceInterval>> {
        intervals::confidence_intervals(self.results, metric, confidence_level)
    }
}

pub fn group_by_treatment(results: &[OutcomeSummary]) -> Vec<(Treatment, Vec<&OutcomeSummary>)> {
    let mut groups: Vec<(Treatment, Vec<&OutcomeSummary>)> = Vec::new();
    for result in results {
        match groups.iter_mut().find(|(t, _)| *t == result.treatment) {
            Some((_, rows)) => rows.push(result),
            None => groups.push((result.treatment, vec![result])),
        }
    }
    groups
}

fn collect(rows: &[&OutcomeSummary], metric: Metric) -> Vec<f64> {
    rows.iter().map(|r| metric.value(r)).collect()
}
