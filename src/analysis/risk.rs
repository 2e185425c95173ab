use crate::simulation::OutcomeSummary;
use crate::statistics::mean;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskBand {
    Low,
    Moderate,
    High,
    #[serde(rename = "Very High")]
    VeryHigh,
}

impl RiskBand {
    pub const ALL: [RiskBand; 4] = [RiskBand::Low, RiskBand::Moderate, RiskBand::High, RiskBand::VeryHigh];

    // Only VeryHigh includes its upper bound
    pub fn bounds(self) -> (f64, f64) {
        match self {
            RiskBand::Low => (0.0, 30.0),
            RiskBand::Moderate => (30.0, 50.0),
            RiskBand::High => (50.0, 70.0),
            RiskBand::VeryHigh => (70.0, 100.0),
        }
    }

    pub fn classify(severity: f64) -> Option<RiskBand> {
        RiskBand::ALL.into_iter().find(|band| band.contains(severity))
    }

    pub fn contains(self, severity: f64) -> bool {
        let (lower, upper) = self.bounds();
        match self {
            RiskBand::VeryHigh => severity >= lower && severity <= upper,
            _ => severity >= lower && severity < upper,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RiskBand::Low => "Low",
            RiskBand::Moderate => "Moderate",
            RiskBand::High => "High",
            RiskBand::VeryHigh => "Very High",
        }
    }
}

impl fmt::Display for RiskBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskStratum {
    pub band: RiskBand,
    pub n_patients: usize,
    pub mean_success_rate: f64,
    pub mean_complication_rate: f64,
    pub mean_recovery_time: f64,
    pub mean_baseline_severity: f64,
}

pub fn stratify(results: &[OutcomeSummary]) -> Vec<RiskStratum> {
    let mut buckets: [Vec<&OutcomeSummary>; 4] = Default::default();

    for result in results {
        match RiskBand::classify(result.baseline_severity) {
            Some(band) => buckets[band as usize].push(result),
            None => debug!(
                "Severity {} of {} falls outside every risk band",
                result.baseline_severity, result.patient_id
            ),
        }
    }

    RiskBand::ALL
        .into_iter()
        .zip(buckets)
        .filter(|(_, rows)| !rows.is_empty())
        .map(|(band, rows)| {
            let average = |f: fn(&OutcomeSummary) -> f64| {
                mean(&rows.iter().map(|r| f(r)).collect::<Vec<f64>>())
            };
            RiskStratum {
                band,
                n_patients: rows.len(),
                mean_success_rate: average(|r: &OutcomeSummary| r.probability_of_success),
                mean_complication_rate: average(|r: &OutcomeSummary| r.probability_of_complications),
                mean_recovery_time: average(|r: &OutcomeSummary| r.recovery_time.mean),
                mean_baseline_severity: average(|r: &OutcomeSummary| r.baseline_severity),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::tests::{row, sample_results};
    use crate::treatment::Treatment;
    use approx::assert_relative_eq;

    #[test]
    fn test_band_edges() {
        assert_eq!(RiskBand::classify(0.0), Some(RiskBand::Low));
        assert_eq!(RiskBand::classify(29.9), Some(RiskBand::Low));
        assert_eq!(RiskBand::classify(30.0), Some(RiskBand::Moderate));
        assert_eq!(RiskBand::classify(50.0), Some(RiskBand::High));
        assert_eq!(RiskBand::classify(70.0), Some(RiskBand::VeryHigh));
        assert_eq!(RiskBand::classify(100.0), Some(RiskBand::VeryHigh));
        assert_eq!(RiskBand::classify(100.1), None);
        assert_eq!(RiskBand::classify(-1.0), None);
    }

    #[test]
    fn test_stratify_sample() {
        let strata = stratify(&sample_results());

        let bands: Vec<RiskBand> = strata.iter().map(|s| s.band).collect();
        assert_eq!(bands, RiskBand::ALL.to_vec());

        let low = &strata[0];
        assert_eq!(low.n_patients, 2);
        assert_relative_eq!(low.mean_baseline_severity, 15.0);
        assert_relative_eq!(low.mean_success_rate, 0.55, epsilon = 1e-12);

        for stratum in &strata {
            let (lower, upper) = stratum.band.bounds();
            assert!(stratum.mean_baseline_severity >= lower);
            assert!(stratum.mean_baseline_severity <= upper);
        }
    }

    #[test]
    fn test_empty_bands_are_omitted() {
        let results = vec![
            row("PT000001", Treatment::StandardCare, 12.0, 0.5),
            row("PT000002", Treatment::StandardCare, 88.0, 0.3),
        ];
        let strata = stratify(&results);
        assert_eq!(strata.len(), 2);
        assert_eq!(strata[0].band, RiskBand::Low);
        assert_eq!(strata[1].band, RiskBand::VeryHigh);
    }

    #[test]
    fn test_band_serializes_label() {
        assert_eq!(serde_json::to_string(&RiskBand::VeryHigh).unwrap(), "\"Very High\"");
    }
}
