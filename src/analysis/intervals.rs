use super::{group_by_treatment, Metric};
use crate::error::{SimError, SimResult};
use crate::simulation::OutcomeSummary;
use crate::statistics::{mean, sample_std};
use crate::treatment::Treatment;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

pub const MIN_GROUP_SIZE: usize = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub treatment: Treatment,
    pub metric: Metric,
    pub n: usize,
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
    pub margin_of_error: f64,
}

pub fn confidence_intervals(
    results: &[OutcomeSummary],
    metric: Metric,
    confidence_level: f64,
) -> SimResult<Vec<ConfidenceInterval>> {
    if !(confidence_level > 0.0 && confidence_level < 1.0) {
        return Err(SimError::InvalidParameter(format!(
            "Confidence level must lie in (0, 1), got {}",
            confidence_level
        )));
    }

    group_by_treatment(results)
        .into_iter()
        .map(|(treatment, rows)| {
            let values: Vec<f64> = rows.iter().map(|r| metric.value(r)).collect();
            t_interval(treatment, metric, &values, confidence_level)
        })
        .collect()
}

fn t_interval(
    treatment: Treatment,
    metric: Metric,
    values: &[f64],
    confidence_level: f64,
) -> SimResult<ConfidenceInterval> {
    let n = values.len();
    if n < MIN_GROUP_SIZE {
        return Err(SimError::InsufficientSample {
            group: treatment.to_string(),
            required: MIN_GROUP_SIZE,
            found: n,
        });
    }

    let centre = mean(values);
    let std_err = sample_std(values) / (n as f64).sqrt();

    let t_dist = StudentsT::new(0.0, 1.0, (n - 1) as f64)
        .map_err(|e| SimError::Distribution(format!("{:?}", e)))?;
    let critical = t_dist.inverse_cdf(1.0 - (1.0 - confidence_level) / 2.0);
    let margin = critical * std_err;

    Ok(ConfidenceInterval {
        treatment,
        metric,
        n,
        mean: centre,
        lower: centre - margin,
        upper: centre + margin,
        margin_of_error: margin,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::tests::{row, sample_results};
    use approx::assert_relative_eq;

    #[test]
    fn test_known_t_interval() {
        let results: Vec<OutcomeSummary> = [0.5, 0.6, 0.7, 0.8, 0.9]
            .iter()
            .enumerate()
            .map(|(i, &p)| row(&format!("PT{:06}", i + 1), Treatment::StandardCare, 40.0, p))
            .collect();

        let intervals = confidence_intervals(&results, Metric::ProbabilityOfSuccess, 0.95).unwrap();
        assert_eq!(intervals.len(), 1);

        let ci = &intervals[0];
        // t(0.975, 4) = 2.7764, se = 0.1581 / sqrt(5)
        let expected_margin = 2.776445 * (0.025f64).sqrt() / 5f64.sqrt();
        assert_relative_eq!(ci.mean, 0.7, epsilon = 1e-12);
        assert_relative_eq!(ci.margin_of_error, expected_margin, epsilon = 1e-4);
        assert_relative_eq!(ci.upper - ci.lower, 2.0 * ci.margin_of_error, epsilon = 1e-12);
    }

    #[test]
    fn test_wider_interval_at_higher_confidence() {
        let results = sample_results();
        let narrow = confidence_intervals(&results, Metric::ProbabilityOfSuccess, 0.80).unwrap();
        let wide = confidence_intervals(&results, Metric::ProbabilityOfSuccess, 0.99).unwrap();

        for (n, w) in narrow.iter().zip(&wide) {
            assert_eq!(n.treatment, w.treatment);
            assert!(w.margin_of_error > n.margin_of_error);
            assert!(w.lower <= n.mean && n.mean <= w.upper);
        }
    }

    #[test]
    fn test_constant_metric_has_zero_width() {
        let results = sample_results();
        let intervals = confidence_intervals(&results, Metric::MeanRecoveryTime, 0.95).unwrap();
        for ci in intervals {
            assert_relative_eq!(ci.mean, 60.0);
            assert_relative_eq!(ci.margin_of_error, 0.0);
        }
    }

    #[test]
    fn test_single_row_group_rejected() {
        let mut results = sample_results();
        results.push(row("PT000008", Treatment::StandardCare, 50.0, 0.5));
        results.retain(|r| r.treatment != Treatment::ExperimentalTreatment || r.patient_id == "PT000004");

        let err = confidence_intervals(&results, Metric::ProbabilityOfSuccess, 0.95).unwrap_err();
        match err {
            SimError::InsufficientSample { group, required, found } => {
                assert_eq!(group, "Experimental Treatment");
                assert_eq!(required, 2);
                assert_eq!(found, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_confidence_level() {
        let results = sample_results();
        assert!(confidence_intervals(&results, Metric::ProbabilityOfSuccess, 0.0).is_err());
        assert!(confidence_intervals(&results, Metric::ProbabilityOfSuccess, 1.2).is_err());
    }
}
