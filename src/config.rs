use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::analysis::Metric;
use crate::error::{SimError, SimResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub seed: Option<u64>,
    pub cohort: CohortConfig,
    pub simulation: SimulationConfig,
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CohortConfig {
    pub n_patients: usize,
    pub amplify: bool,
    pub amplification_factor: f64,
    pub severity_policy: SeverityPolicy,
}

/// What happens to the severity score of an amplified copy after its
/// physiological attributes are perturbed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityPolicy {
    #[default]
    Retain,
    Recompute,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub num_trials: usize,
    pub sample_size: Option<usize>,
    pub failure_policy: FailurePolicy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    #[default]
    FailFast,
    SkipAndWarn,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub confidence_level: f64,
    pub metric: Metric,
}

impl Default for CohortConfig {
    fn default() -> Self {
        Self {
            n_patients: 1000,
            amplify: true,
            amplification_factor: 0.3,
            severity_policy: SeverityPolicy::Retain,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            num_trials: 10_000,
            sample_size: None,
            failure_policy: FailurePolicy::FailFast,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            confidence_level: 0.95,
            metric: Metric::ProbabilityOfSuccess,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> SimResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SimResult<()> {
        if self.cohort.n_patients == 0 {
            return Err(SimError::InvalidParameter(
                "Cohort size must be at least 1".to_string()
            ));
        }

        let factor = self.cohort.amplification_factor;
        if !factor.is_finite() || factor < 0.0 {
            return Err(SimError::InvalidParameter(
                format!("Amplification factor must be a non-negative number, got {}", factor)
            ));
        }

        if self.simulation.num_trials == 0 {
            return Err(SimError::InvalidParameter(
                "Number of trials must be at least 1".to_string()
            ));
        }

        if self.simulation.sample_size == Some(0) {
            return Err(SimError::InvalidParameter(
                "Sample size must be at least 1 when given".to_string()
            ));
        }

        let level = self.analysis.confidence_level;
        if !(level > 0.0 && level < 1.0) {
            return Err(SimError::InvalidParameter(
                format!("Confidence level must lie in (0, 1), got {}", level)
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.simulation.num_trials, 10_000);
        assert_eq!(config.cohort.severity_policy, SeverityPolicy::Retain);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{
            "seed": 7,
            "cohort": { "n_patients": 250, "severity_policy": "recompute" },
            "simulation": { "failure_policy": "skip_and_warn" }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.cohort.n_patients, 250);
        assert!(config.cohort.amplify);
        assert_eq!(config.cohort.severity_policy, SeverityPolicy::Recompute);
        assert_eq!(config.simulation.failure_policy, FailurePolicy::SkipAndWarn);
        assert_eq!(config.analysis.metric, Metric::ProbabilityOfSuccess);
    }

    #[test]
    fn test_validation_errors() {
        let mut config = Config::default();
        config.simulation.num_trials = 0;
        assert!(matches!(config.validate(), Err(SimError::InvalidParameter(_))));

        let mut config = Config::default();
        config.cohort.amplification_factor = -0.1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.analysis.confidence_level = 1.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.simulation.sample_size = Some(0);
        assert!(config.validate().is_err());
    }
}
