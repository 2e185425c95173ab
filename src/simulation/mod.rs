pub mod outcome;
pub mod sampling;

use crate::cohort::Patient;
use crate::config::FailurePolicy;
use crate::error::{SimError, SimResult};
use crate::treatment::Treatment;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Distribution;
use log::{debug, info, warn};
use std::collections::BTreeMap;

pub use outcome::*;
pub use sampling::*;

pub const SUCCESS_REDUCTION_FRACTION: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EfficacyAdjustment {
    pub age_penalty: f64,
    pub obesity_penalty: f64,
    pub severity_penalty: f64,
    pub adjusted_mean: f64,
}

impl EfficacyAdjustment {
    pub fn for_patient(patient: &Patient) -> Self {
        let base = patient.treatment.profile().efficacy_mean;
        let age_penalty = (patient.age as f64 - 50.0) * 0.002;
        let obesity_penalty = ((patient.bmi - 30.0) * 0.005).max(0.0);
        let severity_penalty = (patient.baseline_severity / 100.0) * 0.1;

        let adjusted_mean = (base - age_penalty - obesity_penalty - severity_penalty).clamp(0.2, 0.95);

        Self {
            age_penalty,
            obesity_penalty,
            severity_penalty,
            adjusted_mean,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OutcomeSimulator {
    failure_policy: FailurePolicy,
}

impl OutcomeSimulator {
    pub fn new(failure_policy: FailurePolicy) -> Self {
        Self { failure_policy }
    }

    pub fn simulate_trials<R: Rng + ?Sized>(
        &self,
        patient: &Patient,
        num_trials: usize,
        rng: &mut R,
    ) -> SimResult<TrialSet> {
        if num_trials == 0 {
            return Err(SimError::InvalidParameter(
                "Number of trials must be at least 1".to_string()
            ));
        }
        patient.validate()?;

        let profile = patient.treatment.profile();
        let adjustment = EfficacyAdjustment::for_patient(patient);
        let efficacy_dist = efficacy_distribution(adjustment.adjusted_mean)?;
        let recovery_dist = recovery_distribution(profile)?;
        let complication_probability = profile.complication_rate * (1.0 + adjustment.severity_penalty);
        let baseline = patient.baseline_severity;

        debug!(
            "Simulating {} under {} ({} trials, adjusted efficacy {:.3}; penalties age {:.3}, obesity {:.3}, severity {:.3})",
            patient.patient_id,
            patient.treatment,
            num_trials,
            adjustment.adjusted_mean,
            adjustment.age_penalty,
            adjustment.obesity_penalty,
            adjustment.severity_penalty
        );

        let mut severity_reduction = Vec::with_capacity(num_trials);
        let mut recovery_time = Vec::with_capacity(num_trials);
        let mut complication = Vec::with_capacity(num_trials);
        let mut success = Vec::with_capacity(num_trials);

        for _ in 0..num_trials {
            let efficacy = efficacy_dist.sample(rng);
            let reduction = baseline * efficacy;
            let recovery = recovery_dist.sample(rng);
            let complicated = draw_event(complication_probability, rng);

            severity_reduction.push(reduction);
            recovery_time.push(recovery);
            complication.push(complicated);
            success.push(reduction >= baseline * SUCCESS_REDUCTION_FRACTION && !complicated);
        }

        Ok(TrialSet {
            patient_id: patient.patient_id.clone(),
            treatment: patient.treatment,
            baseline_severity: baseline,
            expected_efficacy: adjustment.adjusted_mean,
            side_effect_severity: profile.side_effect_severity,
            severity_reduction,
            recovery_time,
            complication,
            success,
        })
    }

    pub fn simulate_outcome<R: Rng + ?Sized>(
        &self,
        patient: &Patient,
        num_trials: usize,
        rng: &mut R,
    ) -> SimResult<OutcomeSummary> {
        Ok(self.simulate_trials(patient, num_trials, rng)?.summarize())
    }

    /// Simulates every patient (or a random subset of `sample_size`) under
    /// their assigned treatment.
    pub fn simulate_cohort<R: Rng + ?Sized>(
        &self,
        patients: &[Patient],
        num_trials: usize,
        sample_size: Option<usize>,
        rng: &mut R,
    ) -> SimResult<Vec<OutcomeSummary>> {
        if num_trials == 0 {
            return Err(SimError::InvalidParameter(
                "Number of trials must be at least 1".to_string()
            ));
        }

        let selected: Vec<&Patient> = match sample_size {
            Some(size) if size < patients.len() => {
                rand::seq::index::sample(rng, patients.len(), size)
                    .into_iter()
                    .map(|i| &patients[i])
                    .collect()
            }
            _ => patients.iter().collect(),
        };

        let seeds: Vec<u64> = (0..selected.len()).map(|_| rng.gen()).collect();
        let total = selected.len();
        info!("Simulating cohort of {} patients ({} trials each)", total, num_trials);

        let mut results = Vec::with_capacity(total);
        for (position, (patient, seed)) in selected.into_iter().zip(seeds).enumerate() {
            if (position + 1) % 100 == 0 {
                info!("Simulated {}/{} patients", position + 1, total);
            }

            let mut unit_rng = StdRng::seed_from_u64(seed);
            match self.simulate_outcome(patient, num_trials, &mut unit_rng) {
                Ok(summary) => results.push(summary),
                Err(err) => match self.failure_policy {
                    FailurePolicy::FailFast => return Err(err),
                    FailurePolicy::SkipAndWarn => {
                        warn!("Skipping patient {}: {}", patient.patient_id, err);
                    }
                },
            }
        }

        info!("Cohort simulation completed ({} of {} patients)", results.len(), total);
        Ok(results)
    }

    /// Simulates the patient under every treatment arm.
    pub fn compare_treatments(
        &self,
        patient: &Patient,
        num_trials: usize,
        seed: u64,
    ) -> SimResult<BTreeMap<Treatment, OutcomeSummary>> {
        Ok(self
            .compare_trial_sets(patient, num_trials, seed)?
            .into_iter()
            .map(|(treatment, trials)| (treatment, trials.summarize()))
            .collect())
    }

    pub fn compare_trial_sets(
        &self,
        patient: &Patient,
        num_trials: usize,
        seed: u64,
    ) -> SimResult<BTreeMap<Treatment, TrialSet>> {
        let mut comparison = BTreeMap::new();

        for treatment in Treatment::ALL {
            let candidate = patient.with_treatment(treatment);
            let mut rng = StdRng::seed_from_u64(seed);
            let trials = self.simulate_trials(&candidate, num_trials, &mut rng)?;
            comparison.insert(treatment, trials);
        }

        Ok(comparison)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cohort::{CohortGenerator, Disease, Gender};
    use approx::assert_relative_eq;

    fn patient(severity: f64, treatment: Treatment) -> Patient {
        Patient {
            patient_id: "PT000042".to_string(),
            age: 58,
            gender: Gender::Male,
            bmi: 31.5,
            baseline_systolic: 142.0,
            baseline_diastolic: 88.0,
            baseline_glucose: 128.0,
            baseline_hba1c: 6.9,
            disease: Disease::Both,
            treatment,
            baseline_severity: severity,
        }
    }

    #[test]
    fn test_efficacy_adjustment() {
        let mut p = patient(0.0, Treatment::StandardCare);
        p.age = 50;
        p.bmi = 25.0;
        let adj = EfficacyAdjustment::for_patient(&p);
        assert_relative_eq!(adj.adjusted_mean, 0.65);
        assert_eq!(adj.obesity_penalty, 0.0);

        let p = patient(60.0, Treatment::IntensiveTherapy);
        let adj = EfficacyAdjustment::for_patient(&p);
        let expected = 0.78 - 8.0 * 0.002 - 1.5 * 0.005 - 0.06;
        assert_relative_eq!(adj.adjusted_mean, expected, epsilon = 1e-12);
        assert_relative_eq!(adj.severity_penalty, 0.06, epsilon = 1e-12);

        let mut p = patient(100.0, Treatment::StandardCare);
        p.age = 200;
        p.bmi = 50.0;
        assert_relative_eq!(EfficacyAdjustment::for_patient(&p).adjusted_mean, 0.2);
    }

    #[test]
    fn test_same_seed_is_deterministic() {
        let simulator = OutcomeSimulator::default();
        let p = patient(55.0, Treatment::ExperimentalTreatment);

        let a = simulator.simulate_outcome(&p, 2_000, &mut StdRng::seed_from_u64(42)).unwrap();
        let b = simulator.simulate_outcome(&p, 2_000, &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_probabilities_are_fractions() {
        let simulator = OutcomeSimulator::default();
        let mut rng = StdRng::seed_from_u64(5);
        for treatment in Treatment::ALL {
            let summary = simulator.simulate_outcome(&patient(72.0, treatment), 1_000, &mut rng).unwrap();
            assert_eq!(summary.simulations, 1_000);
            assert!((0.0..=1.0).contains(&summary.probability_of_success));
            assert!((0.0..=1.0).contains(&summary.probability_of_complications));
            assert_eq!(summary.side_effect_severity, treatment.profile().side_effect_severity);
        }
    }

    #[test]
    fn test_success_probability_stable_across_runs() {
        let simulator = OutcomeSimulator::default();
        let p = patient(48.0, Treatment::StandardCare);

        let a = simulator.simulate_outcome(&p, 50_000, &mut StdRng::seed_from_u64(1)).unwrap();
        let b = simulator.simulate_outcome(&p, 50_000, &mut StdRng::seed_from_u64(2)).unwrap();
        assert!((a.probability_of_success - b.probability_of_success).abs() < 0.02);
        assert!((a.probability_of_complications - b.probability_of_complications).abs() < 0.02);
    }

    #[test]
    fn test_statistic_bundles_are_ordered() {
        let simulator = OutcomeSimulator::default();
        let summary = simulator
            .simulate_outcome(&patient(65.0, Treatment::IntensiveTherapy), 5_000, &mut StdRng::seed_from_u64(8))
            .unwrap();

        for stats in [&summary.final_severity, &summary.severity_reduction] {
            assert!(stats.percentile_5 <= stats.percentile_25);
            assert!(stats.percentile_25 <= stats.median);
            assert!(stats.median <= stats.percentile_75);
            assert!(stats.percentile_75 <= stats.percentile_95);
        }
        let recovery = &summary.recovery_time;
        assert!(recovery.percentile_5 >= 20.0 && recovery.percentile_95 <= 90.0);
        assert!(recovery.percentile_75 <= recovery.percentile_90);
        assert_relative_eq!(
            summary.final_severity.mean + summary.severity_reduction.mean,
            65.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_recovery_mean_matches_triangular() {
        let simulator = OutcomeSimulator::default();
        let summary = simulator
            .simulate_outcome(&patient(40.0, Treatment::StandardCare), 20_000, &mut StdRng::seed_from_u64(21))
            .unwrap();
        assert_relative_eq!(summary.recovery_time.mean, 70.0, epsilon = 1.0);
    }

    #[test]
    fn test_zero_severity_is_degenerate() {
        let simulator = OutcomeSimulator::default();
        let mut rng = StdRng::seed_from_u64(42);
        for treatment in Treatment::ALL {
            let summary = simulator.simulate_outcome(&patient(0.0, treatment), 1_000, &mut rng).unwrap();
            assert_relative_eq!(summary.severity_reduction.mean, 0.0);
            assert_relative_eq!(summary.final_severity.mean, 0.0);
            // Success then hinges on avoiding complications alone
            assert_relative_eq!(
                summary.probability_of_success,
                1.0 - summary.probability_of_complications,
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_zero_trials_rejected() {
        let simulator = OutcomeSimulator::default();
        let mut rng = StdRng::seed_from_u64(0);
        let err = simulator.simulate_outcome(&patient(50.0, Treatment::StandardCare), 0, &mut rng).unwrap_err();
        assert!(matches!(err, SimError::InvalidParameter(_)));
    }

    #[test]
    fn test_compare_treatments_reproducible() {
        let simulator = OutcomeSimulator::default();
        let p = patient(66.0, Treatment::StandardCare);
        let comparison = simulator.compare_treatments(&p, 1_000, 99).unwrap();

        assert_eq!(comparison.len(), Treatment::ALL.len());
        assert_eq!(p.treatment, Treatment::StandardCare);

        for treatment in Treatment::ALL {
            let mut retargeted = p.clone();
            retargeted.treatment = treatment;
            let direct = simulator
                .simulate_outcome(&retargeted, 1_000, &mut StdRng::seed_from_u64(99))
                .unwrap();
            assert_eq!(comparison[&treatment], direct);
            assert_eq!(comparison[&treatment].treatment, treatment);
        }
    }

    #[test]
    fn test_compare_trial_sets_match_summaries() {
        let simulator = OutcomeSimulator::default();
        let p = patient(55.0, Treatment::IntensiveTherapy);
        let summaries = simulator.compare_treatments(&p, 500, 17).unwrap();
        let trial_sets = simulator.compare_trial_sets(&p, 500, 17).unwrap();

        assert_eq!(trial_sets.len(), Treatment::ALL.len());
        for (treatment, trials) in &trial_sets {
            assert_eq!(trials.len(), 500);
            assert_eq!(trials.treatment, *treatment);
            assert_eq!(&trials.summarize(), &summaries[treatment]);
            assert!(trials.value_at_risk(0.95).is_ok());
        }
    }

    #[test]
    fn test_value_at_risk_from_trials() {
        let simulator = OutcomeSimulator::default();
        let trials = simulator
            .simulate_trials(&patient(70.0, Treatment::IntensiveTherapy), 5_000, &mut StdRng::seed_from_u64(4))
            .unwrap();
        let summary = trials.summarize();
        let var = trials.value_at_risk(0.95).unwrap();

        assert_relative_eq!(var.var_score, summary.final_severity.percentile_95);
        assert!(var.expected_improvement > 0.0);
    }

    #[test]
    fn test_simulate_cohort_sampling() {
        let mut rng = StdRng::seed_from_u64(42);
        let patients = CohortGenerator::default().generate_base_population(30, &mut rng).unwrap();
        let simulator = OutcomeSimulator::default();

        let sampled = simulator.simulate_cohort(&patients, 200, Some(10), &mut rng).unwrap();
        assert_eq!(sampled.len(), 10);
        let mut ids: Vec<&str> = sampled.iter().map(|s| s.patient_id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 10);

        let capped = simulator.simulate_cohort(&patients, 200, Some(500), &mut rng).unwrap();
        assert_eq!(capped.len(), 30);
        assert!(capped.iter().zip(&patients).all(|(s, p)| s.patient_id == p.patient_id && s.treatment == p.treatment));
    }

    #[test]
    fn test_simulate_cohort_failure_policies() {
        let mut patients = vec![
            patient(40.0, Treatment::StandardCare),
            patient(150.0, Treatment::StandardCare),
            patient(60.0, Treatment::IntensiveTherapy),
        ];
        patients[1].patient_id = "PT000043".to_string();

        let fail_fast = OutcomeSimulator::new(FailurePolicy::FailFast);
        let err = fail_fast
            .simulate_cohort(&patients, 100, None, &mut StdRng::seed_from_u64(3))
            .unwrap_err();
        assert!(matches!(err, SimError::InvalidParameter(_)));

        let skipping = OutcomeSimulator::new(FailurePolicy::SkipAndWarn);
        let results = skipping
            .simulate_cohort(&patients, 100, None, &mut StdRng::seed_from_u64(3))
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.patient_id != "PT000043"));
    }

    #[test]
    fn test_simulate_cohort_reproducible() {
        let mut rng = StdRng::seed_from_u64(12);
        let patients = CohortGenerator::default().generate_base_population(8, &mut rng).unwrap();
        let simulator = OutcomeSimulator::default();

        let a = simulator.simulate_cohort(&patients, 300, None, &mut StdRng::seed_from_u64(5)).unwrap();
        let b = simulator.simulate_cohort(&patients, 300, None, &mut StdRng::seed_from_u64(5)).unwrap();
        assert_eq!(a, b);
    }
}
