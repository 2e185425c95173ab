pub mod patient;

use crate::config::SeverityPolicy;
use crate::error::{distribution_error, SimError, SimResult};
use crate::statistics::percentile;
use crate::treatment::Treatment;
use log::{debug, info};
use rand::distributions::WeightedIndex;
use rand::Rng;
use rand_distr::{Distribution, Gamma, Normal};

pub use patient::*;

#[derive(Debug, Clone, Copy)]
struct Jitter {
    bmi: f64,
    systolic: f64,
    diastolic: f64,
    glucose: f64,
    hba1c: f64,
}

const HIGH_SEVERITY_JITTER: Jitter = Jitter {
    bmi: 2.0,
    systolic: 5.0,
    diastolic: 3.0,
    glucose: 8.0,
    hba1c: 0.2,
};

const LOW_SEVERITY_JITTER: Jitter = Jitter {
    bmi: 1.5,
    systolic: 4.0,
    diastolic: 2.0,
    glucose: 5.0,
    hba1c: 0.15,
};

// Disease probabilities (Type 2 Diabetes, Hypertension, Both) per risk bucket.
const LOW_RISK_DISEASE: [f64; 3] = [0.5, 0.45, 0.05];
const MODERATE_RISK_DISEASE: [f64; 3] = [0.4, 0.4, 0.2];
const HIGH_RISK_DISEASE: [f64; 3] = [0.3, 0.3, 0.4];

const MALE_PROBABILITY: f64 = 0.48;

#[derive(Debug, Clone, Default)]
pub struct CohortGenerator {
    severity_policy: SeverityPolicy,
}

impl CohortGenerator {
    pub fn new(severity_policy: SeverityPolicy) -> Self {
        Self { severity_policy }
    }

    pub fn generate_cohort<R: Rng + ?Sized>(
        &self,
        n_patients: usize,
        amplify: bool,
        amplification_factor: f64,
        rng: &mut R,
    ) -> SimResult<Vec<Patient>> {
        let base = self.generate_base_population(n_patients, rng)?;

        if amplify {
            self.amplify_edge_cases(&base, amplification_factor, rng)
        } else {
            Ok(base)
        }
    }

    pub fn generate_base_population<R: Rng + ?Sized>(
        &self,
        n_patients: usize,
        rng: &mut R,
    ) -> SimResult<Vec<Patient>> {
        info!("Generating base population of {} patients", n_patients);

        let age_dist = Gamma::<f64>::new(8.0, 7.0).map_err(distribution_error)?;
        let bmi_dist = Normal::new(28.0, 5.0).map_err(distribution_error)?;
        let systolic_noise = Normal::new(0.0, 8.0).map_err(distribution_error)?;
        let diastolic_noise = Normal::new(0.0, 5.0).map_err(distribution_error)?;
        let glucose_noise = Normal::new(0.0, 12.0).map_err(distribution_error)?;
        let hba1c_noise = Normal::new(0.0, 0.3).map_err(distribution_error)?;

        let disease_tables = [
            WeightedIndex::new(LOW_RISK_DISEASE).map_err(distribution_error)?,
            WeightedIndex::new(MODERATE_RISK_DISEASE).map_err(distribution_error)?,
            WeightedIndex::new(HIGH_RISK_DISEASE).map_err(distribution_error)?,
        ];

        let mut patients = Vec::with_capacity(n_patients);

        for index in 1..=n_patients {
            let age_draw: f64 = age_dist.sample(rng) + 30.0;
            let age = age_draw.clamp(AGE_RANGE.0 as f64, AGE_RANGE.1 as f64) as u32;
            let age_offset = age as f64 - 50.0;

            let gender = if rng.gen_bool(MALE_PROBABILITY) {
                Gender::Male
            } else {
                Gender::Female
            };

            let bmi = clamp_range(bmi_dist.sample(rng) + age_offset * 0.05, BMI_RANGE);
            let systolic = clamp_range(
                110.0 + (bmi - 25.0) * 1.2 + age_offset * 0.3 + systolic_noise.sample(rng),
                SYSTOLIC_RANGE,
            );
            let diastolic = clamp_range(
                70.0 + (bmi - 25.0) * 0.6 + age_offset * 0.15 + diastolic_noise.sample(rng),
                DIASTOLIC_RANGE,
            );
            let glucose = clamp_range(
                95.0 + (bmi - 25.0) * 1.5 + glucose_noise.sample(rng),
                GLUCOSE_RANGE,
            );
            let hba1c = clamp_range(
                5.5 + (glucose - 100.0) * 0.015 + hba1c_noise.sample(rng),
                HBA1C_RANGE,
            );

            let risk = risk_factor_count(bmi, systolic, glucose);
            let disease = Disease::ALL[disease_tables[risk_bucket(risk)].sample(rng)];
            let treatment = Treatment::ALL[rng.gen_range(0..Treatment::ALL.len())];
            let severity = severity_score(bmi, systolic, glucose, hba1c);

            patients.push(Patient {
                patient_id: format!("PT{:06}", index),
                age,
                gender,
                bmi: round_to(bmi, 1),
                baseline_systolic: round_to(systolic, 0),
                baseline_diastolic: round_to(diastolic, 0),
                baseline_glucose: round_to(glucose, 0),
                baseline_hba1c: round_to(hba1c, 2),
                disease,
                treatment,
                baseline_severity: round_to(severity, 1),
            });
        }

        debug!("Base population complete ({} rows)", patients.len());
        Ok(patients)
    }

    /// Appends perturbed copies of the most and least severe patients.
    pub fn amplify_edge_cases<R: Rng + ?Sized>(
        &self,
        patients: &[Patient],
        amplification_factor: f64,
        rng: &mut R,
    ) -> SimResult<Vec<Patient>> {
        if !amplification_factor.is_finite() || amplification_factor < 0.0 {
            return Err(SimError::InvalidParameter(format!(
                "Amplification factor must be a non-negative number, got {}",
                amplification_factor
            )));
        }

        let n_synthetic = (patients.len() as f64 * amplification_factor).floor() as usize;
        let mut amplified = patients.to_vec();
        if n_synthetic == 0 {
            return Ok(amplified);
        }

        let severities: Vec<f64> = patients.iter().map(|p| p.baseline_severity).collect();
        let high_cutoff = percentile(&severities, 90.0);
        let low_cutoff = percentile(&severities, 10.0);

        let high_pool: Vec<&Patient> = patients
            .iter()
            .filter(|p| p.baseline_severity >= high_cutoff)
            .collect();
        let low_pool: Vec<&Patient> = patients
            .iter()
            .filter(|p| p.baseline_severity <= low_cutoff)
            .collect();

        let n_high = n_synthetic / 2;
        let n_low = n_synthetic - n_high;

        if n_high > 0 && high_pool.is_empty() {
            return Err(SimError::EmptyPool("high"));
        }
        if n_low > 0 && low_pool.is_empty() {
            return Err(SimError::EmptyPool("low"));
        }

        info!(
            "Amplifying {} patients: {} high-severity (>= {:.1}), {} low-severity (<= {:.1})",
            n_synthetic, n_high, high_cutoff, n_low, low_cutoff
        );

        let mut next_id = 1;
        for (pool, count, jitter) in [
            (&high_pool, n_high, HIGH_SEVERITY_JITTER),
            (&low_pool, n_low, LOW_SEVERITY_JITTER),
        ] {
            for _ in 0..count {
                let source = pool[rng.gen_range(0..pool.len())];
                let id = format!("SYN{:06}", next_id);
                next_id += 1;
                amplified.push(self.synthesize(source, id, jitter, rng)?);
            }
        }

        Ok(amplified)
    }

    fn synthesize<R: Rng + ?Sized>(
        &self,
        source: &Patient,
        patient_id: String,
        jitter: Jitter,
        rng: &mut R,
    ) -> SimResult<Patient> {
        let age_shift: i64 = rng.gen_range(-5..5);
        let age = (source.age as i64 + age_shift).clamp(AGE_RANGE.0 as i64, AGE_RANGE.1 as i64) as u32;

        let mut patient = Patient {
            patient_id,
            age,
            bmi: round_to(clamp_range(source.bmi + noise(jitter.bmi, rng)?, BMI_RANGE), 1),
            baseline_systolic: round_to(
                clamp_range(source.baseline_systolic + noise(jitter.systolic, rng)?, SYSTOLIC_RANGE),
                0,
            ),
            baseline_diastolic: round_to(
                clamp_range(source.baseline_diastolic + noise(jitter.diastolic, rng)?, DIASTOLIC_RANGE),
                0,
            ),
            baseline_glucose: round_to(
                clamp_range(source.baseline_glucose + noise(jitter.glucose, rng)?, GLUCOSE_RANGE),
                0,
            ),
            baseline_hba1c: round_to(
                clamp_range(source.baseline_hba1c + noise(jitter.hba1c, rng)?, HBA1C_RANGE),
                2,
            ),
            ..source.clone()
        };

        if self.severity_policy == SeverityPolicy::Recompute {
            patient.recompute_severity();
        }

        Ok(patient)
    }
}

/// Number of threshold indicators met: BMI > 30, systolic > 140, glucose > 126.
pub fn risk_factor_count(bmi: f64, systolic: f64, glucose: f64) -> u8 {
    (bmi > 30.0) as u8 + (systolic > 140.0) as u8 + (glucose > 126.0) as u8
}

// Each risk factor past the first moves up one table, so risk 3 reaches the high table.
fn risk_bucket(risk: u8) -> usize {
    match risk {
        0 | 1 => 0,
        2 => 1,
        _ => 2,
    }
}

fn noise<R: Rng + ?Sized>(std_dev: f64, rng: &mut R) -> SimResult<f64> {
    let normal = Normal::new(0.0, std_dev).map_err(distribution_error)?;
    Ok(normal.sample(rng))
}

fn clamp_range(value: f64, (lower, upper): (f64, f64)) -> f64 {
    value.clamp(lower, upper)
}
