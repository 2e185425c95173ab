use crate::error::{distribution_error, SimError, SimResult};
use crate::treatment::TreatmentProfile;
use rand::Rng;
use rand_distr::{Beta, Triangular};

pub const EFFICACY_CONCENTRATION: f64 = 10.0;

pub fn efficacy_distribution(mean_efficacy: f64) -> SimResult<Beta<f64>> {
    if !(mean_efficacy > 0.0 && mean_efficacy < 1.0) {
        return Err(SimError::InvalidParameter(format!(
            "Mean efficacy must lie in (0, 1), got {}",
            mean_efficacy
        )));
    }
    Beta::new(
        EFFICACY_CONCENTRATION * mean_efficacy,
        EFFICACY_CONCENTRATION * (1.0 - mean_efficacy),
    )
    .map_err(distribution_error)
}

pub fn recovery_distribution(profile: &TreatmentProfile) -> SimResult<Triangular<f64>> {
    Triangular::new(
        profile.recovery_days_optimistic,
        profile.recovery_days_pessimistic,
        profile.recovery_days_likely,
    )
    .map_err(distribution_error)
}

// Probabilities outside [0, 1] saturate instead of failing
pub fn draw_event<R: Rng + ?Sized>(probability: f64, rng: &mut R) -> bool {
    rng.gen::<f64>() < probability
}
