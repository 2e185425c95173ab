use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};

mod analysis;
mod cohort;
mod config;
mod error;
mod output;
mod simulation;
mod statistics;
mod treatment;

use crate::analysis::Metric;
use crate::cohort::CohortGenerator;
use crate::config::{Config, FailurePolicy, SeverityPolicy};
use crate::output::AnalysisReport;
use crate::simulation::OutcomeSimulator;

#[derive(Parser)]
#[command(name = "treatment_outcomes")]
#[command(about = "Monte Carlo treatment outcome simulation for synthetic patient cohorts")]
struct Cli {
    /// JSON configuration file; built-in defaults are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Random seed for reproducibility
    #[arg(short, long, global = true)]
    seed: Option<u64>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a synthetic patient roster
    Generate {
        #[command(flatten)]
        cohort: CohortArgs,

        /// Output CSV file
        #[arg(short, long, default_value = "patients.csv")]
        output: PathBuf,
    },
    /// Simulate outcomes for every patient of a roster
    Simulate {
        /// Patient roster CSV
        #[arg(short, long)]
        patients: PathBuf,

        #[command(flatten)]
        simulation: SimulationArgs,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Aggregate previously saved simulation results
    Analyze {
        /// results.json written by `simulate`
        #[arg(short, long)]
        results: PathBuf,

        #[command(flatten)]
        analysis: AnalysisArgs,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Compare every treatment for one patient of a roster
    Compare {
        /// Patient roster CSV
        #[arg(short, long)]
        patients: PathBuf,

        /// Identifier of the patient to compare
        #[arg(long)]
        patient_id: String,

        /// Trials per treatment
        #[arg(short, long)]
        trials: Option<usize>,

        /// Confidence level for the value-at-risk estimate
        #[arg(long, default_value = "0.95")]
        var_confidence: f64,
    },
    /// Generate, simulate and analyze in one pass
    Run {
        #[command(flatten)]
        cohort: CohortArgs,

        #[command(flatten)]
        simulation: SimulationArgs,

        #[command(flatten)]
        analysis: AnalysisArgs,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(clap::Args)]
struct CohortArgs {
    /// Number of base patients
    #[arg(short = 'n', long)]
    n_patients: Option<usize>,

    /// Skip edge-case amplification
    #[arg(long)]
    no_amplify: bool,

    /// Share of synthetic edge-case patients to add
    #[arg(long)]
    amplification_factor: Option<f64>,

    /// Re-score severity of amplified patients after perturbation
    #[arg(long)]
    recompute_severity: bool,
}

#[derive(clap::Args)]
struct SimulationArgs {
    /// Monte Carlo trials per patient
    #[arg(short, long)]
    trials: Option<usize>,

    /// Simulate a random subset of this many patients
    #[arg(long)]
    sample_size: Option<usize>,

    /// Log and skip patients that cannot be simulated instead of aborting
    #[arg(long)]
    skip_failures: bool,
}

#[derive(clap::Args)]
struct AnalysisArgs {
    /// Metric for confidence intervals
    #[arg(long)]
    metric: Option<Metric>,

    /// Confidence level for intervals
    #[arg(long)]
    confidence: Option<f64>,
}

impl CohortArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(n) = self.n_patients {
            config.cohort.n_patients = n;
        }
        if self.no_amplify {
            config.cohort.amplify = false;
        }
        if let Some(factor) = self.amplification_factor {
            config.cohort.amplification_factor = factor;
        }
        if self.recompute_severity {
            config.cohort.severity_policy = SeverityPolicy::Recompute;
        }
    }
}

impl SimulationArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(trials) = self.trials {
            config.simulation.num_trials = trials;
        }
        if self.sample_size.is_some() {
            config.simulation.sample_size = self.sample_size;
        }
        if self.skip_failures {
            config.simulation.failure_policy = FailurePolicy::SkipAndWarn;
        }
    }
}

impl AnalysisArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(metric) = self.metric {
            config.analysis.metric = metric;
        }
        if let Some(level) = self.confidence {
            config.analysis.confidence_level = level;
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?,
        None => Config::default(),
    };
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }

    match config.seed {
        Some(seed) => info!("Random seed: {}", seed),
        None => info!("Random seed: from entropy"),
    }
    let mut rng = match config.seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };

    match &cli.command {
        Command::Generate { cohort, output: roster_path } => {
            cohort.apply(&mut config);
            config.validate()?;

            let patients = generate(&config, &mut rng)?;
            output::save_patients(&patients, roster_path)
                .with_context(|| format!("Failed to write roster to {:?}", roster_path))?;
            info!("Saved {} patients to {:?}", patients.len(), roster_path);
        }
        Command::Simulate { patients, simulation, output: output_dir } => {
            simulation.apply(&mut config);
            config.validate()?;

            let roster = output::load_patients(patients)
                .with_context(|| format!("Failed to read roster from {:?}", patients))?;
            simulate(&config, &roster, output_dir, &mut rng)?;
        }
        Command::Analyze { results, analysis, output: output_dir } => {
            analysis.apply(&mut config);
            config.validate()?;

            let summaries = output::load_results(results)
                .with_context(|| format!("Failed to read results from {:?}", results))?;
            analyze(&config, &summaries, output_dir)?;
        }
        Command::Compare { patients, patient_id, trials, var_confidence } => {
            if let Some(trials) = trials {
                config.simulation.num_trials = *trials;
            }
            config.validate()?;

            let roster = output::load_patients(patients)
                .with_context(|| format!("Failed to read roster from {:?}", patients))?;
            let Some(patient) = roster.iter().find(|p| &p.patient_id == patient_id) else {
                bail!("Patient {} not found in {:?}", patient_id, patients);
            };
            let seed = config.seed.unwrap_or_else(|| rng.gen());
            compare(&config, patient, seed, *var_confidence)?;
        }
        Command::Run { cohort, simulation, analysis, output: output_dir } => {
            cohort.apply(&mut config);
            simulation.apply(&mut config);
            analysis.apply(&mut config);
            config.validate()?;

            std::fs::create_dir_all(output_dir)?;
            let patients = generate(&config, &mut rng)?;
            output::save_patients(&patients, output_dir.join("patients.csv"))?;
            let summaries = simulate(&config, &patients, output_dir, &mut rng)?;
            analyze(&config, &summaries, output_dir)?;
        }
    }

    Ok(())
}

fn generate(config: &Config, rng: &mut StdRng) -> anyhow::Result<Vec<cohort::Patient>> {
    let generator = CohortGenerator::new(config.cohort.severity_policy);
    let patients = generator.generate_cohort(
        config.cohort.n_patients,
        config.cohort.amplify,
        config.cohort.amplification_factor,
        rng,
    )?;
    info!("Generated cohort of {} patients", patients.len());
    Ok(patients)
}

fn simulate(
    config: &Config,
    patients: &[cohort::Patient],
    output_dir: &Path,
    rng: &mut StdRng,
) -> anyhow::Result<Vec<simulation::OutcomeSummary>> {
    let simulator = OutcomeSimulator::new(config.simulation.failure_policy);
    let summaries = simulator.simulate_cohort(
        patients,
        config.simulation.num_trials,
        config.simulation.sample_size,
        rng,
    )?;
    if summaries.is_empty() {
        warn!("No patients were simulated");
    }

    std::fs::create_dir_all(output_dir)?;
    output::save_results(&summaries, output_dir)
        .with_context(|| format!("Failed to write results to {:?}", output_dir))?;
    Ok(summaries)
}

fn analyze(config: &Config, summaries: &[simulation::OutcomeSummary], output_dir: &Path) -> anyhow::Result<()> {
    let report = AnalysisReport::build(
        summaries,
        config.analysis.metric,
        config.analysis.confidence_level,
    )?;

    for (rank, row) in report.treatment_comparison.iter().enumerate() {
        info!(
            "#{} {}: success {:.1}%, complications {:.1}%, recovery {:.1} days",
            rank + 1,
            row.treatment,
            row.mean_success_rate * 100.0,
            row.mean_complication_rate * 100.0,
            row.mean_recovery_days
        );
    }

    std::fs::create_dir_all(output_dir)?;
    output::save_analysis(&report, output_dir)
        .with_context(|| format!("Failed to write analysis to {:?}", output_dir))?;
    Ok(())
}

fn compare(config: &Config, patient: &cohort::Patient, seed: u64, var_confidence: f64) -> anyhow::Result<()> {
    let simulator = OutcomeSimulator::new(config.simulation.failure_policy);
    let trials = config.simulation.num_trials;
    let comparison = simulator.compare_trial_sets(patient, trials, seed)?;

    println!(
        "Patient {} (age {}, BMI {:.1}, {}, baseline severity {:.1}, assigned {})",
        patient.patient_id, patient.age, patient.bmi, patient.disease,
        patient.baseline_severity, patient.treatment
    );
    println!(
        "{:<24} {:>9} {:>13} {:>15} {:>14} {:>10}",
        "Treatment", "Success", "Complications", "Recovery (d)", "Final sev.", "VaR"
    );

    for (treatment, trial_set) in &comparison {
        let summary = trial_set.summarize();
        let var = trial_set.value_at_risk(var_confidence)?;

        println!(
            "{:<24} {:>8.1}% {:>12.1}% {:>15.1} {:>14.1} {:>10.1}",
            treatment.name(),
            summary.probability_of_success * 100.0,
            summary.probability_of_complications * 100.0,
            summary.recovery_time.mean,
            summary.final_severity.mean,
            var.var_score,
        );
        info!("{}: {}", treatment, var.interpretation);
    }

    Ok(())
}
