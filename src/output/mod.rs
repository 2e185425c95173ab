use crate::analysis::{CohortSummary, ConfidenceInterval, Metric, ResultsAnalyzer, RiskStratum, TreatmentComparison};
use crate::cohort::Patient;
use crate::error::SimResult;
use crate::simulation::OutcomeSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use log::{info, warn};

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub generated_at: DateTime<Utc>,
    pub summary: CohortSummary,
    pub treatment_comparison: Vec<TreatmentComparison>,
    pub risk_strata: Vec<RiskStratum>,
    pub confidence_intervals: Vec<ConfidenceInterval>,
}

impl AnalysisReport {
    pub fn build(results: &[OutcomeSummary], metric: Metric, confidence_level: f64) -> SimResult<Self> {
        let analyzer = ResultsAnalyzer::new(results);

        let confidence_intervals = match analyzer.confidence_intervals(metric, confidence_level) {
            Ok(intervals) => intervals,
            Err(err @ crate::error::SimError::InsufficientSample { .. }) => {
                warn!("Skipping confidence intervals: {}", err);
                Vec::new()
            }
            Err(err) => return Err(err),
        };

        Ok(Self {
            generated_at: Utc::now(),
            summary: analyzer.summarize(),
            treatment_comparison: analyzer.compare_treatments(),
            risk_strata: analyzer.stratify_by_risk(),
            confidence_intervals,
        })
    }
}

pub fn save_patients<P: AsRef<Path>>(patients: &[Patient], path: P) -> SimResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for patient in patients {
        writer.serialize(patient)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn load_patients<P: AsRef<Path>>(path: P) -> SimResult<Vec<Patient>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut patients = Vec::new();
    for record in reader.deserialize() {
        patients.push(record?);
    }
    Ok(patients)
}

pub fn save_results<P: AsRef<Path>>(results: &[OutcomeSummary], output_dir: P) -> SimResult<()> {
    let output_path = output_dir.as_ref();

    save_results_json(results, output_path.join("results.json"))?;
    save_results_table(results, output_path.join("results.csv"))?;
    save_detailed_report(results, output_path.join("detailed_report.csv"))?;

    info!("Simulation results saved to {:?}", output_path);
    Ok(())
}

pub fn load_results<P: AsRef<Path>>(path: P) -> SimResult<Vec<OutcomeSummary>> {
    let file = File::open(path)?;
    let results = serde_json::from_reader(file)?;
    Ok(results)
}

fn save_results_json<P: AsRef<Path>>(results: &[OutcomeSummary], path: P) -> SimResult<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, results)?;
    Ok(())
}

fn save_results_table<P: AsRef<Path>>(results: &[OutcomeSummary], path: P) -> SimResult<()> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec![
        "patient_id".to_string(),
        "treatment".to_string(),
        "baseline_severity".to_string(),
        "simulations".to_string(),
    ];
    for bundle in ["final_severity", "severity_reduction"] {
        for stat in ["mean", "median", "std", "p5", "p25", "p75", "p95"] {
            header.push(format!("{}_{}", bundle, stat));
        }
    }
    for stat in ["mean", "median", "std", "p5", "p25", "p50", "p75", "p90", "p95"] {
        header.push(format!("recovery_time_{}", stat));
    }
    header.extend([
        "probability_of_success".to_string(),
        "probability_of_complications".to_string(),
        "expected_efficacy".to_string(),
        "side_effect_severity".to_string(),
    ]);
    writer.write_record(&header)?;

    for r in results {
        let mut record = vec![
            r.patient_id.clone(),
            r.treatment.to_string(),
            r.baseline_severity.to_string(),
            r.simulations.to_string(),
        ];
        for s in [&r.final_severity, &r.severity_reduction] {
            record.extend([s.mean, s.median, s.std, s.percentile_5, s.percentile_25, s.percentile_75, s.percentile_95]
                .iter()
                .map(|v| v.to_string()));
        }
        let rt = &r.recovery_time;
        record.extend([
            rt.mean, rt.median, rt.std, rt.percentile_5, rt.percentile_25,
            rt.percentile_50, rt.percentile_75, rt.percentile_90, rt.percentile_95,
        ].iter().map(|v| v.to_string()));
        record.extend([
            r.probability_of_success,
            r.probability_of_complications,
            r.expected_efficacy,
            r.side_effect_severity,
        ].iter().map(|v| v.to_string()));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

fn save_detailed_report<P: AsRef<Path>>(results: &[OutcomeSummary], path: P) -> SimResult<()> {
    let mut writer = csv::Writer::from_path(path)?;

    writer.write_record(&[
        "Patient_ID", "Treatment", "Baseline_Severity",
        "Mean_Final_Severity", "Median_Final_Severity",
        "Mean_Severity_Reduction", "P5_Severity_Reduction", "P95_Severity_Reduction",
        "Mean_Recovery_Days", "Median_Recovery_Days", "P90_Recovery_Days",
        "Success_Probability", "Complication_Probability", "Expected_Efficacy",
    ])?;

    for r in results {
        writer.write_record(&[
            r.patient_id.clone(),
            r.treatment.to_string(),
            format!("{:.1}", r.baseline_severity),
            format!("{:.2}", r.final_severity.mean),
            format!("{:.2}", r.final_severity.median),
            format!("{:.2}", r.severity_reduction.mean),
            format!("{:.2}", r.severity_reduction.percentile_5),
            format!("{:.2}", r.severity_reduction.percentile_95),
            format!("{:.1}", r.recovery_time.mean),
            format!("{:.1}", r.recovery_time.median),
            format!("{:.1}", r.recovery_time.percentile_90),
            format!("{:.4}", r.probability_of_success),
            format!("{:.4}", r.probability_of_complications),
            format!("{:.4}", r.expected_efficacy),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

pub fn save_analysis<P: AsRef<Path>>(report: &AnalysisReport, output_dir: P) -> SimResult<()> {
    let output_path = output_dir.as_ref();

    let file = File::create(output_path.join("analysis.json"))?;
    serde_json::to_writer_pretty(file, report)?;

    std::fs::write(output_path.join("analysis_report.md"), render_report(report))?;

    info!("Analysis saved to {:?}", output_path);
    Ok(())
}

pub fn render_report(report: &AnalysisReport) -> String {
    let summary = &report.summary;
    let mut out = format!(
        r#"# Treatment Outcome Simulation Report

Generated: {}

## Cohort Overview
- **Patients simulated**: {}
- **Mean success rate**: {:.1}%
- **Mean complication rate**: {:.1}%
- **High-risk patients** (severity > 70): {}
- **Low-risk patients** (severity < 30): {}

## Success Rate by Treatment
| Treatment | Patients | Mean | Std | Median |
|---|---|---|---|---|
"#,
        report.generated_at.to_rfc3339(),
        summary.total_patients,
        summary.mean_success_rate * 100.0,
        summary.mean_complication_rate * 100.0,
        summary.high_risk_patients,
        summary.low_risk_patients,
    );

    for t in &summary.treatments {
        out.push_str(&format!(
            "| {} | {} | {:.3} | {:.3} | {:.3} |\n",
            t.treatment, t.patients, t.mean, t.std, t.median
        ));
    }

    out.push_str("\n## Treatment Ranking\n| Rank | Treatment | Patients | Success | Complications | Recovery (days) | Severity Reduction |\n|---|---|---|---|---|---|---|\n");
    for (rank, row) in report.treatment_comparison.iter().enumerate() {
        out.push_str(&format!(
            "| {} | {} | {} | {:.3} | {:.3} | {:.1} | {:.1} |\n",
            rank + 1,
            row.treatment,
            row.n_patients,
            row.mean_success_rate,
            row.mean_complication_rate,
            row.mean_recovery_days,
            row.mean_severity_reduction,
        ));
    }

    out.push_str("\n## Risk Stratification\n| Band | Patients | Success | Complications | Recovery (days) | Baseline Severity |\n|---|---|---|---|---|---|\n");
    for stratum in &report.risk_strata {
        out.push_str(&format!(
            "| {} | {} | {:.3} | {:.3} | {:.1} | {:.1} |\n",
            stratum.band,
            stratum.n_patients,
            stratum.mean_success_rate,
            stratum.mean_complication_rate,
            stratum.mean_recovery_time,
            stratum.mean_baseline_severity,
        ));
    }

    if !report.confidence_intervals.is_empty() {
        out.push_str(&format!(
            "\n## Confidence Intervals ({})\n| Treatment | N | Mean | Lower | Upper | Margin |\n|---|---|---|---|---|---|\n",
            report.confidence_intervals[0].metric
        ));
        for ci in &report.confidence_intervals {
            out.push_str(&format!(
                "| {} | {} | {:.4} | {:.4} | {:.4} | {:.4} |\n",
                ci.treatment, ci.n, ci.mean, ci.lower, ci.upper, ci.margin_of_error
            ));
        }
    }

    out
}
