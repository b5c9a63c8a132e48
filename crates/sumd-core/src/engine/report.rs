//! Persisted artifacts: the per-iteration text summary and the end-of-run
//! `report.toml` / `distances.csv`.

use crate::engine::error::EngineError;
use crate::engine::state::{IterationOutcome, RunState, RunStatus, SampleResult, StageCounts};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub const ITERATION_SUMMARY_FILE: &str = "iteration_summary.txt";
pub const REPORT_FILE: &str = "report.toml";
pub const DISTANCES_FILE: &str = "distances.csv";

fn format_distance(distance: Option<f64>) -> String {
    match distance {
        Some(d) if d.is_finite() => format!("{d:.4} nm"),
        Some(_) => "inf".to_string(),
        None => "n/a".to_string(),
    }
}

/// Renders the human-readable summary of one iteration.
pub fn render_iteration_summary(outcome: &IterationOutcome) -> String {
    let counts = outcome.counts();
    let mut out = String::new();
    let _ = writeln!(out, "Iteration {}", outcome.iteration_index());
    let _ = writeln!(out, "Samples: {}", counts.total());
    let _ = writeln!(out, "  MINIMIZED_AND_RUN: {}", counts.minimized_and_run);
    let _ = writeln!(out, "  MINIMIZED: {}", counts.minimized);
    let _ = writeln!(out, "  FAILED: {}", counts.failed);

    match outcome.best() {
        Some(best) => {
            let _ = writeln!(
                out,
                "Best: sample {} at {}",
                best.sample_id(),
                format_distance(best.final_distance())
            );
            if let Some(structure) = best.final_structure() {
                let _ = writeln!(out, "Best structure: {}", structure);
            }
        }
        None => {
            let _ = writeln!(out, "Best: none");
        }
    }

    let _ = writeln!(out);
    for result in outcome.results() {
        let _ = write!(
            out,
            "sample {:>4}  {:<17}  {} -> {}",
            result.sample_id(),
            result.stage_reached().to_string(),
            format_distance(result.initial_distance()),
            format_distance(result.final_distance()),
        );
        if let Some(error) = result.error() {
            let _ = write!(out, "  error: {}", error.lines().last().unwrap_or(error));
        }
        let _ = writeln!(out);
    }
    out
}

/// Writes `iteration_summary.txt` into `dir`.
pub async fn write_iteration_summary(
    outcome: &IterationOutcome,
    dir: &Path,
) -> std::io::Result<PathBuf> {
    let path = dir.join(ITERATION_SUMMARY_FILE);
    tokio::fs::write(&path, render_iteration_summary(outcome)).await?;
    Ok(path)
}

/// One row of `distances.csv` and one `[[iterations]]` table of `report.toml`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IterationRecord {
    pub iteration: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_sample: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_distance_nm: Option<f64>,
    pub minimized_and_run: usize,
    pub minimized: usize,
    pub failed: usize,
}

impl IterationRecord {
    fn from_outcome(outcome: &IterationOutcome) -> Self {
        let StageCounts {
            failed,
            minimized,
            minimized_and_run,
        } = outcome.counts();
        Self {
            iteration: outcome.iteration_index(),
            best_sample: outcome.best().map(SampleResult::sample_id),
            best_distance_nm: outcome.best_distance(),
            minimized_and_run,
            minimized,
            failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureRecord {
    pub iteration: usize,
    pub sample: usize,
    pub error: String,
}

/// The final disposition of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub iterations: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_distance_nm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_iteration: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_sample: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_structure: Option<PathBuf>,
    #[serde(rename = "iteration")]
    pub history: Vec<IterationRecord>,
    /// Sample diagnostics of the last iteration when the run was aborted.
    #[serde(rename = "failure", skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FailureRecord>,
}

impl RunReport {
    /// Summarizes a terminal run state.
    ///
    /// The best structure is the most recent iteration best; it is `None` when
    /// no iteration produced one.
    pub fn from_state(state: &RunState) -> Self {
        let latest = state
            .history()
            .iter()
            .rev()
            .find_map(|o| o.best().map(|b| (o.iteration_index(), b)));

        let failures = match (state.status(), state.history().last()) {
            (RunStatus::Aborted, Some(last)) => last
                .errors()
                .map(|(sample, error)| FailureRecord {
                    iteration: last.iteration_index(),
                    sample,
                    error: error.to_string(),
                })
                .collect(),
            _ => Vec::new(),
        };

        Self {
            status: state.status(),
            iterations: state.iteration_index(),
            best_distance_nm: latest.and_then(|(_, b)| b.final_distance()),
            best_iteration: latest.map(|(i, _)| i),
            best_sample: latest.map(|(_, b)| b.sample_id()),
            best_structure: latest
                .and_then(|(_, b)| b.final_structure())
                .map(|s| s.path().to_path_buf()),
            history: state.history().iter().map(IterationRecord::from_outcome).collect(),
            failures,
        }
    }

    pub fn write_toml(&self, path: &Path) -> Result<(), EngineError> {
        let text = toml::to_string_pretty(self).map_err(|e| EngineError::Report {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        std::fs::write(path, text)
            .map_err(|e| EngineError::io(format!("writing {}", path.display()), e))
    }

    pub fn write_distances_csv(&self, path: &Path) -> Result<(), EngineError> {
        let report_err = |e: csv::Error| EngineError::Report {
            path: path.to_path_buf(),
            message: e.to_string(),
        };
        let mut writer = csv::Writer::from_path(path).map_err(report_err)?;
        for record in &self.history {
            writer.serialize(CsvRow::from(record)).map_err(report_err)?;
        }
        writer
            .flush()
            .map_err(|e| EngineError::io(format!("writing {}", path.display()), e))
    }
}

/// `distances.csv` keeps every column even when a value is missing.
#[derive(Serialize)]
struct CsvRow {
    iteration: usize,
    best_sample: Option<usize>,
    best_distance_nm: Option<f64>,
    minimized_and_run: usize,
    minimized: usize,
    failed: usize,
}

impl From<&IterationRecord> for CsvRow {
    fn from(r: &IterationRecord) -> Self {
        Self {
            iteration: r.iteration,
            best_sample: r.best_sample,
            best_distance_nm: r.best_distance_nm,
            minimized_and_run: r.minimized_and_run,
            minimized: r.minimized,
            failed: r.failed,
        }
    }
}
