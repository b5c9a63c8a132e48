use crate::cli::RunArgs;
use crate::config::PartialRunConfig;
use crate::config::defaults::OUTPUT_DIR_TIMESTAMP_FORMAT;
use crate::error::Result;
use crate::ui::{CliProgressHandler, UiEvent};
use chrono::{DateTime, Local};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sumd::engine::progress::ProgressReporter;
use sumd::engine::report::REPORT_FILE;
use sumd::engine::stage::gromacs::GromacsEngine;
use sumd::engine::state::RunStatus;
use sumd::workflows;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub async fn run(args: RunArgs, ui_sender: mpsc::Sender<UiEvent>) -> Result<RunStatus> {
    let partial_config = match &args.config {
        Some(path) => PartialRunConfig::from_file(path)?,
        None => PartialRunConfig::default(),
    };
    info!("Merging configuration from file and CLI arguments...");
    let mut config = partial_config.merge_with_cli(&args)?;

    if !args.exact_output_dir {
        config.output_dir = timestamped_output_dir(&config.output_dir, Local::now());
    }
    info!("Run directory: {}", config.output_dir.display());

    let engine = Arc::new(GromacsEngine::new(config.engine.clone()));
    let progress_handler = CliProgressHandler::new(ui_sender);
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Starting SuMD run: {} samples per iteration, up to {} iterations.",
        config.sampling.num_samples, config.convergence.max_iterations
    );
    let report = workflows::sumd::run(&config, engine, &reporter).await?;

    println!(
        "Run finished with status {} after {} iteration(s).",
        report.status, report.iterations
    );
    match (&report.best_structure, report.best_distance_nm) {
        (Some(path), Some(distance)) => {
            println!(
                "✓ Best structure ({:.4} nm) written to: {}",
                distance,
                path.display()
            );
            println!("SUMD_RESULT:{}:{:.4}", path.display(), distance);
        }
        _ => {
            warn!("The run produced no usable structure.");
            for failure in &report.failures {
                println!(
                    "  iteration {} sample {}: {}",
                    failure.iteration, failure.sample, failure.error
                );
            }
        }
    }
    println!(
        "Report written to: {}",
        config.output_dir.join(REPORT_FILE).display()
    );

    Ok(report.status)
}

/// Appends a local timestamp to the final path component, e.g.
/// `sumd_output` -> `sumd_output_20261016_093000`.
pub fn timestamped_output_dir(base: &Path, now: DateTime<Local>) -> PathBuf {
    let mut name = base
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from(crate::config::defaults::DEFAULT_OUTPUT_DIR));
    name.push(now.format(OUTPUT_DIR_TIMESTAMP_FORMAT).to_string());
    base.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 7, 9, 5, 1).unwrap()
    }

    #[test]
    fn timestamp_is_appended_to_the_last_component() {
        let dir = timestamped_output_dir(Path::new("runs/sumd_output"), fixed_time());
        assert_eq!(dir, PathBuf::from("runs/sumd_output_20260307_090501"));
    }

    #[test]
    fn bare_directory_name_is_timestamped() {
        let dir = timestamped_output_dir(Path::new("out"), fixed_time());
        assert_eq!(dir, PathBuf::from("out_20260307_090501"));
    }
}
