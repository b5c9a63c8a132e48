use crate::core::models::snapshot::StructureSnapshot;
use crate::engine::batch::{BatchRunner, IterationRunner};
use crate::engine::config::{ConvergenceConfig, SumdConfig};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::report::{DISTANCES_FILE, REPORT_FILE, RunReport};
use crate::engine::stage::StageEngine;
use crate::engine::state::{RunState, RunStatus};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Drives iterations until the run converges, exhausts its budget or aborts.
///
/// Each iteration starts from the previous iteration's best structure. The
/// returned state is terminal.
pub async fn run_loop<R>(
    runner: &R,
    input: StructureSnapshot,
    convergence: &ConvergenceConfig,
    reporter: &ProgressReporter<'_>,
) -> RunState
where
    R: IterationRunner + ?Sized,
{
    let mut state = RunState::initial(input);

    while !state.status().is_terminal() {
        let iteration_index = state.iteration_index() + 1;
        reporter.report(Progress::IterationStart {
            index: iteration_index,
            max_iterations: convergence.max_iterations,
        });
        info!(
            iteration = iteration_index,
            "Starting iteration from {}.",
            state.current_structure()
        );

        let outcome = runner
            .run_iteration(iteration_index, state.current_structure(), reporter)
            .await;
        state = state.apply(outcome, convergence);

        let best_distance_nm = state.history().last().and_then(|o| o.best_distance());
        match best_distance_nm {
            Some(distance) => info!(
                iteration = iteration_index,
                best_distance_nm = distance,
                status = %state.status(),
                "Iteration complete."
            ),
            None => warn!(
                iteration = iteration_index,
                "Every sample failed; aborting the run."
            ),
        }
        reporter.report(Progress::IterationFinish {
            index: iteration_index,
            best_distance_nm,
            status: state.status(),
        });
    }

    state
}

/// Runs a complete SuMD simulation with the given stage engine.
///
/// Validates the input before any iteration, writes `report.toml`,
/// `distances.csv` and a `best.<ext>` copy of the final structure into the
/// output directory, and returns the report.
#[instrument(skip_all, name = "sumd_workflow")]
pub async fn run(
    config: &SumdConfig,
    engine: Arc<dyn StageEngine>,
    reporter: &ProgressReporter<'_>,
) -> Result<RunReport, EngineError> {
    reporter.report(Progress::SetupStart);
    let input = config.resolve_input()?;
    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .map_err(|e| EngineError::io(format!("creating {}", config.output_dir.display()), e))?;
    info!(
        input = %input,
        output_dir = %config.output_dir.display(),
        samples = config.sampling.num_samples,
        max_iterations = config.convergence.max_iterations,
        "Starting SuMD run."
    );
    let runner = BatchRunner::new(engine, config);

    let state = run_loop(&runner, input, &config.convergence, reporter).await;

    let mut report = RunReport::from_state(&state);
    if let Some(best) = state.latest_best().and_then(|b| b.final_structure()) {
        match export_best(best, &config.output_dir).await {
            Ok(path) => report.best_structure = Some(path),
            Err(e) => warn!("Could not copy the best structure: {}", e),
        }
    }
    report.write_toml(&config.output_dir.join(REPORT_FILE))?;
    report.write_distances_csv(&config.output_dir.join(DISTANCES_FILE))?;

    match state.status() {
        RunStatus::Converged => info!("Converged after {} iteration(s).", state.iteration_index()),
        RunStatus::Exhausted => info!("Iteration budget exhausted without convergence."),
        RunStatus::Aborted => warn!("Run aborted at iteration {}.", state.iteration_index()),
        RunStatus::Running => {
            return Err(EngineError::Internal(
                "controller returned a non-terminal state".to_string(),
            ));
        }
    }
    Ok(report)
}

/// Copies `best` (and its scoring companion) to `best.<ext>` in `output_dir`.
async fn export_best(best: &StructureSnapshot, output_dir: &Path) -> std::io::Result<PathBuf> {
    let target = output_dir.join(format!("best.{}", best.format().extension()));
    tokio::fs::copy(best.path(), &target).await?;
    if let Some(companion) = best.companion() {
        let companion_target =
            output_dir.join(format!("best_scoring.{}", companion.format().extension()));
        tokio::fs::copy(companion.path(), companion_target).await?;
    }
    Ok(target)
}
