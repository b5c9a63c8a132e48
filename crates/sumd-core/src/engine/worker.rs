use crate::core::metrics;
use crate::core::models::selection::AtomGroupSelector;
use crate::core::models::snapshot::StructureSnapshot;
use crate::engine::stage::{Stage, StageEngine};
use crate::engine::state::SampleResult;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Spacing between the seeds of consecutive iterations.
const SEED_STRIDE: u64 = 10_000;
/// Base seeds are folded into this range before offsets are added.
const SEED_BASE_RANGE: u64 = 1_000_000;

/// Derives the velocity-generation seed of one MD segment.
///
/// Distinct `(iteration_index, sample_id)` pairs map to distinct seeds as long
/// as `sample_id < SEED_STRIDE`.
pub fn derive_seed(base_seed: u64, iteration_index: usize, sample_id: usize) -> u64 {
    1 + base_seed % SEED_BASE_RANGE + iteration_index as u64 * SEED_STRIDE + sample_id as u64
}

/// One unit of work on the batch queue.
#[derive(Debug, Clone)]
pub struct SampleTask {
    pub sample_id: usize,
    pub iteration_index: usize,
    pub input: StructureSnapshot,
    pub topology: Arc<Vec<PathBuf>>,
    pub workdir: PathBuf,
}

/// The per-run settings every sample shares.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub peptide: AtomGroupSelector,
    pub protein: AtomGroupSelector,
    pub segment_length_ns: f64,
    pub md_gate_nm: f64,
    pub base_seed: u64,
}

/// Runs the per-sample pipeline: stage, measure, minimize, gate, MD.
#[derive(Clone)]
pub struct SampleWorker {
    engine: Arc<dyn StageEngine>,
    settings: Arc<WorkerSettings>,
}

impl SampleWorker {
    pub fn new(engine: Arc<dyn StageEngine>, settings: Arc<WorkerSettings>) -> Self {
        Self { engine, settings }
    }

    /// Executes one sample. Never fails: every error becomes part of the result.
    #[instrument(
        skip_all,
        name = "sample",
        fields(iteration = task.iteration_index, sample = task.sample_id)
    )]
    pub async fn execute(&self, task: SampleTask) -> SampleResult {
        let SampleTask {
            sample_id,
            iteration_index,
            input,
            topology,
            workdir,
        } = task;

        let staged = match stage_workdir(&input, &topology, &workdir).await {
            Ok(staged) => staged,
            Err(e) => {
                warn!("Could not stage working directory: {}", e);
                return SampleResult::failed(
                    sample_id,
                    workdir,
                    None,
                    format!("staging failed: {e}"),
                );
            }
        };

        let initial = self.measure(&staged).await;
        debug!(initial_distance_nm = initial, "Measured input structure.");

        let minimized = match self.engine.run_stage(&Stage::Minimize, &staged, &workdir).await {
            Ok(output) => output.structure,
            Err(failure) => {
                warn!("Minimization failed: {}", failure);
                return SampleResult::failed(sample_id, workdir, Some(initial), failure.to_string());
            }
        };
        let post_min = self.measure(&minimized).await;

        if initial > self.settings.md_gate_nm {
            info!(
                initial_distance_nm = initial,
                post_minimization_distance_nm = post_min,
                "Outside the MD gate ({} nm); keeping the minimized structure.",
                self.settings.md_gate_nm
            );
            return SampleResult::minimized(sample_id, workdir, initial, post_min, minimized, None);
        }

        let stage = Stage::MdSegment {
            length_ns: self.settings.segment_length_ns,
            seed: derive_seed(self.settings.base_seed, iteration_index, sample_id),
        };
        match self.engine.run_stage(&stage, &minimized, &workdir).await {
            Ok(output) => {
                let post_md = self.measure(&output.structure).await;
                info!(
                    initial_distance_nm = initial,
                    post_md_distance_nm = post_md,
                    "MD segment finished."
                );
                SampleResult::completed(
                    sample_id,
                    workdir,
                    initial,
                    post_min,
                    post_md,
                    output.structure,
                )
            }
            Err(failure) => {
                warn!("MD segment failed, keeping the minimized structure: {}", failure);
                SampleResult::minimized(
                    sample_id,
                    workdir,
                    initial,
                    post_min,
                    minimized,
                    Some(failure.to_string()),
                )
            }
        }
    }

    /// Distance between the configured groups, infinite on any failure.
    async fn measure(&self, structure: &StructureSnapshot) -> f64 {
        let structure = structure.clone();
        let settings = Arc::clone(&self.settings);
        tokio::task::spawn_blocking(move || {
            metrics::distance_or_infinite(&structure, &settings.peptide, &settings.protein)
        })
        .await
        .unwrap_or_else(|e| {
            warn!("Distance computation did not complete: {}", e);
            f64::INFINITY
        })
    }
}

/// Creates `workdir` and copies the input structure, its scoring companion and
/// the topology artifacts into it. Returns the snapshot of the local copy.
async fn stage_workdir(
    input: &StructureSnapshot,
    topology: &[PathBuf],
    workdir: &Path,
) -> std::io::Result<StructureSnapshot> {
    tokio::fs::create_dir_all(workdir).await?;

    let local = workdir.join(format!("input.{}", input.format().extension()));
    tokio::fs::copy(input.path(), &local).await?;
    let mut staged = StructureSnapshot::new(&local, input.format());

    if let Some(companion) = input.companion() {
        let local_companion =
            workdir.join(format!("input_scoring.{}", companion.format().extension()));
        tokio::fs::copy(companion.path(), &local_companion).await?;
        staged = staged.with_companion(StructureSnapshot::new(local_companion, companion.format()));
    }

    for file in topology {
        let Some(name) = file.file_name() else {
            continue;
        };
        tokio::fs::copy(file, workdir.join(name)).await?;
    }

    Ok(staged)
}
