use crate::core::models::snapshot::StructureSnapshot;
use crate::engine::config::SumdConfig;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::report::write_iteration_summary;
use crate::engine::stage::gromacs::list_topology;
use crate::engine::stage::{Stage, StageEngine};
use crate::engine::state::{IterationOutcome, SampleResult};
use crate::engine::worker::{SampleTask, SampleWorker, WorkerSettings};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};

/// Produces one iteration's outcome from its input structure.
///
/// Implementations never fail: sample-level problems are recorded in the
/// returned outcome.
#[async_trait]
pub trait IterationRunner: Send + Sync {
    async fn run_iteration(
        &self,
        iteration_index: usize,
        input: &StructureSnapshot,
        reporter: &ProgressReporter<'_>,
    ) -> IterationOutcome;
}

/// Topology and structure every sample of an iteration starts from.
struct IterationInput {
    structure: StructureSnapshot,
    topology: Arc<Vec<PathBuf>>,
}

/// Fans an iteration out over a fixed pool of sample workers.
pub struct BatchRunner {
    engine: Arc<dyn StageEngine>,
    worker: SampleWorker,
    output_dir: PathBuf,
    num_samples: usize,
    pool_size: usize,
    timeout: Duration,
}

impl BatchRunner {
    pub fn new(engine: Arc<dyn StageEngine>, config: &SumdConfig) -> Self {
        let settings = Arc::new(WorkerSettings {
            peptide: config.groups.peptide.clone(),
            protein: config.groups.protein.clone(),
            segment_length_ns: config.sampling.segment_length_ns,
            md_gate_nm: config.convergence.md_gate_nm,
            base_seed: config.sampling.seed,
        });
        let cpus = std::thread::available_parallelism().map_or(1, |n| n.get());
        Self {
            worker: SampleWorker::new(Arc::clone(&engine), settings),
            engine,
            output_dir: config.output_dir.clone(),
            num_samples: config.sampling.num_samples,
            pool_size: pool_size(
                config.sampling.num_samples,
                cpus,
                config.sampling.max_workers,
            ),
            timeout: config.sampling.per_sample_timeout,
        }
    }

    fn iteration_dir(&self, iteration_index: usize) -> PathBuf {
        self.output_dir.join(format!("iteration_{iteration_index}"))
    }

    /// Prepares a raw structure once, or discovers the topology next to a
    /// prepared one.
    async fn resolve_input(
        &self,
        input: &StructureSnapshot,
        iteration_dir: &Path,
    ) -> Result<IterationInput, String> {
        if input.is_raw() {
            let prepare_dir = iteration_dir.join("prepare");
            tokio::fs::create_dir_all(&prepare_dir)
                .await
                .map_err(|e| format!("creating {}: {e}", prepare_dir.display()))?;
            info!("Preparing simulation system from raw structure {}.", input);
            let output = tokio::time::timeout(
                self.timeout,
                self.engine.run_stage(&Stage::Prepare, input, &prepare_dir),
            )
            .await
            .map_err(|_| "prepare failed: timeout".to_string())?
            .map_err(|e| format!("prepare failed: {e}"))?;
            return Ok(IterationInput {
                structure: output.structure,
                topology: Arc::new(output.topology),
            });
        }

        let dir = input.path().parent().unwrap_or(Path::new("."));
        let topology = list_topology(dir).await.map_err(|e| e.to_string())?;
        if !topology.iter().any(|p| p.ends_with("topol.top")) {
            return Err(format!("no topol.top next to {}", input));
        }
        Ok(IterationInput {
            structure: input.clone(),
            topology: Arc::new(topology),
        })
    }

    fn all_failed(&self, iteration_dir: &Path, reason: &str) -> Vec<SampleResult> {
        (1..=self.num_samples)
            .map(|id| {
                SampleResult::failed(id, iteration_dir.join(format!("sample_{id}")), None, reason)
            })
            .collect()
    }

    /// Runs every sample through the work queue and collects their results in
    /// completion order.
    async fn run_samples(
        &self,
        iteration_index: usize,
        input: IterationInput,
        iteration_dir: &Path,
        reporter: &ProgressReporter<'_>,
    ) -> Vec<SampleResult> {
        let (task_tx, task_rx) = mpsc::channel::<SampleTask>(self.pool_size);
        let task_rx = Arc::new(Mutex::new(task_rx));
        let (result_tx, mut result_rx) = mpsc::channel::<SampleResult>(self.num_samples);

        let mut pool = JoinSet::new();
        for _ in 0..self.pool_size {
            let queue = Arc::clone(&task_rx);
            let results = result_tx.clone();
            let worker = self.worker.clone();
            let timeout = self.timeout;
            pool.spawn(async move {
                loop {
                    let next = queue.lock().await.recv().await;
                    let Some(task) = next else { break };
                    let result = run_guarded(worker.clone(), task, timeout).await;
                    if results.send(result).await.is_err() {
                        break;
                    }
                }
            });
        }
        drop(result_tx);

        for sample_id in 1..=self.num_samples {
            let task = SampleTask {
                sample_id,
                iteration_index,
                input: input.structure.clone(),
                topology: Arc::clone(&input.topology),
                workdir: iteration_dir.join(format!("sample_{sample_id}")),
            };
            if task_tx.send(task).await.is_err() {
                error!("Sample queue closed before all tasks were dispatched.");
                break;
            }
        }
        drop(task_tx);

        let mut results = Vec::with_capacity(self.num_samples);
        while let Some(result) = result_rx.recv().await {
            info!(
                sample = result.sample_id(),
                stage = %result.stage_reached(),
                distance_nm = result.final_distance(),
                "Sample finished."
            );
            reporter.report(Progress::sample_finished(&result));
            results.push(result);
        }
        while pool.join_next().await.is_some() {}

        let reported: BTreeSet<usize> = results.iter().map(SampleResult::sample_id).collect();
        for sample_id in (1..=self.num_samples).filter(|id| !reported.contains(id)) {
            let lost = SampleResult::failed(
                sample_id,
                iteration_dir.join(format!("sample_{sample_id}")),
                None,
                "worker lost",
            );
            reporter.report(Progress::sample_finished(&lost));
            results.push(lost);
        }
        results
    }
}

#[async_trait]
impl IterationRunner for BatchRunner {
    #[instrument(skip_all, name = "iteration", fields(iteration = iteration_index))]
    async fn run_iteration(
        &self,
        iteration_index: usize,
        input: &StructureSnapshot,
        reporter: &ProgressReporter<'_>,
    ) -> IterationOutcome {
        let iteration_dir = self.iteration_dir(iteration_index);

        let prepared = match tokio::fs::create_dir_all(&iteration_dir).await {
            Ok(()) => self.resolve_input(input, &iteration_dir).await,
            Err(e) => Err(format!("creating {}: {e}", iteration_dir.display())),
        };

        let results = match prepared {
            Ok(prepared) => {
                info!(
                    samples = self.num_samples,
                    workers = self.pool_size,
                    "Dispatching samples from {}.",
                    prepared.structure
                );
                reporter.report(Progress::SamplesDispatched {
                    total: self.num_samples,
                });
                self.run_samples(iteration_index, prepared, &iteration_dir, reporter)
                    .await
            }
            Err(reason) => {
                error!("Iteration input could not be set up: {}", reason);
                let failed = self.all_failed(&iteration_dir, &reason);
                reporter.report(Progress::SamplesDispatched {
                    total: failed.len(),
                });
                for result in &failed {
                    reporter.report(Progress::sample_finished(result));
                }
                failed
            }
        };

        let outcome = IterationOutcome::new(iteration_index, results);
        if let Err(e) = write_iteration_summary(&outcome, &iteration_dir).await {
            warn!("Could not write iteration summary: {}", e);
        }
        outcome
    }
}

/// Number of concurrent workers: bounded by samples, CPUs and the optional cap.
pub fn pool_size(num_samples: usize, cpus: usize, max_workers: Option<usize>) -> usize {
    num_samples
        .min(cpus)
        .min(max_workers.unwrap_or(usize::MAX))
        .max(1)
}

/// Runs one sample on its own task so that a timeout or panic affects only
/// that sample. Aborting the task drops its engine processes.
async fn run_guarded(worker: SampleWorker, task: SampleTask, timeout: Duration) -> SampleResult {
    let sample_id = task.sample_id;
    let workdir = task.workdir.clone();
    let handle = tokio::spawn(async move { worker.execute(task).await });
    let abort = handle.abort_handle();

    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => {
            let reason = if join_error.is_panic() {
                "worker panicked"
            } else {
                "worker cancelled"
            };
            error!(sample = sample_id, "{}: {}", reason, join_error);
            SampleResult::failed(sample_id, workdir, None, reason)
        }
        Err(_) => {
            abort.abort();
            warn!(sample = sample_id, "Sample exceeded {:?}; cancelled.", timeout);
            SampleResult::failed(sample_id, workdir, None, "timeout")
        }
    }
}
