use crate::core::models::snapshot::StructureSnapshot;
use crate::engine::config::ConvergenceConfig;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};

/// How far a sample's pipeline got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageReached {
    Failed,
    Minimized,
    MinimizedAndRun,
}

impl fmt::Display for StageReached {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StageReached::Failed => "FAILED",
            StageReached::Minimized => "MINIMIZED",
            StageReached::MinimizedAndRun => "MINIMIZED_AND_RUN",
        })
    }
}

/// One sample's outcome for one iteration.
///
/// Constructed only through [`SampleResult::failed`], [`SampleResult::minimized`]
/// and [`SampleResult::completed`], which keep `stage_reached`,
/// `final_structure` and `post_md_distance` consistent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleResult {
    sample_id: usize,
    initial_distance: Option<f64>,
    post_minimization_distance: Option<f64>,
    post_md_distance: Option<f64>,
    stage_reached: StageReached,
    final_structure: Option<StructureSnapshot>,
    error: Option<String>,
    workdir: PathBuf,
}

impl SampleResult {
    pub fn failed(
        sample_id: usize,
        workdir: PathBuf,
        initial_distance: Option<f64>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            sample_id,
            initial_distance,
            post_minimization_distance: None,
            post_md_distance: None,
            stage_reached: StageReached::Failed,
            final_structure: None,
            error: Some(error.into()),
            workdir,
        }
    }

    /// Minimization succeeded and MD was skipped or failed (`error` set).
    pub fn minimized(
        sample_id: usize,
        workdir: PathBuf,
        initial_distance: f64,
        post_minimization_distance: f64,
        minimized: StructureSnapshot,
        error: Option<String>,
    ) -> Self {
        Self {
            sample_id,
            initial_distance: Some(initial_distance),
            post_minimization_distance: Some(post_minimization_distance),
            post_md_distance: None,
            stage_reached: StageReached::Minimized,
            final_structure: Some(minimized),
            error,
            workdir,
        }
    }

    pub fn completed(
        sample_id: usize,
        workdir: PathBuf,
        initial_distance: f64,
        post_minimization_distance: f64,
        post_md_distance: f64,
        md: StructureSnapshot,
    ) -> Self {
        Self {
            sample_id,
            initial_distance: Some(initial_distance),
            post_minimization_distance: Some(post_minimization_distance),
            post_md_distance: Some(post_md_distance),
            stage_reached: StageReached::MinimizedAndRun,
            final_structure: Some(md),
            error: None,
            workdir,
        }
    }

    pub fn sample_id(&self) -> usize {
        self.sample_id
    }
    pub fn initial_distance(&self) -> Option<f64> {
        self.initial_distance
    }
    pub fn post_minimization_distance(&self) -> Option<f64> {
        self.post_minimization_distance
    }
    pub fn post_md_distance(&self) -> Option<f64> {
        self.post_md_distance
    }
    pub fn stage_reached(&self) -> StageReached {
        self.stage_reached
    }
    pub fn final_structure(&self) -> Option<&StructureSnapshot> {
        self.final_structure.as_ref()
    }
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// The MD distance if MD ran, otherwise the post-minimization distance.
    pub fn final_distance(&self) -> Option<f64> {
        self.post_md_distance.or(self.post_minimization_distance)
    }

    /// Whether the sample can be chosen as an iteration's best.
    pub fn is_selectable(&self) -> bool {
        self.stage_reached != StageReached::Failed
            && self.final_distance().is_some_and(f64::is_finite)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageCounts {
    pub failed: usize,
    pub minimized: usize,
    pub minimized_and_run: usize,
}

impl StageCounts {
    pub fn tally<'a>(results: impl IntoIterator<Item = &'a SampleResult>) -> Self {
        results
            .into_iter()
            .fold(Self::default(), |mut counts, r| {
                match r.stage_reached() {
                    StageReached::Failed => counts.failed += 1,
                    StageReached::Minimized => counts.minimized += 1,
                    StageReached::MinimizedAndRun => counts.minimized_and_run += 1,
                }
                counts
            })
    }

    pub fn total(&self) -> usize {
        self.failed + self.minimized + self.minimized_and_run
    }
}

/// Picks the selectable result with the smallest final distance, breaking
/// ties by the smallest `sample_id`. Independent of input order.
pub fn select_best(results: &[SampleResult]) -> Option<&SampleResult> {
    results
        .iter()
        .filter(|r| r.is_selectable())
        .min_by(|a, b| compare_candidates(a, b))
}

fn compare_candidates(a: &SampleResult, b: &SampleResult) -> Ordering {
    let da = a.final_distance().unwrap_or(f64::INFINITY);
    let db = b.final_distance().unwrap_or(f64::INFINITY);
    da.total_cmp(&db).then(a.sample_id.cmp(&b.sample_id))
}

/// The immutable record of one iteration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IterationOutcome {
    iteration_index: usize,
    results: Vec<SampleResult>,
    best_sample_id: Option<usize>,
    counts: StageCounts,
}

impl IterationOutcome {
    /// Sorts `results` by sample id and selects the best candidate.
    pub fn new(iteration_index: usize, mut results: Vec<SampleResult>) -> Self {
        results.sort_by_key(SampleResult::sample_id);
        let best_sample_id = select_best(&results).map(SampleResult::sample_id);
        let counts = StageCounts::tally(&results);
        Self {
            iteration_index,
            results,
            best_sample_id,
            counts,
        }
    }

    pub fn iteration_index(&self) -> usize {
        self.iteration_index
    }

    pub fn results(&self) -> &[SampleResult] {
        &self.results
    }

    pub fn counts(&self) -> StageCounts {
        self.counts
    }

    pub fn best(&self) -> Option<&SampleResult> {
        let id = self.best_sample_id?;
        self.results.iter().find(|r| r.sample_id == id)
    }

    pub fn best_distance(&self) -> Option<f64> {
        self.best().and_then(SampleResult::final_distance)
    }

    /// `(sample_id, error)` for every sample that reported one.
    pub fn errors(&self) -> impl Iterator<Item = (usize, &str)> {
        self.results
            .iter()
            .filter_map(|r| r.error().map(|e| (r.sample_id, e)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    Converged,
    Exhausted,
    Aborted,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        *self != RunStatus::Running
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Converged => "CONVERGED",
            RunStatus::Exhausted => "EXHAUSTED",
            RunStatus::Aborted => "ABORTED",
        })
    }
}

/// Controller state across iterations. Advanced only through [`RunState::apply`].
#[derive(Debug, Clone, PartialEq)]
pub struct RunState {
    current_structure: StructureSnapshot,
    iteration_index: usize,
    status: RunStatus,
    history: Vec<IterationOutcome>,
}

impl RunState {
    pub fn initial(input: StructureSnapshot) -> Self {
        Self {
            current_structure: input,
            iteration_index: 0,
            status: RunStatus::Running,
            history: Vec::new(),
        }
    }

    /// Folds one iteration's outcome into the state and decides the next status.
    ///
    /// The outcome is always recorded. Without a best candidate the run is
    /// aborted and the current structure is kept.
    pub fn apply(self, outcome: IterationOutcome, convergence: &ConvergenceConfig) -> RunState {
        let RunState {
            mut current_structure,
            mut history,
            ..
        } = self;
        let iteration_index = outcome.iteration_index();

        let best = outcome
            .best()
            .and_then(|b| Some((b.final_structure()?, b.final_distance()?)));
        let status = match best {
            None => RunStatus::Aborted,
            Some((structure, distance)) => {
                current_structure = structure.clone();
                if distance <= convergence.convergence_threshold_nm {
                    RunStatus::Converged
                } else if iteration_index >= convergence.max_iterations {
                    RunStatus::Exhausted
                } else {
                    RunStatus::Running
                }
            }
        };

        history.push(outcome);
        RunState {
            current_structure,
            iteration_index,
            status,
            history,
        }
    }

    pub fn current_structure(&self) -> &StructureSnapshot {
        &self.current_structure
    }
    pub fn iteration_index(&self) -> usize {
        self.iteration_index
    }
    pub fn status(&self) -> RunStatus {
        self.status
    }
    pub fn history(&self) -> &[IterationOutcome] {
        &self.history
    }

    /// The most recent iteration best, which is the structure the run ended on.
    pub fn latest_best(&self) -> Option<&SampleResult> {
        self.history.iter().rev().find_map(IterationOutcome::best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::snapshot::StructureFormat;

    fn snap(name: &str) -> StructureSnapshot {
        StructureSnapshot::new(name, StructureFormat::Gro)
    }

    fn minimized(id: usize, distance: f64) -> SampleResult {
        SampleResult::minimized(
            id,
            PathBuf::from(format!("sample_{id}")),
            1.0,
            distance,
            snap(&format!("em_{id}.gro")),
            None,
        )
    }

    fn completed(id: usize, distance: f64) -> SampleResult {
        SampleResult::completed(
            id,
            PathBuf::from(format!("sample_{id}")),
            0.4,
            0.4,
            distance,
            snap(&format!("md_{id}.gro")),
        )
    }

    fn failed(id: usize) -> SampleResult {
        SampleResult::failed(id, PathBuf::from(format!("sample_{id}")), None, "boom")
    }

    fn convergence(threshold: f64, max_iterations: usize) -> ConvergenceConfig {
        ConvergenceConfig {
            convergence_threshold_nm: threshold,
            md_gate_nm: 0.5,
            max_iterations,
        }
    }

    #[test]
    fn constructors_keep_stage_and_structure_consistent() {
        let f = failed(1);
        assert_eq!(f.stage_reached(), StageReached::Failed);
        assert!(f.final_structure().is_none());
        assert!(!f.is_selectable());

        let m = minimized(2, 0.7);
        assert_eq!(m.final_distance(), Some(0.7));
        assert!(m.final_structure().is_some());

        let c = completed(3, 0.2);
        assert_eq!(c.stage_reached(), StageReached::MinimizedAndRun);
        assert_eq!(c.post_md_distance(), Some(0.2));
        assert_eq!(c.final_distance(), Some(0.2));
    }

    #[test]
    fn selection_is_order_independent_with_lowest_id_tie_break() {
        let forward = vec![minimized(1, 0.9), completed(2, 0.4), completed(3, 0.4), failed(4)];
        let mut reversed = forward.clone();
        reversed.reverse();

        assert_eq!(select_best(&forward).map(SampleResult::sample_id), Some(2));
        assert_eq!(select_best(&reversed).map(SampleResult::sample_id), Some(2));

        let outcome = IterationOutcome::new(1, reversed);
        assert_eq!(outcome.best().map(SampleResult::sample_id), Some(2));
        let ids: Vec<_> = outcome.results().iter().map(SampleResult::sample_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn infinite_distances_are_never_selected() {
        let results = vec![minimized(1, f64::INFINITY), failed(2)];
        assert!(select_best(&results).is_none());
        let results = vec![minimized(1, f64::INFINITY), minimized(2, 3.0)];
        assert_eq!(select_best(&results).map(SampleResult::sample_id), Some(2));
    }

    #[test]
    fn counts_are_tallied_by_stage() {
        let outcome = IterationOutcome::new(
            1,
            vec![failed(1), minimized(2, 1.0), completed(3, 0.2), failed(4)],
        );
        assert_eq!(
            outcome.counts(),
            StageCounts {
                failed: 2,
                minimized: 1,
                minimized_and_run: 1
            }
        );
        assert_eq!(outcome.counts().total(), 4);
        assert_eq!(outcome.errors().count(), 2);
    }

    #[test]
    fn apply_converges_when_best_is_within_threshold() {
        let state = RunState::initial(snap("input.gro"))
            .apply(IterationOutcome::new(1, vec![completed(1, 0.3)]), &convergence(0.5, 10));
        assert_eq!(state.status(), RunStatus::Converged);
        assert_eq!(state.current_structure().path(), Path::new("md_1.gro"));
        assert_eq!(state.iteration_index(), 1);
    }

    #[test]
    fn apply_exhausts_at_the_iteration_limit() {
        let config = convergence(0.5, 2);
        let state = RunState::initial(snap("input.gro"))
            .apply(IterationOutcome::new(1, vec![minimized(1, 1.2)]), &config);
        assert_eq!(state.status(), RunStatus::Running);

        let state = state.apply(IterationOutcome::new(2, vec![minimized(1, 1.0)]), &config);
        assert_eq!(state.status(), RunStatus::Exhausted);
        assert_eq!(state.history().len(), 2);
    }

    #[test]
    fn apply_aborts_without_a_best_and_keeps_current_structure() {
        let state = RunState::initial(snap("input.gro"))
            .apply(IterationOutcome::new(1, vec![failed(1), failed(2)]), &convergence(0.5, 10));
        assert_eq!(state.status(), RunStatus::Aborted);
        assert_eq!(state.current_structure().path(), Path::new("input.gro"));
        assert_eq!(state.history().len(), 1);
        assert!(state.latest_best().is_none());
    }
}
