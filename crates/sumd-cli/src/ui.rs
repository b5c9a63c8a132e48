use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use sumd::engine::progress::{Progress, ProgressCallback};
use sumd::engine::state::{RunStatus, StageReached};
use tokio::sync::{mpsc, watch};
use tracing::warn;

#[derive(Debug)]
pub enum UiEvent {
    Progress(Progress),
    Log(String),
}

pub struct UiManager {
    mp: Arc<MultiProgress>,
    view: IterationView,
    event_receiver: mpsc::Receiver<UiEvent>,
    shutdown_receiver: watch::Receiver<bool>,
    _sentinel_bar: ProgressBar,
}

/// Samples of the current iteration, by the stage they finished in.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct SampleTally {
    ran_md: usize,
    minimized: usize,
    failed: usize,
}

impl SampleTally {
    fn record(&mut self, stage: StageReached) {
        match stage {
            StageReached::MinimizedAndRun => self.ran_md += 1,
            StageReached::Minimized => self.minimized += 1,
            StageReached::Failed => self.failed += 1,
        }
    }
}

impl fmt::Display for SampleTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} md, {} min-only, {} failed",
            self.ran_md, self.minimized, self.failed
        )
    }
}

/// What the live display knows about the iteration in flight.
#[derive(Default)]
struct IterationView {
    bar: Option<ProgressBar>,
    label: String,
    tally: SampleTally,
    best_nm: Option<f64>,
}

impl IterationView {
    fn replace_bar(&mut self, bar: ProgressBar) {
        if let Some(old) = self.bar.replace(bar) {
            old.finish_and_clear();
        }
    }

    fn clear_bar(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }

    /// Only samples the controller could select count towards the best.
    fn record(&mut self, stage: StageReached, distance_nm: Option<f64>) {
        self.tally.record(stage);
        if stage == StageReached::Failed {
            return;
        }
        if let Some(d) = distance_nm.filter(|d| d.is_finite()) {
            self.best_nm = Some(self.best_nm.map_or(d, |best| best.min(d)));
        }
    }

    fn status_line(&self) -> String {
        match self.best_nm {
            Some(best) => format!("{}: best {:.3} nm ({})", self.label, best, self.tally),
            None => format!("{}: no candidate yet ({})", self.label, self.tally),
        }
    }
}

fn sample_line(sample_id: usize, stage: StageReached, distance_nm: Option<f64>) -> String {
    let stage_name = stage.to_string();
    match distance_nm.filter(|d| d.is_finite()) {
        Some(d) if stage != StageReached::Failed => {
            format!("  sample {sample_id:>3}  {stage_name:<17}  {d:.3} nm")
        }
        _ => format!("  sample {sample_id:>3}  {stage_name}"),
    }
}

fn iteration_line(label: &str, best_distance_nm: Option<f64>, status: RunStatus) -> String {
    match best_distance_nm {
        Some(best) => format!("✓ {label}: best {best:.3} nm, run {status}"),
        None => format!("✗ {label}: every sample failed, run {status}"),
    }
}

impl UiManager {
    pub fn new() -> (Self, mpsc::Sender<UiEvent>, watch::Sender<bool>) {
        let (event_sender, event_receiver) = mpsc::channel(1024);
        let (shutdown_sender, shutdown_receiver) = watch::channel(false);
        let mp = Arc::new(MultiProgress::new());
        mp.set_draw_target(ProgressDrawTarget::stderr_with_hz(12));
        let _sentinel_bar = mp.add(ProgressBar::hidden());
        let manager = Self {
            mp,
            view: IterationView::default(),
            event_receiver,
            shutdown_receiver,
            _sentinel_bar,
        };

        (manager, event_sender, shutdown_sender)
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                Some(event) = self.event_receiver.recv() => {
                    self.handle_event(event);
                }
                result = self.shutdown_receiver.changed() => {
                    if result.is_err() || *self.shutdown_receiver.borrow() {
                        break;
                    }
                }
            }
        }
        self.view.clear_bar();
        self._sentinel_bar.finish_and_clear();
    }

    fn handle_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::Log(msg) => {
                self.mp.println(msg).ok();
            }
            UiEvent::Progress(progress) => self.handle_progress(progress),
        }
    }

    fn spinner(&self, message: String) -> ProgressBar {
        let pb = self.mp.add(ProgressBar::new_spinner());
        pb.enable_steady_tick(Duration::from_millis(80));
        pb.set_style(Self::spinner_style());
        pb.set_message(message);
        pb
    }

    fn handle_progress(&mut self, progress: Progress) {
        match progress {
            Progress::SetupStart => {
                let spinner = self.spinner("Validating input".to_string());
                self.view.replace_bar(spinner);
            }
            Progress::IterationStart {
                index,
                max_iterations,
            } => {
                self.view.label = format!("Iteration {index}/{max_iterations}");
                self.view.tally = SampleTally::default();
                self.view.best_nm = None;
                let spinner = self.spinner(format!("{}: preparing samples", self.view.label));
                self.view.replace_bar(spinner);
            }
            Progress::SamplesDispatched { total } => {
                if let Some(bar) = self.view.bar.as_ref() {
                    bar.disable_steady_tick();
                    bar.set_style(Self::bar_style());
                    bar.set_length(total as u64);
                    bar.set_position(0);
                    bar.set_message(self.view.status_line());
                }
            }
            Progress::SampleFinished {
                sample_id,
                stage,
                distance_nm,
            } => {
                self.view.record(stage, distance_nm);
                if let Some(bar) = self.view.bar.as_ref() {
                    bar.inc(1);
                    bar.set_message(self.view.status_line());
                }
                self.mp.println(sample_line(sample_id, stage, distance_nm)).ok();
            }
            Progress::IterationFinish {
                best_distance_nm,
                status,
                ..
            } => {
                self.view.clear_bar();
                self.mp
                    .println(iteration_line(&self.view.label, best_distance_nm, status))
                    .ok();
            }
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
    }

    /// Samples finish in minutes to hours, so elapsed time is shown instead of an ETA.
    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template("[{bar:30.cyan/blue}] {pos}/{len} samples ({elapsed}) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .with_key(
                "elapsed",
                |state: &ProgressState, w: &mut dyn std::fmt::Write| {
                    let secs = state.elapsed().as_secs();
                    let _ = write!(w, "{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60);
                },
            )
            .progress_chars("━╸ ")
    }
}

#[derive(Clone)]
pub struct CliProgressHandler {
    sender: mpsc::Sender<UiEvent>,
}

impl CliProgressHandler {
    pub fn new(sender: mpsc::Sender<UiEvent>) -> Self {
        Self { sender }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let sender = self.sender.clone();
        Box::new(move |progress: Progress| {
            if let Err(e) = sender.try_send(UiEvent::Progress(progress)) {
                warn!("Failed to send progress update to UI channel: {}", e);
            }
        })
    }
}
