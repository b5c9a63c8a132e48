use crate::engine::state::{RunStatus, SampleResult, StageReached};

/// Run events for interactive front ends. Logging goes through `tracing`;
/// these carry only what a live display needs.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    /// Input validation has started.
    SetupStart,

    IterationStart {
        index: usize,
        max_iterations: usize,
    },

    /// The iteration's input is ready and `total` samples are queued.
    SamplesDispatched { total: usize },

    /// One sample reached a terminal stage. `distance_nm` is the distance the
    /// sample would be ranked by.
    SampleFinished {
        sample_id: usize,
        stage: StageReached,
        distance_nm: Option<f64>,
    },

    /// The iteration was applied to the run state. `best_distance_nm` is
    /// `None` when every sample failed.
    IterationFinish {
        index: usize,
        best_distance_nm: Option<f64>,
        status: RunStatus,
    },
}

impl Progress {
    pub fn sample_finished(result: &SampleResult) -> Self {
        Progress::SampleFinished {
            sample_id: result.sample_id(),
            stage: result.stage_reached(),
            distance_nm: result.final_distance(),
        }
    }
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;

    #[test]
    fn silent_reporter_ignores_events() {
        ProgressReporter::new().report(Progress::SetupStart);
    }

    #[test]
    fn callback_receives_events_in_order() {
        let seen = Mutex::new(Vec::new());
        {
            let reporter = ProgressReporter::with_callback(Box::new(|event| {
                seen.lock().unwrap().push(event);
            }));
            reporter.report(Progress::IterationStart {
                index: 1,
                max_iterations: 3,
            });
            reporter.report(Progress::SamplesDispatched { total: 2 });
        }
        assert_eq!(
            seen.into_inner().unwrap(),
            vec![
                Progress::IterationStart {
                    index: 1,
                    max_iterations: 3
                },
                Progress::SamplesDispatched { total: 2 },
            ]
        );
    }

    #[test]
    fn sample_event_carries_the_ranking_distance() {
        let failed = SampleResult::failed(3, PathBuf::from("sample_3"), Some(0.9), "timeout");
        assert_eq!(
            Progress::sample_finished(&failed),
            Progress::SampleFinished {
                sample_id: 3,
                stage: StageReached::Failed,
                distance_nm: None,
            }
        );
    }
}
