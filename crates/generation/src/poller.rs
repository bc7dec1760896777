//! Polling of the asset registry until a task reaches a terminal state.
//!
//! A poll loop waits one interval, issues a single request, and only
//! then arms the next wait, so ticks of one task never overlap. Every
//! loop is bounded by the task type's wall-clock cap and stops promptly
//! when its [`CancellationToken`] is triggered.

use std::sync::Arc;
use std::time::Duration;

use nymia_core::assets::{materialize, MaterializedAsset};
use nymia_core::events::GenerationEvent;
use nymia_core::generation::{classify_poll, GenerationTask, PollClassification, TaskType};
use nymia_core::progress::ProgressTracker;
use nymia_core::types::TaskId;
use tokio::sync::broadcast;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::PollError;
use crate::source::AssetSource;

pub type PollResult = Result<MaterializedAsset, PollError>;

/// Timing and error budget of one poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between the end of one request and the start of the next.
    pub interval: Duration,
    /// Expected run time, used only for the progress estimate.
    pub assumed_duration: Duration,
    /// Wall-clock cap measured from the start of the loop.
    pub max_duration: Duration,
    /// Consecutive transient request errors tolerated. `0` fails on the
    /// first error.
    pub max_poll_errors: u32,
}

impl PollConfig {
    pub fn for_task_type(task_type: TaskType) -> Self {
        let profile = task_type.poll_profile();
        Self {
            interval: profile.interval,
            assumed_duration: profile.assumed_duration,
            max_duration: profile.max_duration,
            max_poll_errors: 0,
        }
    }

    pub fn with_max_poll_errors(mut self, max_poll_errors: u32) -> Self {
        self.max_poll_errors = max_poll_errors;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = max_duration;
        self
    }
}

/// Reason a loop stopped before the task itself finished.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Stop {
    Cancelled,
    TimedOut(Duration),
}

impl Stop {
    pub(crate) fn into_error(self) -> PollError {
        match self {
            Self::Cancelled => PollError::Cancelled,
            Self::TimedOut(elapsed) => PollError::TimedOut(elapsed),
        }
    }
}

/// Per-task loop state.
pub(crate) struct TaskPoll<'a> {
    pub(crate) task: &'a GenerationTask,
    /// Submission time on the monotonic clock.
    submitted: Instant,
    progress: ProgressTracker,
    consecutive_errors: u32,
}

impl<'a> TaskPoll<'a> {
    pub(crate) fn new(task: &'a GenerationTask) -> Self {
        let now = Instant::now();
        Self {
            task,
            submitted: now.checked_sub(task.age()).unwrap_or(now),
            progress: ProgressTracker::new(),
            consecutive_errors: 0,
        }
    }
}

pub(crate) enum Tick {
    Pending,
    Finished(PollResult),
}

/// Polls tasks against an [`AssetSource`] and broadcasts their lifecycle
/// events.
pub struct GenerationPoller {
    source: Arc<dyn AssetSource>,
    asset_base_url: String,
    event_tx: broadcast::Sender<GenerationEvent>,
}

impl GenerationPoller {
    pub fn new(
        source: Arc<dyn AssetSource>,
        asset_base_url: impl Into<String>,
        event_tx: broadcast::Sender<GenerationEvent>,
    ) -> Self {
        Self {
            source,
            asset_base_url: asset_base_url.into(),
            event_tx,
        }
    }

    /// Poll one task until it completes, fails, times out or is
    /// cancelled. Exactly one terminal event is emitted.
    pub async fn run(
        &self,
        task: &GenerationTask,
        config: &PollConfig,
        cancel: &CancellationToken,
    ) -> PollResult {
        let started = Instant::now();
        let deadline = started + config.max_duration;
        let mut poll = TaskPoll::new(task);

        tracing::info!(
            task_id = %task.id,
            task_type = %task.task_type,
            interval_ms = config.interval.as_millis() as u64,
            "Polling started",
        );

        let result = loop {
            if let Some(stop) = wait_interval(config.interval, started, deadline, cancel).await {
                break Err(stop.into_error());
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Err(PollError::Cancelled),
                _ = time::sleep_until(deadline) => {
                    break Err(PollError::TimedOut(started.elapsed()));
                }
                tick = self.tick(&mut poll, config) => {
                    if let Tick::Finished(result) = tick {
                        break result;
                    }
                }
            }
        };

        self.finish(&task.id, &result);
        result
    }

    /// Issue one request for `poll.task` and interpret the response.
    pub(crate) async fn tick(&self, poll: &mut TaskPoll<'_>, config: &PollConfig) -> Tick {
        let task_id = &poll.task.id;

        let rows = match self.source.assets_for_task(task_id).await {
            Ok(rows) => {
                poll.consecutive_errors = 0;
                rows
            }
            Err(e) => {
                poll.consecutive_errors += 1;
                if e.is_transient() && poll.consecutive_errors <= config.max_poll_errors {
                    tracing::warn!(
                        task_id = %task_id,
                        attempt = poll.consecutive_errors,
                        error = %e,
                        "Poll request failed, retrying",
                    );
                    return Tick::Pending;
                }
                return Tick::Finished(Err(PollError::Backend(e)));
            }
        };

        match classify_poll(&rows) {
            PollClassification::Completed(row) => {
                poll.progress.complete();
                let asset = materialize(task_id, row, &self.asset_base_url, &poll.task.owner)
                    .map_err(|e| PollError::Failed(e.to_string()));
                Tick::Finished(asset)
            }
            PollClassification::Failed(_) => {
                poll.progress.fail();
                Tick::Finished(Err(PollError::Failed(format!(
                    "task {task_id} was marked failed by the server"
                ))))
            }
            PollClassification::Pending { status } => {
                let before = poll.progress.percent();
                let percent = poll
                    .progress
                    .observe(poll.submitted.elapsed(), config.assumed_duration);
                tracing::debug!(task_id = %task_id, status, progress = percent, "Task pending");
                if percent > before {
                    self.emit(GenerationEvent::Progress {
                        task_id: task_id.clone(),
                        percent,
                    });
                }
                Tick::Pending
            }
        }
    }

    /// Log and broadcast the terminal outcome of one task.
    pub(crate) fn finish(&self, task_id: &TaskId, result: &PollResult) {
        match result {
            Ok(asset) => {
                tracing::info!(task_id = %task_id, url = %asset.url, "Generation completed");
            }
            Err(PollError::Cancelled) => {
                tracing::info!(task_id = %task_id, "Polling cancelled");
            }
            Err(e) => {
                tracing::warn!(task_id = %task_id, error = %e, "Generation did not complete");
            }
        }
        self.emit(outcome_event(task_id, result));
    }

    fn emit(&self, event: GenerationEvent) {
        // No subscribers is fine.
        let _ = self.event_tx.send(event);
    }
}

/// The terminal event describing `result`.
pub fn outcome_event(task_id: &TaskId, result: &PollResult) -> GenerationEvent {
    let task_id = task_id.clone();
    match result {
        Ok(asset) => GenerationEvent::Completed {
            task_id,
            asset: asset.clone(),
        },
        Err(PollError::Cancelled) => GenerationEvent::Cancelled { task_id },
        Err(PollError::TimedOut(elapsed)) => GenerationEvent::TimedOut {
            task_id,
            elapsed_secs: elapsed.as_secs(),
        },
        Err(e) => GenerationEvent::Failed {
            task_id,
            error: e.to_string(),
        },
    }
}

/// Sleep one interval unless the loop is cancelled or its cap elapses
/// first.
pub(crate) async fn wait_interval(
    interval: Duration,
    started: Instant,
    deadline: Instant,
    cancel: &CancellationToken,
) -> Option<Stop> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Some(Stop::Cancelled),
        _ = time::sleep_until(deadline) => Some(Stop::TimedOut(started.elapsed())),
        _ = time::sleep(interval) => None,
    }
}
