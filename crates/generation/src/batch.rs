//! One shared poll loop for a batch of tasks.
//!
//! Each tick queries every task that has not finished yet, concurrently.
//! The batch is done only when every task has an outcome.

use futures::future::join_all;
use nymia_core::assets::MaterializedAsset;
use nymia_core::generation::GenerationTask;
use nymia_core::types::TaskId;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::PollError;
use crate::poller::{wait_interval, GenerationPoller, PollConfig, PollResult, Stop, TaskPoll, Tick};

/// Outcome of every task in a batch, in submission order.
#[derive(Debug)]
pub struct BatchOutcome {
    pub results: Vec<(TaskId, PollResult)>,
}

impl BatchOutcome {
    pub fn completed(&self) -> impl Iterator<Item = &MaterializedAsset> {
        self.results.iter().filter_map(|(_, r)| r.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&TaskId, &PollError)> {
        self.results
            .iter()
            .filter_map(|(id, r)| r.as_ref().err().map(|e| (id, e)))
    }

    pub fn all_completed(&self) -> bool {
        self.results.iter().all(|(_, r)| r.is_ok())
    }
}

impl GenerationPoller {
    /// Poll `tasks` together until all of them are terminal.
    ///
    /// The cap and cancellation apply to the whole batch: tasks still
    /// pending when either fires are reported as timed out or cancelled.
    pub async fn run_batch(
        &self,
        tasks: &[GenerationTask],
        config: &PollConfig,
        cancel: &CancellationToken,
    ) -> BatchOutcome {
        let started = Instant::now();
        let deadline = started + config.max_duration;
        let mut polls: Vec<TaskPoll<'_>> = tasks.iter().map(TaskPoll::new).collect();
        let mut outcomes: Vec<Option<PollResult>> = tasks.iter().map(|_| None).collect();

        tracing::info!(batch_size = tasks.len(), "Batch polling started");

        while outcomes.iter().any(Option::is_none) {
            let mut stop = wait_interval(config.interval, started, deadline, cancel).await;

            if stop.is_none() {
                let ticks: Vec<_> = polls
                    .iter_mut()
                    .enumerate()
                    .filter(|(i, _)| outcomes[*i].is_none())
                    .map(|(i, poll)| async move { (i, self.tick(poll, config).await) })
                    .collect();

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => stop = Some(Stop::Cancelled),
                    _ = time::sleep_until(deadline) => {
                        stop = Some(Stop::TimedOut(started.elapsed()));
                    }
                    results = join_all(ticks) => {
                        for (i, tick) in results {
                            if let Tick::Finished(result) = tick {
                                self.finish(&tasks[i].id, &result);
                                outcomes[i] = Some(result);
                            }
                        }
                    }
                }
            }

            if let Some(stop) = stop {
                for (task, outcome) in tasks.iter().zip(outcomes.iter_mut()) {
                    if outcome.is_none() {
                        let result = Err(stop.into_error());
                        self.finish(&task.id, &result);
                        *outcome = Some(result);
                    }
                }
            }
        }

        let outcome = BatchOutcome {
            results: tasks
                .iter()
                .zip(outcomes)
                .map(|(task, result)| (task.id.clone(), result.unwrap_or(Err(PollError::Cancelled))))
                .collect(),
        };

        tracing::info!(
            batch_size = tasks.len(),
            completed = outcome.completed().count(),
            "Batch complete",
        );
        outcome
    }
}
