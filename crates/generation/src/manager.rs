//! Owner of all running poll loops.
//!
//! [`GenerationManager`] spawns one tokio task per tracked generation
//! (or one per batch), each under a child of a master
//! [`CancellationToken`], and keeps them indexed by task id so they can
//! be cancelled individually or all at once on shutdown.
//!
//! Lifecycle events are broadcast via a [`tokio::sync::broadcast`]
//! channel. Call [`GenerationManager::subscribe`] to receive them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use nymia_core::events::GenerationEvent;
use nymia_core::generation::{GenerationTask, TaskType};
use nymia_core::types::TaskId;
use tokio::sync::{broadcast, oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::batch::BatchOutcome;
use crate::error::GenerationError;
use crate::poller::{GenerationPoller, PollConfig, PollResult};
use crate::source::AssetSource;

/// Broadcast channel capacity for lifecycle events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// How long shutdown waits for each poll task to exit.
const SHUTDOWN_WAIT: Duration = Duration::from_secs(5);

type Registry = Arc<RwLock<HashMap<TaskId, ManagedTask>>>;

pub struct GenerationManager {
    /// Running poll loops indexed by task id. Entries remove themselves
    /// when their loop ends.
    tasks: Registry,
    poller: Arc<GenerationPoller>,
    event_tx: broadcast::Sender<GenerationEvent>,
    /// Master cancellation token, cancelled during shutdown.
    cancel: CancellationToken,
}

struct ManagedTask {
    task_type: TaskType,
    /// Only the first member of a batch holds the shared handle.
    handle: Option<JoinHandle<()>>,
    cancel: CancellationToken,
}

/// Handle to a tracked task or batch.
pub struct Tracked<T> {
    task_ids: Vec<TaskId>,
    outcome: oneshot::Receiver<T>,
}

impl<T> Tracked<T> {
    pub fn task_ids(&self) -> &[TaskId] {
        &self.task_ids
    }

    /// Wait for the loop to finish. `None` if it was aborted before
    /// reporting.
    pub async fn wait(self) -> Option<T> {
        self.outcome.await.ok()
    }
}

impl GenerationManager {
    pub fn new(source: Arc<dyn AssetSource>, asset_base_url: impl Into<String>) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let poller = GenerationPoller::new(source, asset_base_url, event_tx.clone());

        Arc::new(Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            poller: Arc::new(poller),
            event_tx,
            cancel: CancellationToken::new(),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GenerationEvent> {
        self.event_tx.subscribe()
    }

    /// Ids of every task with a running poll loop, sorted.
    pub async fn active_tasks(&self) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = self.tasks.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Start polling a submitted task.
    ///
    /// A task id has at most one running loop; tracking it again while
    /// its loop runs fails with [`GenerationError::AlreadyTracked`].
    pub async fn track(
        &self,
        task: GenerationTask,
        config: PollConfig,
    ) -> Result<Tracked<PollResult>, GenerationError> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&task.id) {
            return Err(GenerationError::AlreadyTracked(task.id));
        }

        self.emit_submitted(&task);

        let task_id = task.id.clone();
        let task_type = task.task_type;
        let cancel = self.cancel.child_token();
        let (outcome_tx, outcome) = oneshot::channel();
        let poller = Arc::clone(&self.poller);
        let registry = Arc::clone(&self.tasks);
        let task_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            let result = poller.run(&task, &config, &task_cancel).await;
            registry.write().await.remove(&task.id);
            let _ = outcome_tx.send(result);
        });

        tasks.insert(
            task_id.clone(),
            ManagedTask {
                task_type,
                handle: Some(handle),
                cancel,
            },
        );

        Ok(Tracked {
            task_ids: vec![task_id],
            outcome,
        })
    }

    /// Start one shared poll loop for `batch`.
    ///
    /// Cancelling any member cancels the whole batch.
    pub async fn track_batch(
        &self,
        batch: Vec<GenerationTask>,
        config: PollConfig,
    ) -> Result<Tracked<BatchOutcome>, GenerationError> {
        let mut tasks = self.tasks.write().await;
        let mut members: Vec<(TaskId, TaskType)> = Vec::with_capacity(batch.len());
        for task in &batch {
            if tasks.contains_key(&task.id) || members.iter().any(|(id, _)| id == &task.id) {
                return Err(GenerationError::AlreadyTracked(task.id.clone()));
            }
            members.push((task.id.clone(), task.task_type));
        }

        for task in &batch {
            self.emit_submitted(task);
        }

        let cancel = self.cancel.child_token();
        let (outcome_tx, outcome) = oneshot::channel();
        let poller = Arc::clone(&self.poller);
        let registry = Arc::clone(&self.tasks);
        let batch_cancel = cancel.clone();

        let mut handle = Some(tokio::spawn(async move {
            let result = poller.run_batch(&batch, &config, &batch_cancel).await;
            {
                let mut registry = registry.write().await;
                for task in &batch {
                    registry.remove(&task.id);
                }
            }
            let _ = outcome_tx.send(result);
        }));

        let mut task_ids = Vec::with_capacity(members.len());
        for (task_id, task_type) in members {
            tasks.insert(
                task_id.clone(),
                ManagedTask {
                    task_type,
                    handle: handle.take(),
                    cancel: cancel.clone(),
                },
            );
            task_ids.push(task_id);
        }

        Ok(Tracked { task_ids, outcome })
    }

    /// Stop polling a task. Its loop emits a `Cancelled` event.
    pub async fn cancel(&self, task_id: &TaskId) -> Result<(), GenerationError> {
        let tasks = self.tasks.read().await;
        let managed = tasks
            .get(task_id)
            .ok_or_else(|| GenerationError::NotTracked(task_id.clone()))?;

        tracing::info!(task_id = %task_id, task_type = %managed.task_type, "Cancelling poll task");
        managed.cancel.cancel();
        Ok(())
    }

    /// Cancel every loop, then wait up to 5 seconds per task for a clean
    /// exit. Tasks tracked afterwards are cancelled immediately.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down generation manager");
        self.cancel.cancel();

        let drained: Vec<(TaskId, ManagedTask)> = self.tasks.write().await.drain().collect();
        for (task_id, managed) in drained {
            managed.cancel.cancel();
            if let Some(handle) = managed.handle {
                tracing::info!(task_id = %task_id, "Stopping poll task");
                let _ = tokio::time::timeout(SHUTDOWN_WAIT, handle).await;
            }
        }

        tracing::info!("Generation manager shut down complete");
    }

    fn emit_submitted(&self, task: &GenerationTask) {
        let _ = self.event_tx.send(GenerationEvent::Submitted {
            task_id: task.id.clone(),
            task_type: task.task_type,
        });
    }
}
