//! Lifecycle events for tracked generation tasks.
//!
//! Emitted by the poller and manager, consumed by whatever renders
//! results (the application store, the CLI). Each task produces at most
//! one terminal event.

use serde::Serialize;

use crate::assets::MaterializedAsset;
use crate::generation::TaskType;
use crate::types::TaskId;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenerationEvent {
    /// The task API accepted a task.
    Submitted { task_id: TaskId, task_type: TaskType },

    /// Estimated progress (0-95) from a non-terminal poll tick.
    Progress { task_id: TaskId, percent: u8 },

    /// The asset row is completed and its URL resolved.
    Completed {
        task_id: TaskId,
        asset: MaterializedAsset,
    },

    /// The server marked the task failed, or polling gave up on an error.
    Failed { task_id: TaskId, error: String },

    /// The wall-clock cap elapsed without a terminal status.
    TimedOut { task_id: TaskId, elapsed_secs: u64 },

    /// Polling was cancelled by the owner.
    Cancelled { task_id: TaskId },
}

impl GenerationEvent {
    pub fn task_id(&self) -> &TaskId {
        match self {
            Self::Submitted { task_id, .. }
            | Self::Progress { task_id, .. }
            | Self::Completed { task_id, .. }
            | Self::Failed { task_id, .. }
            | Self::TimedOut { task_id, .. }
            | Self::Cancelled { task_id } => task_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed { .. } | Self::Failed { .. } | Self::TimedOut { .. } | Self::Cancelled { .. }
        )
    }
}
