//! Scripted [`AssetSource`] for poller and manager tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use nymia_backend::BackendError;
use nymia_core::generation::{GeneratedAsset, TaskRequest};
use nymia_core::generation::GenerationTask;
use nymia_core::types::TaskId;

use crate::source::AssetSource;

type Reply = Result<Vec<GeneratedAsset>, BackendError>;

/// Replays queued replies per task id. Once a queue is drained every
/// further request sees no rows.
#[derive(Default)]
pub(crate) struct ScriptedSource {
    scripts: Mutex<HashMap<TaskId, VecDeque<Reply>>>,
    requests: Mutex<Vec<TaskId>>,
}

impl ScriptedSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn script(self, task_id: &str, replies: Vec<Reply>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(TaskId::new(task_id), replies.into());
        self
    }

    /// Every task id requested so far, in order.
    pub(crate) fn requests(&self) -> Vec<TaskId> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssetSource for ScriptedSource {
    async fn assets_for_task(&self, task_id: &TaskId) -> Reply {
        self.requests.lock().unwrap().push(task_id.clone());
        self.scripts
            .lock()
            .unwrap()
            .get_mut(task_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

fn row(value: serde_json::Value) -> Vec<GeneratedAsset> {
    vec![serde_json::from_value(value).unwrap()]
}

pub(crate) fn no_rows() -> Reply {
    Ok(Vec::new())
}

pub(crate) fn processing(task_id: &str) -> Reply {
    Ok(row(serde_json::json!({
        "task_id": task_id,
        "generation_status": "processing",
    })))
}

pub(crate) fn completed(task_id: &str, system_filename: &str) -> Reply {
    Ok(row(serde_json::json!({
        "task_id": task_id,
        "generation_status": "completed",
        "system_filename": system_filename,
        "user_filename": null,
    })))
}

pub(crate) fn failed(task_id: &str) -> Reply {
    Ok(row(serde_json::json!({
        "task_id": task_id,
        "generation_status": "failed",
    })))
}

pub(crate) fn server_error() -> Reply {
    Err(BackendError::Api {
        status: 503,
        body: "unavailable".into(),
    })
}

pub(crate) fn task(id: &str) -> GenerationTask {
    GenerationTask::new(TaskId::new(id), "u1", &TaskRequest::face_swap("A", "B"))
}
