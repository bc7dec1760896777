//! Task submission against the task API.

use nymia_backend::TaskApi;
use nymia_core::credits::validate_item_count;
use nymia_core::generation::{GenerationTask, TaskRequest};
use nymia_core::types::UserId;

use crate::error::GenerationError;

pub struct TaskSubmitter {
    api: TaskApi,
}

impl TaskSubmitter {
    pub fn new(api: TaskApi) -> Self {
        Self { api }
    }

    /// Submit one task on behalf of `user_id`.
    ///
    /// `owner` is the storage owner segment later used to build the
    /// asset URL. The request is validated before any network call and
    /// is never retried.
    pub async fn submit(
        &self,
        user_id: &UserId,
        owner: &str,
        request: &TaskRequest,
    ) -> Result<GenerationTask, GenerationError> {
        request.validate()?;
        let task_id = self
            .api
            .create_task(user_id, request.task_type, &request.parameters)
            .await?;
        Ok(GenerationTask::new(task_id, owner, request))
    }

    /// Submit `count` tasks with the same parameters, one after another.
    ///
    /// Stops at the first failure; tasks created before it are logged.
    pub async fn submit_many(
        &self,
        user_id: &UserId,
        owner: &str,
        request: &TaskRequest,
        count: u32,
    ) -> Result<Vec<GenerationTask>, GenerationError> {
        validate_item_count(count)?;
        let mut tasks = Vec::with_capacity(count as usize);
        for _ in 0..count {
            match self.submit(user_id, owner, request).await {
                Ok(task) => tasks.push(task),
                Err(e) => {
                    if !tasks.is_empty() {
                        let orphaned: Vec<String> = tasks.iter().map(|t| t.id.to_string()).collect();
                        tracing::warn!(
                            ?orphaned,
                            error = %e,
                            "Batch submission stopped after partial success",
                        );
                    }
                    return Err(e);
                }
            }
        }
        Ok(tasks)
    }
}
