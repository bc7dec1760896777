//! Where poll loops read task rows from.

use async_trait::async_trait;
use nymia_backend::{BackendError, DataApi};
use nymia_core::generation::GeneratedAsset;
use nymia_core::types::TaskId;

/// Read access to the asset registry, keyed by task id.
#[async_trait]
pub trait AssetSource: Send + Sync {
    /// Rows whose `task_id` equals `task_id`. Empty until the backend
    /// inserts one.
    async fn assets_for_task(&self, task_id: &TaskId) -> Result<Vec<GeneratedAsset>, BackendError>;
}

#[async_trait]
impl AssetSource for DataApi {
    async fn assets_for_task(&self, task_id: &TaskId) -> Result<Vec<GeneratedAsset>, BackendError> {
        DataApi::assets_for_task(self, task_id).await
    }
}
