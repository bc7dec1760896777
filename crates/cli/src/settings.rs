//! What to generate, read from the environment.

use std::path::PathBuf;

use nymia_core::generation::{TaskRequest, TaskType};
use uuid::Uuid;

/// Default number of tasks submitted per run.
const DEFAULT_BATCH_SIZE: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("Failed to read parameters from {path}: {source}")]
    ParamsFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CliSettings {
    pub user_uuid: Uuid,
    pub task_type: TaskType,
    pub parameters: serde_json::Value,
    pub batch_size: u32,
    pub auto_confirm: bool,
    /// Product offered when the balance is too low.
    pub purchase_product: Option<String>,
}

impl CliSettings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let get = |key: &'static str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let user_uuid = get("NYMIA_USER_UUID")
            .ok_or(SettingsError::Missing("NYMIA_USER_UUID"))?
            .parse::<Uuid>()
            .map_err(|e| SettingsError::Invalid {
                var: "NYMIA_USER_UUID",
                reason: e.to_string(),
            })?;

        let task_type = get("NYMIA_TASK_TYPE")
            .ok_or(SettingsError::Missing("NYMIA_TASK_TYPE"))?
            .parse::<TaskType>()
            .map_err(|e| SettingsError::Invalid {
                var: "NYMIA_TASK_TYPE",
                reason: e.to_string(),
            })?;

        let (var, raw) = match (get("NYMIA_PARAMS"), get("NYMIA_PARAMS_FILE")) {
            (Some(inline), _) => ("NYMIA_PARAMS", inline),
            (None, Some(file)) => {
                let path = PathBuf::from(file);
                let raw = std::fs::read_to_string(&path)
                    .map_err(|source| SettingsError::ParamsFile { path, source })?;
                ("NYMIA_PARAMS_FILE", raw)
            }
            (None, None) => return Err(SettingsError::Missing("NYMIA_PARAMS_FILE")),
        };
        let parameters = serde_json::from_str(&raw).map_err(|e| SettingsError::Invalid {
            var,
            reason: e.to_string(),
        })?;

        let batch_size = match get("NYMIA_BATCH_SIZE") {
            Some(v) => v.parse::<u32>().map_err(|e| SettingsError::Invalid {
                var: "NYMIA_BATCH_SIZE",
                reason: e.to_string(),
            })?,
            None => DEFAULT_BATCH_SIZE,
        };

        Ok(Self {
            user_uuid,
            task_type,
            parameters,
            batch_size,
            auto_confirm: get("NYMIA_AUTO_CONFIRM").is_some_and(|v| is_truthy(&v)),
            purchase_product: get("NYMIA_PURCHASE_PRODUCT"),
        })
    }

    pub fn request(&self) -> TaskRequest {
        TaskRequest::new(self.task_type, self.parameters.clone())
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "y")
}
