//! Generation task model: task types, statuses, asset registry rows, and
//! the per-tick classification of a poll response.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::lenient;
use crate::types::{AssetId, TaskId, Timestamp};

// ---------------------------------------------------------------------------
// Task types
// ---------------------------------------------------------------------------

/// Kinds of asynchronous work the task API accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskType {
    #[serde(rename = "image")]
    Image,
    #[serde(rename = "faceswap")]
    FaceSwap,
    #[serde(rename = "preview")]
    Preview,
    #[serde(rename = "examples")]
    ExampleBatch,
    #[serde(rename = "lora")]
    LoraTraining,
}

/// Timing knobs for polling one task type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollProfile {
    /// Delay between the end of one poll request and the next.
    pub interval: Duration,
    /// Guessed total run time, used only for cosmetic progress.
    pub assumed_duration: Duration,
    /// Wall-clock cap after which polling gives up.
    pub max_duration: Duration,
}

impl TaskType {
    pub const ALL: [TaskType; 5] = [
        TaskType::Image,
        TaskType::FaceSwap,
        TaskType::Preview,
        TaskType::ExampleBatch,
        TaskType::LoraTraining,
    ];

    /// Value sent as the `type` query parameter of `createtask`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::FaceSwap => "faceswap",
            Self::Preview => "preview",
            Self::ExampleBatch => "examples",
            Self::LoraTraining => "lora",
        }
    }

    /// Item key used when asking the cost-estimation endpoint for a price.
    pub fn gem_item(self) -> &'static str {
        match self {
            Self::Image | Self::Preview | Self::ExampleBatch => "nymia_image",
            Self::FaceSwap => "faceswap",
            Self::LoraTraining => "nymia_lora",
        }
    }

    pub fn poll_profile(self) -> PollProfile {
        let (interval, assumed, max) = match self {
            Self::FaceSwap => (1, 15, 3 * 60),
            Self::Image | Self::Preview => (2, 30, 5 * 60),
            Self::ExampleBatch => (2, 45, 8 * 60),
            Self::LoraTraining => (10, 20 * 60, 3 * 60 * 60),
        };
        PollProfile {
            interval: Duration::from_secs(interval),
            assumed_duration: Duration::from_secs(assumed),
            max_duration: Duration::from_secs(max),
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| CoreError::Validation(format!("Unknown task type '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Value of the `generation_status` column.
///
/// Anything other than `completed` or `failed` (including a missing
/// column) is treated as still in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum GenerationStatus {
    Completed,
    Failed,
    Pending(String),
}

impl GenerationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Pending(s) => s,
        }
    }
}

impl Default for GenerationStatus {
    fn default() -> Self {
        Self::Pending(String::new())
    }
}

impl From<Option<String>> for GenerationStatus {
    fn from(value: Option<String>) -> Self {
        match value.as_deref() {
            Some("completed") => Self::Completed,
            Some("failed") => Self::Failed,
            _ => Self::Pending(value.unwrap_or_default()),
        }
    }
}

impl From<GenerationStatus> for Option<String> {
    fn from(value: GenerationStatus) -> Self {
        match value {
            GenerationStatus::Pending(s) if s.is_empty() => None,
            other => Some(other.as_str().to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Asset registry row
// ---------------------------------------------------------------------------

/// One row of the backend's `generated_images` table.
///
/// Row existence and status are owned by the server; the client reads
/// them and later edits only the user metadata fields. Metadata columns
/// decode leniently so a malformed value never hides a finished file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedAsset {
    #[serde(default)]
    pub id: Option<AssetId>,
    #[serde(default)]
    pub task_id: Option<TaskId>,
    #[serde(default)]
    pub generation_status: GenerationStatus,
    #[serde(default)]
    pub system_filename: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional")]
    pub user_filename: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional")]
    pub file_path: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional")]
    pub user_notes: Option<String>,
    #[serde(default, deserialize_with = "lenient::tags")]
    pub user_tags: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient::rating")]
    pub rating: Option<u8>,
    #[serde(default, deserialize_with = "lenient::optional")]
    pub favorite: Option<bool>,
    #[serde(default, deserialize_with = "lenient::timestamp")]
    pub created_at: Option<Timestamp>,
}

impl GeneratedAsset {
    /// Non-empty system filename, if the file has been written.
    pub fn system_filename(&self) -> Option<&str> {
        self.system_filename
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Interpretation of one poll response for a single task.
#[derive(Debug, PartialEq)]
pub enum PollClassification<'a> {
    /// No row yet, or the row is not in a terminal state.
    Pending { status: &'a str },
    /// Row is `completed` and its file has been written.
    Completed(&'a GeneratedAsset),
    /// Row is `failed`.
    Failed(&'a GeneratedAsset),
}

/// Classify the rows returned for `task_id=eq.<id>`.
///
/// Only the first row is considered. A `completed` row without a system
/// filename is still pending: the row can exist before the file write
/// finishes.
pub fn classify_poll(rows: &[GeneratedAsset]) -> PollClassification<'_> {
    let Some(row) = rows.first() else {
        return PollClassification::Pending { status: "" };
    };

    match row.generation_status {
        GenerationStatus::Completed if row.system_filename().is_some() => {
            PollClassification::Completed(row)
        }
        GenerationStatus::Failed => PollClassification::Failed(row),
        ref other => PollClassification::Pending {
            status: other.as_str(),
        },
    }
}

// ---------------------------------------------------------------------------
// Requests and tasks
// ---------------------------------------------------------------------------

/// A generation request ready for submission.
///
/// The parameter payload is free-form and validated by the backend; the
/// client only checks that it is a non-empty JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRequest {
    pub task_type: TaskType,
    pub parameters: serde_json::Value,
}

impl TaskRequest {
    pub fn new(task_type: TaskType, parameters: serde_json::Value) -> Self {
        Self {
            task_type,
            parameters,
        }
    }

    /// Face-swap `face_image` onto `reference_image`.
    pub fn face_swap(reference_image: impl Into<String>, face_image: impl Into<String>) -> Self {
        Self::new(
            TaskType::FaceSwap,
            serde_json::json!({
                "reference_image": reference_image.into(),
                "face_image": face_image.into(),
            }),
        )
    }

    /// Source and target inputs for result entries (face-swap only).
    pub fn inputs(&self) -> (Option<String>, Option<String>) {
        if self.task_type != TaskType::FaceSwap {
            return (None, None);
        }
        let field = |name: &str| {
            self.parameters
                .get(name)
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };
        (field("reference_image"), field("face_image"))
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        match self.parameters.as_object() {
            Some(map) if !map.is_empty() => {}
            _ => {
                return Err(CoreError::Validation(format!(
                    "{} request requires a non-empty parameter object",
                    self.task_type
                )))
            }
        }

        if self.task_type == TaskType::FaceSwap {
            for field in ["reference_image", "face_image"] {
                let present = self
                    .parameters
                    .get(field)
                    .and_then(|v| v.as_str())
                    .is_some_and(|s| !s.trim().is_empty());
                if !present {
                    return Err(CoreError::Validation(format!(
                        "faceswap request is missing '{field}'"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// A task accepted by the task API.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationTask {
    pub id: TaskId,
    pub task_type: TaskType,
    /// Storage owner segment used when building asset URLs.
    pub owner: String,
    pub submitted_at: Timestamp,
    /// Submitted payload, echoed back for regeneration.
    pub parameters: serde_json::Value,
}

impl GenerationTask {
    pub fn new(id: TaskId, owner: impl Into<String>, request: &TaskRequest) -> Self {
        Self {
            id,
            task_type: request.task_type,
            owner: owner.into(),
            submitted_at: chrono::Utc::now(),
            parameters: request.parameters.clone(),
        }
    }

    /// Time since submission; zero if the clock went backwards.
    pub fn age(&self) -> Duration {
        (chrono::Utc::now() - self.submitted_at)
            .to_std()
            .unwrap_or_default()
    }

    /// A fresh request carrying the same type and parameters.
    pub fn regeneration_request(&self) -> TaskRequest {
        TaskRequest::new(self.task_type, self.parameters.clone())
    }
}
