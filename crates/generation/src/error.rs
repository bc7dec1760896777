use std::time::Duration;

use nymia_backend::BackendError;
use nymia_core::error::CoreError;
use nymia_core::types::TaskId;

/// Why a poll loop stopped without a completed asset.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// The server marked the task failed.
    #[error("Generation failed: {0}")]
    Failed(String),

    /// The wall-clock cap elapsed before a terminal status.
    #[error("Generation timed out after {}s", .0.as_secs())]
    TimedOut(Duration),

    #[error("Polling cancelled")]
    Cancelled,

    /// A poll request failed and the error budget was exhausted.
    #[error("Poll request failed: {0}")]
    Backend(#[from] BackendError),
}

/// Errors from the generation services.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Core(#[from] CoreError),

    /// The balance does not cover the quoted cost.
    #[error("Insufficient gems: {required} required, {balance} available")]
    InsufficientCredits {
        required: f64,
        balance: f64,
        /// Checkout link, when a payment product is configured.
        purchase_url: Option<String>,
    },

    /// The user declined the cost confirmation.
    #[error("Generation declined")]
    Declined,

    #[error(transparent)]
    Poll(#[from] PollError),

    #[error("Task {0} is already being tracked")]
    AlreadyTracked(TaskId),

    #[error("Task {0} is not being tracked")]
    NotTracked(TaskId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timed_out_reports_whole_seconds() {
        let err = PollError::TimedOut(Duration::from_millis(180_400));
        assert_eq!(err.to_string(), "Generation timed out after 180s");
    }

    #[test]
    fn insufficient_credits_message() {
        let err = GenerationError::InsufficientCredits {
            required: 4.0,
            balance: 1.5,
            purchase_url: None,
        };
        assert_eq!(err.to_string(), "Insufficient gems: 4 required, 1.5 available");
    }
}
