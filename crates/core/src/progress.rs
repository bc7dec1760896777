//! Client-side progress estimation.
//!
//! The backend reports no progress, so the percentage shown while a task
//! runs is a guess derived from elapsed time. It never reaches 100 before
//! the poller observes a completed row.

use std::time::Duration;

/// Ceiling for estimated progress while the task is still running.
pub const MAX_ESTIMATED_PERCENT: u8 = 95;

/// Progress reported on the success transition.
pub const COMPLETE_PERCENT: u8 = 100;

/// `min(elapsed / assumed * 100, 95)`, rounded down.
pub fn estimate_progress(elapsed: Duration, assumed: Duration) -> u8 {
    if assumed.is_zero() {
        return MAX_ESTIMATED_PERCENT;
    }
    let ratio = elapsed.as_secs_f64() / assumed.as_secs_f64() * 100.0;
    ratio.min(MAX_ESTIMATED_PERCENT as f64).max(0.0) as u8
}

/// Monotonic wrapper around [`estimate_progress`] for one task.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressTracker {
    percent: u8,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    /// Record a non-terminal tick and return the (never decreasing)
    /// estimate.
    pub fn observe(&mut self, elapsed: Duration, assumed: Duration) -> u8 {
        let estimate = estimate_progress(elapsed, assumed);
        self.percent = self.percent.max(estimate).min(MAX_ESTIMATED_PERCENT);
        self.percent
    }

    pub fn complete(&mut self) -> u8 {
        self.percent = COMPLETE_PERCENT;
        self.percent
    }

    pub fn fail(&mut self) -> u8 {
        self.percent = 0;
        self.percent
    }
}
