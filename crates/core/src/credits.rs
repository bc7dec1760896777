//! Gem cost checks performed before any task is submitted.

use serde::Serialize;

use crate::error::CoreError;

/// Largest number of items a single gated operation may request.
pub const MAX_ITEM_COUNT: u32 = 50;

/// Price of an operation as returned by the cost-estimation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostQuote {
    pub item: String,
    pub unit_cost: f64,
    pub count: u32,
}

impl CostQuote {
    pub fn new(item: impl Into<String>, unit_cost: f64, count: u32) -> Result<Self, CoreError> {
        validate_item_count(count)?;
        if !unit_cost.is_finite() || unit_cost < 0.0 {
            return Err(CoreError::Validation(format!(
                "Gem cost must be a non-negative number, got {unit_cost}"
            )));
        }
        Ok(Self {
            item: item.into(),
            unit_cost,
            count,
        })
    }

    pub fn total(&self) -> f64 {
        self.unit_cost * self.count as f64
    }
}

/// Outcome of comparing a quote against the cached balance.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GateDecision {
    /// The user must buy more gems before proceeding.
    Insufficient { required: f64, balance: f64 },
    /// The user can afford it but must explicitly confirm.
    NeedsConfirmation { required: f64, balance: f64 },
}

impl GateDecision {
    pub fn required(&self) -> f64 {
        match self {
            Self::Insufficient { required, .. } | Self::NeedsConfirmation { required, .. } => {
                *required
            }
        }
    }
}

/// A balance exactly equal to the cost is sufficient.
pub fn evaluate(quote: &CostQuote, balance: f64) -> GateDecision {
    let required = quote.total();
    if required > balance {
        GateDecision::Insufficient { required, balance }
    } else {
        GateDecision::NeedsConfirmation { required, balance }
    }
}

pub fn validate_item_count(count: u32) -> Result<(), CoreError> {
    if count == 0 || count > MAX_ITEM_COUNT {
        return Err(CoreError::Validation(format!(
            "Item count must be between 1 and {MAX_ITEM_COUNT}, got {count}"
        )));
    }
    Ok(())
}
