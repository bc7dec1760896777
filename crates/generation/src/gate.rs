//! Gem cost check run before every submission.

use async_trait::async_trait;
use nymia_backend::TaskApi;
use nymia_core::credits::{evaluate, CostQuote, GateDecision};
use nymia_core::generation::TaskType;
use nymia_core::types::UserId;

use crate::error::GenerationError;

/// Asks the user to accept a quoted cost.
#[async_trait]
pub trait Confirmation: Send + Sync {
    /// Return `true` to proceed with the submission.
    async fn confirm(&self, quote: &CostQuote, balance: f64) -> bool;
}

/// Accepts every quote. For unattended runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

#[async_trait]
impl Confirmation for AutoConfirm {
    async fn confirm(&self, _quote: &CostQuote, _balance: f64) -> bool {
        true
    }
}

pub struct CreditGate {
    api: TaskApi,
}

impl CreditGate {
    pub fn new(api: TaskApi) -> Self {
        Self { api }
    }

    /// Price `count` items of `task_type`. Estimation errors abort; there
    /// is no fallback cost.
    pub async fn quote(
        &self,
        task_type: TaskType,
        count: u32,
        user_id: Option<&UserId>,
    ) -> Result<CostQuote, GenerationError> {
        let item = task_type.gem_item();
        let unit_cost = self.api.get_gems(item, user_id).await?;
        Ok(CostQuote::new(item, unit_cost, count)?)
    }

    /// Require an affordable quote and an explicit confirmation.
    pub async fn check(
        &self,
        quote: &CostQuote,
        balance: f64,
        confirmation: &dyn Confirmation,
    ) -> Result<(), GenerationError> {
        match evaluate(quote, balance) {
            GateDecision::Insufficient { required, balance } => {
                tracing::info!(item = %quote.item, required, balance, "Insufficient gems");
                Err(GenerationError::InsufficientCredits {
                    required,
                    balance,
                    purchase_url: None,
                })
            }
            GateDecision::NeedsConfirmation { required, balance } => {
                if confirmation.confirm(quote, balance).await {
                    tracing::debug!(item = %quote.item, required, "Cost confirmed");
                    Ok(())
                } else {
                    tracing::info!(item = %quote.item, required, "Cost declined");
                    Err(GenerationError::Declined)
                }
            }
        }
    }
}
