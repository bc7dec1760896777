//! Interactive cost confirmation on the terminal.

use async_trait::async_trait;
use nymia_core::credits::CostQuote;
use nymia_generation::Confirmation;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Asks on stderr and reads the answer from stdin.
#[derive(Debug, Default)]
pub struct StdinConfirmation;

#[async_trait]
impl Confirmation for StdinConfirmation {
    async fn confirm(&self, quote: &CostQuote, balance: f64) -> bool {
        eprint!("{} [y/N] ", prompt(quote, balance));

        let mut answer = String::new();
        let mut stdin = BufReader::new(tokio::io::stdin());
        match stdin.read_line(&mut answer).await {
            Ok(_) => is_affirmative(&answer),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read confirmation");
                false
            }
        }
    }
}

pub fn prompt(quote: &CostQuote, balance: f64) -> String {
    format!(
        "Spend {} gems on {} x {}? Balance: {} gems.",
        quote.total(),
        quote.count,
        quote.item,
        balance
    )
}

pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
