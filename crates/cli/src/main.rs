//! `nymia` -- run a generation end to end from the terminal.
//!
//! Signs in, prices the request, asks for confirmation, submits, polls
//! until every task is terminal and prints the final result entries as
//! JSON on stdout. Logs go to stderr. Ctrl-C cancels all polling.
//!
//! # Environment variables
//!
//! | Variable                     | Required | Default | Description                            |
//! |------------------------------|----------|---------|----------------------------------------|
//! | `NYMIA_API_URL`              | yes      | --      | Task API base URL                      |
//! | `NYMIA_DATA_URL`             | yes      | --      | Data backend (PostgREST) base URL      |
//! | `NYMIA_ASSET_BASE_URL`       | yes      | --      | Base URL assets are served from        |
//! | `NYMIA_API_TOKEN`            | yes      | --      | Bearer token                           |
//! | `NYMIA_WEBHOOK_URL`          | no       | --      | Payment webhook host                   |
//! | `NYMIA_REQUEST_TIMEOUT_SECS` | no       | `30`    | Per-request HTTP timeout               |
//! | `NYMIA_MAX_POLL_ERRORS`      | no       | `0`     | Consecutive poll errors tolerated      |
//! | `NYMIA_USER_UUID`            | yes      | --      | Account to generate for                |
//! | `NYMIA_TASK_TYPE`            | yes      | --      | `image`, `faceswap`, `preview`, `examples` or `lora` |
//! | `NYMIA_PARAMS`               | no*      | --      | Inline JSON parameter object           |
//! | `NYMIA_PARAMS_FILE`          | no*      | --      | Path to a JSON parameter file          |
//! | `NYMIA_BATCH_SIZE`           | no       | `1`     | Number of tasks to submit              |
//! | `NYMIA_AUTO_CONFIRM`         | no       | `false` | Skip the cost prompt                   |
//! | `NYMIA_PURCHASE_PRODUCT`     | no       | --      | Product linked when gems run out       |
//!
//! \* One of `NYMIA_PARAMS` or `NYMIA_PARAMS_FILE` is required.

use std::sync::Arc;

use nymia_backend::BackendConfig;
use nymia_cli::confirm::StdinConfirmation;
use nymia_cli::settings::CliSettings;
use nymia_core::events::GenerationEvent;
use nymia_core::results::{ClientResultEntry, EntryStatus};
use nymia_core::store::Store;
use nymia_generation::{AutoConfirm, Confirmation, GenerationError, GenerationFlow};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const EXIT_INCOMPLETE: i32 = 2;
const EXIT_INSUFFICIENT_CREDITS: i32 = 3;
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "nymia=info,nymia_cli=info,nymia_generation=info,nymia_backend=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = BackendConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid backend configuration");
        std::process::exit(1);
    });

    let settings = CliSettings::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid generation settings");
        std::process::exit(1);
    });

    tracing::info!(
        user_uuid = %settings.user_uuid,
        task_type = %settings.task_type,
        batch_size = settings.batch_size,
        "Starting nymia",
    );

    let mut flow = GenerationFlow::new(&config, Arc::new(Store::new())).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to initialise clients");
        std::process::exit(1);
    });
    if let Some(product) = &settings.purchase_product {
        flow = flow.with_purchase_product(product.clone());
    }

    let event_log = tokio::spawn(log_events(flow.manager().subscribe()));

    if let Err(e) = flow.sign_in(settings.user_uuid).await {
        tracing::error!(error = %e, "Sign in failed");
        std::process::exit(1);
    }

    let confirmation: Box<dyn Confirmation> = if settings.auto_confirm {
        Box::new(AutoConfirm)
    } else {
        Box::new(StdinConfirmation)
    };

    let outcome = tokio::select! {
        result = flow.generate(settings.request(), settings.batch_size, confirmation.as_ref()) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    let code = match outcome {
        None => {
            tracing::info!("Interrupted, cancelling generation");
            EXIT_INTERRUPTED
        }
        Some(Ok(entries)) => report(&entries),
        Some(Err(GenerationError::InsufficientCredits {
            required,
            balance,
            purchase_url,
        })) => {
            tracing::warn!(required, balance, "Not enough gems");
            if let Some(url) = purchase_url {
                eprintln!("Buy more gems: {url}");
            }
            EXIT_INSUFFICIENT_CREDITS
        }
        Some(Err(GenerationError::Declined)) => {
            tracing::info!("Generation declined");
            0
        }
        Some(Err(e)) => {
            tracing::error!(error = %e, "Generation failed");
            1
        }
    };

    flow.shutdown().await;
    event_log.abort();
    std::process::exit(code);
}

/// Print the entries as JSON and pick the exit code.
fn report(entries: &[ClientResultEntry]) -> i32 {
    match serde_json::to_string_pretty(entries) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::error!(error = %e, "Failed to serialise results"),
    }

    if entries.iter().all(|e| e.status == EntryStatus::Completed) {
        0
    } else {
        EXIT_INCOMPLETE
    }
}

async fn log_events(mut events: broadcast::Receiver<GenerationEvent>) {
    loop {
        match events.recv().await {
            Ok(GenerationEvent::Submitted { task_id, task_type }) => {
                tracing::info!(task_id = %task_id, task_type = %task_type, "Task submitted");
            }
            Ok(GenerationEvent::Progress { task_id, percent }) => {
                tracing::info!(task_id = %task_id, progress = percent, "Generating");
            }
            Ok(GenerationEvent::Completed { task_id, asset }) => {
                tracing::info!(task_id = %task_id, url = %asset.url, "Result ready");
            }
            Ok(GenerationEvent::Failed { task_id, error }) => {
                tracing::warn!(task_id = %task_id, error = %error, "Task failed");
            }
            Ok(GenerationEvent::TimedOut { task_id, elapsed_secs }) => {
                tracing::warn!(task_id = %task_id, elapsed_secs, "Task timed out");
            }
            Ok(GenerationEvent::Cancelled { task_id }) => {
                tracing::info!(task_id = %task_id, "Task cancelled");
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Event log lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
