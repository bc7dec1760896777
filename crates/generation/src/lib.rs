//! Submission, polling and bookkeeping of generation tasks.
//!
//! The [`GenerationFlow`] composes the pieces end to end. The pieces are
//! usable on their own:
//!
//! - [`TaskSubmitter`] creates tasks through the task API.
//! - [`GenerationPoller`] polls the asset registry for one task or a
//!   batch until every task is terminal, timed out or cancelled.
//! - [`GenerationManager`] runs poll loops as spawned tasks and
//!   broadcasts their [`GenerationEvent`](nymia_core::events::GenerationEvent)s.
//! - [`CreditGate`] prices a request and requires a [`Confirmation`].
//! - [`AssetLibrary`] browses history and edits asset metadata.

pub mod batch;
pub mod error;
pub mod flow;
pub mod gate;
pub mod library;
pub mod manager;
pub mod poller;
pub mod source;
pub mod submitter;

#[cfg(test)]
mod testing;

pub use batch::BatchOutcome;
pub use error::{GenerationError, PollError};
pub use flow::GenerationFlow;
pub use gate::{AutoConfirm, Confirmation, CreditGate};
pub use library::AssetLibrary;
pub use manager::{GenerationManager, Tracked};
pub use poller::{GenerationPoller, PollConfig, PollResult};
pub use source::AssetSource;
pub use submitter::TaskSubmitter;
