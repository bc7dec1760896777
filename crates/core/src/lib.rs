//! Domain types and pure logic for the Nymia generation pipeline.
//!
//! Nothing in this crate performs I/O. The HTTP layer lives in
//! `nymia-backend`; the submit/poll orchestration in `nymia-generation`.

pub mod assets;
pub mod credits;
pub mod error;
pub mod events;
pub mod generation;
mod lenient;
pub mod metadata;
pub mod progress;
pub mod results;
pub mod store;
pub mod types;
