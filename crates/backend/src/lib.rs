//! HTTP clients for the hosted services the studio talks to.
//!
//! - [`TaskApi`]: task creation and gem cost estimation.
//! - [`DataApi`]: the PostgREST data backend (users, generated assets).
//! - [`PaymentApi`]: payment link creation via the webhook service.
//!
//! Every request carries the static bearer token from [`BackendConfig`].
//! The token ships with the client and grants the same access to anyone
//! holding it; scoped per-user credentials are a backend change.

pub mod config;
pub mod data;
pub mod error;
pub mod http;
pub mod payments;
pub mod tasks;

pub use config::{BackendConfig, ConfigError};
pub use data::{AssetQuery, DataApi, UserRecord};
pub use error::BackendError;
pub use payments::PaymentApi;
pub use tasks::TaskApi;
