//! Payment link creation through the webhook service.
//!
//! Completion of a purchase is never observed here: the webhook updates
//! the balance server-side and the client re-fetches the user.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{BackendConfig, ConfigError};
use crate::error::BackendError;
use crate::http::{build_client, parse_response};

const PURCHASE_LINK_PATH: &str = "webhook/v1/create_purchase_link";

#[derive(Clone)]
pub struct PaymentApi {
    client: reqwest::Client,
    webhook_url: String,
    token: String,
}

impl fmt::Debug for PaymentApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentApi")
            .field("webhook_url", &self.webhook_url)
            .field("token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct PurchaseLinkRequest<'a> {
    user_uuid: Uuid,
    prod_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct PurchaseLinkResponse {
    url: String,
}

impl PaymentApi {
    /// Fails with [`ConfigError::Missing`] when no webhook host is configured.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        Self::with_client(build_client(config)?, config)
    }

    pub fn with_client(client: reqwest::Client, config: &BackendConfig) -> Result<Self, BackendError> {
        let webhook_url = config
            .webhook_url
            .clone()
            .ok_or(ConfigError::Missing("NYMIA_WEBHOOK_URL"))?;
        Ok(Self {
            client,
            webhook_url,
            token: config.api_token.clone(),
        })
    }

    /// Create a checkout link for `prod_id`, to be opened by the user.
    pub async fn create_purchase_link(
        &self,
        user_uuid: Uuid,
        prod_id: &str,
    ) -> Result<String, BackendError> {
        let response = self
            .client
            .post(format!("{}/{}", self.webhook_url, PURCHASE_LINK_PATH))
            .bearer_auth(&self.token)
            .json(&PurchaseLinkRequest { user_uuid, prod_id })
            .send()
            .await?;

        let link: PurchaseLinkResponse = parse_response("create_purchase_link", response).await?;
        if link.url.trim().is_empty() {
            return Err(BackendError::Decode {
                endpoint: "create_purchase_link",
                reason: "empty url".into(),
            });
        }

        tracing::info!(%user_uuid, prod_id, "Purchase link created");
        Ok(link.url)
    }
}
