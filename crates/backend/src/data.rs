//! Client for the hosted PostgREST data backend.
//!
//! Filters use PostgREST operator syntax in the query string, e.g.
//! `generated_images?task_id=eq.42`.

use std::fmt;

use nymia_core::generation::GeneratedAsset;
use nymia_core::metadata::AssetMetadata;
use nymia_core::types::{AssetId, TaskId, UserId};
use serde::Deserialize;
use uuid::Uuid;

use crate::config::BackendConfig;
use crate::error::BackendError;
use crate::http::{build_client, check_status, parse_response};

const ASSETS_TABLE: &str = "generated_images";
const USERS_TABLE: &str = "user";

/// Default page size when browsing asset history.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// HTTP client for the data backend.
#[derive(Clone)]
pub struct DataApi {
    client: reqwest::Client,
    data_url: String,
    token: String,
}

impl fmt::Debug for DataApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataApi")
            .field("data_url", &self.data_url)
            .field("token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

/// Row of the `user` table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub uuid: Uuid,
    #[serde(default)]
    pub credits: f64,
}

/// Filters for browsing a user's generated assets, newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetQuery {
    pub favorites_only: bool,
    pub limit: u32,
    pub offset: u32,
}

impl Default for AssetQuery {
    fn default() -> Self {
        Self {
            favorites_only: false,
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl AssetQuery {
    fn to_params(&self, user_uuid: Uuid) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("user_uuid", format!("eq.{user_uuid}")),
            ("order", "created_at.desc".to_string()),
            ("limit", self.limit.to_string()),
            ("offset", self.offset.to_string()),
        ];
        if self.favorites_only {
            params.push(("favorite", "eq.true".to_string()));
        }
        params
    }
}

impl DataApi {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        Ok(Self::with_client(build_client(config)?, config))
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: &BackendConfig) -> Self {
        Self {
            client,
            data_url: config.data_url.clone(),
            token: config.api_token.clone(),
        }
    }

    fn request(&self, method: reqwest::Method, table: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.data_url, table))
            .bearer_auth(&self.token)
            .header("apikey", &self.token)
    }

    /// Look up a user by account uuid.
    ///
    /// Sends `GET /user?uuid=eq.<uuid>`.
    pub async fn fetch_user(&self, user_uuid: Uuid) -> Result<UserRecord, BackendError> {
        let response = self
            .request(reqwest::Method::GET, USERS_TABLE)
            .query(&[("uuid", format!("eq.{user_uuid}"))])
            .send()
            .await?;

        let rows: Vec<UserRecord> = parse_response("user", response).await?;
        rows.into_iter().next().ok_or_else(|| BackendError::NotFound {
            entity: "User",
            id: user_uuid.to_string(),
        })
    }

    /// Registry rows for one task.
    ///
    /// Sends `GET /generated_images?task_id=eq.<id>`. Returns zero rows
    /// until the backend has written one.
    pub async fn assets_for_task(
        &self,
        task_id: &TaskId,
    ) -> Result<Vec<GeneratedAsset>, BackendError> {
        let response = self
            .request(reqwest::Method::GET, ASSETS_TABLE)
            .query(&[("task_id", format!("eq.{task_id}"))])
            .send()
            .await?;

        parse_response("generated_images", response).await
    }

    /// Page through a user's asset history.
    pub async fn list_assets(
        &self,
        user_uuid: Uuid,
        query: &AssetQuery,
    ) -> Result<Vec<GeneratedAsset>, BackendError> {
        let response = self
            .request(reqwest::Method::GET, ASSETS_TABLE)
            .query(&query.to_params(user_uuid))
            .send()
            .await?;

        let assets: Vec<GeneratedAsset> = parse_response("generated_images", response).await?;
        tracing::debug!(%user_uuid, count = assets.len(), "Loaded asset history");
        Ok(assets)
    }

    /// Replace the user metadata of one asset.
    ///
    /// Sends `PATCH /generated_images?id=eq.<id>`. Generation status is
    /// never touched.
    pub async fn update_metadata(
        &self,
        asset_id: &AssetId,
        metadata: &AssetMetadata,
    ) -> Result<(), BackendError> {
        let response = self
            .request(reqwest::Method::PATCH, ASSETS_TABLE)
            .query(&[("id", format!("eq.{asset_id}"))])
            .json(metadata)
            .send()
            .await?;

        check_status(response).await?;
        tracing::info!(asset_id = %asset_id, "Asset metadata updated");
        Ok(())
    }
}
