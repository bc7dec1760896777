//! Browsing and editing the signed-in user's generated assets.
//!
//! Metadata edits are applied to the store before the PATCH is sent. If
//! the PATCH fails the previous metadata is restored and the error is
//! returned, unless a later edit has already replaced the failed one.

use std::sync::Arc;

use nymia_backend::{AssetQuery, DataApi};
use nymia_core::error::CoreError;
use nymia_core::generation::GeneratedAsset;
use nymia_core::metadata::{validate_rating, AssetMetadata};
use nymia_core::store::{Action, Store};
use nymia_core::types::AssetId;

use crate::error::GenerationError;

pub struct AssetLibrary {
    data: DataApi,
    store: Arc<Store>,
}

impl AssetLibrary {
    pub fn new(data: DataApi, store: Arc<Store>) -> Self {
        Self { data, store }
    }

    /// Load a page of the user's history into the store.
    pub async fn refresh(&self, query: &AssetQuery) -> Result<Vec<GeneratedAsset>, GenerationError> {
        let user_uuid = self
            .store
            .read(|state| state.session.as_ref().map(|s| s.user_uuid))
            .await
            .ok_or_else(|| CoreError::InvalidState("no user is signed in".into()))?;

        let assets = self.data.list_assets(user_uuid, query).await?;
        self.store
            .dispatch(Action::LibraryLoaded(assets.clone()))
            .await;
        Ok(assets)
    }

    /// Replace an asset's user metadata.
    pub async fn update_metadata(
        &self,
        asset_id: &AssetId,
        metadata: AssetMetadata,
    ) -> Result<(), GenerationError> {
        metadata.validate()?;

        let previous = self.current(asset_id).await?;

        self.store
            .dispatch(Action::MetadataChanged {
                asset_id: asset_id.clone(),
                metadata: metadata.clone(),
            })
            .await;

        if let Err(e) = self.data.update_metadata(asset_id, &metadata).await {
            tracing::warn!(asset_id = %asset_id, error = %e, "Metadata update failed, restoring");
            self.store
                .dispatch(Action::MetadataReverted {
                    asset_id: asset_id.clone(),
                    applied: metadata,
                    previous,
                })
                .await;
            return Err(e.into());
        }
        Ok(())
    }

    pub async fn set_rating(&self, asset_id: &AssetId, rating: u8) -> Result<(), GenerationError> {
        validate_rating(rating)?;
        let mut metadata = self.current(asset_id).await?;
        metadata.rating = Some(rating);
        self.update_metadata(asset_id, metadata).await
    }

    /// Flip the favorite flag. Returns the new value.
    pub async fn toggle_favorite(&self, asset_id: &AssetId) -> Result<bool, GenerationError> {
        let mut metadata = self.current(asset_id).await?;
        let favorite = !metadata.favorite.unwrap_or(false);
        metadata.favorite = Some(favorite);
        self.update_metadata(asset_id, metadata).await?;
        Ok(favorite)
    }

    async fn current(&self, asset_id: &AssetId) -> Result<AssetMetadata, GenerationError> {
        self.store
            .read(|state| state.find_asset(asset_id).map(AssetMetadata::from_asset))
            .await
            .ok_or_else(|| {
                CoreError::NotFound {
                    entity: "Asset",
                    id: asset_id.to_string(),
                }
                .into()
            })
    }
}
