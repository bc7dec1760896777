//! Application state container.
//!
//! All session, balance, result and library state lives in one
//! [`AppState`] mutated only through [`Action`]s. The [`Store`] wrapper
//! is shared explicitly (`Arc<Store>`) with the services that need it.

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::events::GenerationEvent;
use crate::generation::GeneratedAsset;
use crate::metadata::AssetMetadata;
use crate::results::{ClientResultEntry, ResultList};
use crate::types::{AssetId, UserId};

/// The signed-in account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_uuid: Uuid,
    /// Internal id required by the task API.
    pub user_id: UserId,
}

impl Session {
    /// Owner segment of this user's asset URLs.
    pub fn storage_owner(&self) -> String {
        self.user_uuid.to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    pub session: Option<Session>,
    /// Cached gem balance; refreshed by re-fetching the user.
    pub credits: Option<f64>,
    pub results: ResultList,
    pub library: Vec<GeneratedAsset>,
}

#[derive(Debug, Clone)]
pub enum Action {
    SignedIn(Session),
    SignedOut,
    CreditsLoaded(f64),
    ResultSubmitted(ClientResultEntry),
    Generation(GenerationEvent),
    LibraryLoaded(Vec<GeneratedAsset>),
    MetadataChanged {
        asset_id: AssetId,
        metadata: AssetMetadata,
    },
    /// Undo a failed edit, unless a later edit has replaced `applied`.
    MetadataReverted {
        asset_id: AssetId,
        applied: AssetMetadata,
        previous: AssetMetadata,
    },
}

impl AppState {
    pub fn reduce(&mut self, action: Action) {
        match action {
            Action::SignedIn(session) => {
                if self.session.as_ref() != Some(&session) {
                    *self = AppState::default();
                }
                self.session = Some(session);
            }
            Action::SignedOut => *self = AppState::default(),
            Action::CreditsLoaded(balance) => self.credits = Some(balance),
            Action::ResultSubmitted(entry) => {
                self.results.insert(entry);
            }
            Action::Generation(event) => {
                self.results.apply(&event);
            }
            Action::LibraryLoaded(assets) => self.library = assets,
            Action::MetadataChanged { asset_id, metadata } => {
                if let Some(asset) = self.find_asset_mut(&asset_id) {
                    metadata.apply_to(asset);
                }
            }
            Action::MetadataReverted {
                asset_id,
                applied,
                previous,
            } => {
                if let Some(asset) = self.find_asset_mut(&asset_id) {
                    if AssetMetadata::from_asset(asset) == applied {
                        previous.apply_to(asset);
                    }
                }
            }
        }
    }

    pub fn find_asset(&self, id: &AssetId) -> Option<&GeneratedAsset> {
        self.library.iter().find(|a| a.id.as_ref() == Some(id))
    }

    fn find_asset_mut(&mut self, id: &AssetId) -> Option<&mut GeneratedAsset> {
        self.library.iter_mut().find(|a| a.id.as_ref() == Some(id))
    }
}

/// Shared handle around [`AppState`].
#[derive(Debug, Default)]
pub struct Store {
    state: RwLock<AppState>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn dispatch(&self, action: Action) {
        self.state.write().await.reduce(action);
    }

    /// Run `f` against the current state without cloning it.
    pub async fn read<R>(&self, f: impl FnOnce(&AppState) -> R) -> R {
        f(&*self.state.read().await)
    }

    pub async fn snapshot(&self) -> AppState {
        self.state.read().await.clone()
    }
}
