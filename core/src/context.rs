//! Application context: owns one instance of every store and service.
//!
//! Screens borrow what they need from an `AppContext` instead of reaching for
//! globals, so tests can build a context around a scripted transport and
//! in-memory storage.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::adapter::HttpAdapter;
use crate::auth::{AuthState, AuthStore};
use crate::community::CommunityService;
use crate::config::ClientConfig;
use crate::credentials::CredentialStore;
use crate::error::ApiError;
use crate::http::Transport;
use crate::records::RecordService;
use crate::storage::{FileStorage, MemoryStorage, SecureStorage};
use crate::stores::{EventStore, PetStore, TodoStore};
use crate::transport::ReqwestTransport;
use crate::types::UserProfile;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Tab {
    #[default]
    Diary,
    Schedule,
    Community,
    MyPage,
}

/// Ephemeral UI state. Nothing here is persisted except through the pet
/// store's selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub tab: Tab,
    pub selected_pet_id: Option<i64>,
}

pub struct AppContext {
    pub credentials: Arc<CredentialStore>,
    pub adapter: Arc<HttpAdapter>,
    pub auth: AuthStore,
    pub pets: PetStore,
    pub todos: TodoStore,
    pub events: EventStore,
    pub records: RecordService,
    pub community: CommunityService,
    view: watch::Sender<ViewState>,
}

impl AppContext {
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>, storage: Arc<dyn SecureStorage>) -> Self {
        let credentials = Arc::new(CredentialStore::new(storage));
        let adapter = Arc::new(HttpAdapter::new(config, transport, credentials.clone()));
        let (view, _) = watch::channel(ViewState::default());
        Self {
            auth: AuthStore::new(adapter.clone()),
            pets: PetStore::new(adapter.clone()),
            todos: TodoStore::new(adapter.clone()),
            events: EventStore::new(adapter.clone()),
            records: RecordService::new(adapter.clone()),
            community: CommunityService::new(adapter.clone()),
            credentials,
            adapter,
            view,
        }
    }

    /// Production wiring: `reqwest` transport, file storage when
    /// `storage_dir` is set and memory storage otherwise.
    pub fn from_config(config: ClientConfig) -> Result<Self, ApiError> {
        config.validate()?;
        let transport = Arc::new(ReqwestTransport::new(config.request_timeout)?);
        let storage: Arc<dyn SecureStorage> = match &config.storage_dir {
            Some(dir) => Arc::new(FileStorage::new(dir.clone())),
            None => Arc::new(MemoryStorage::new()),
        };
        Ok(Self::new(config, transport, storage))
    }

    /// Restore the persisted session and pets. No network.
    pub async fn boot(&self) -> Result<AuthState, ApiError> {
        let session = self.auth.check_auth().await?;
        self.pets.load_from_storage().await;
        let selected = self.pets.selected_pet_id().await?;
        self.view.send_modify(|v| v.selected_pet_id = selected);
        info!(signed_in = session.is_signed_in(), pets = self.pets.items().len(), "booted");
        Ok(session)
    }

    /// Sign in and load the profile's pets, so later pet writes start from
    /// the stored list.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<UserProfile, ApiError> {
        let profile = self.auth.sign_in(email, password).await?;
        self.pets.load_from_storage().await;
        self.refresh_selection().await?;
        Ok(profile)
    }

    pub async fn set_user(&self, token: &str, profile: UserProfile) -> Result<(), ApiError> {
        self.auth.set_user(token, profile).await?;
        self.pets.load_from_storage().await;
        self.refresh_selection().await
    }

    /// Sign out and drop every cached collection.
    pub async fn sign_out(&self) -> Result<(), ApiError> {
        self.auth.sign_out().await?;
        self.pets.reset().await;
        self.todos.reset().await;
        self.events.reset().await;
        self.view.send_replace(ViewState::default());
        Ok(())
    }

    pub fn view(&self) -> ViewState {
        self.view.borrow().clone()
    }

    pub fn subscribe_view(&self) -> watch::Receiver<ViewState> {
        self.view.subscribe()
    }

    pub fn set_tab(&self, tab: Tab) {
        self.view.send_modify(|v| v.tab = tab);
    }

    pub async fn select_pet(&self, pet_id: i64) -> Result<(), ApiError> {
        self.pets.select_pet(pet_id).await?;
        self.view.send_modify(|v| v.selected_pet_id = Some(pet_id));
        Ok(())
    }

    /// Re-read the selection after a pet deletion may have cleared it.
    pub async fn refresh_selection(&self) -> Result<(), ApiError> {
        let selected = self.pets.selected_pet_id().await?;
        self.view.send_modify(|v| v.selected_pet_id = selected);
        Ok(())
    }
}
