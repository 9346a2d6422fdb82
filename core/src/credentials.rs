//! Persisted credential record: auth token, cached profile, selected pet.
//!
//! # Design
//! `CredentialStore` is the only component that writes the persisted keys.
//! Every write path takes `write_lock`, so a profile edit and a pet snapshot
//! regeneration issued close together are applied one after the other as
//! whole read-modify-write units instead of overwriting each other.
//!
//! Reads never cache: the adapter asks for the token on every request so an
//! external sign-out is observed immediately.
//!
//! The observable session (`AuthState` token and profile) is owned here too.
//! It is updated after each successful write under the same lock, so no
//! writer can leave the in-memory profile behind the persisted one.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

use crate::auth::AuthState;
use crate::error::ApiError;
use crate::storage::SecureStorage;
use crate::types::{Pet, UserProfile};

pub const AUTH_TOKEN_KEY: &str = "authToken";
pub const USER_INFO_KEY: &str = "userInfo";
pub const SELECTED_PET_KEY: &str = "selectedPetId";

/// Token and profile as last persisted on this device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialRecord {
    pub token: Option<String>,
    pub profile: Option<UserProfile>,
}

pub struct CredentialStore {
    storage: Arc<dyn SecureStorage>,
    write_lock: Mutex<()>,
    session: watch::Sender<AuthState>,
}

impl CredentialStore {
    pub fn new(storage: Arc<dyn SecureStorage>) -> Self {
        let (session, _) = watch::channel(AuthState::default());
        Self {
            storage,
            write_lock: Mutex::new(()),
            session,
        }
    }

    /// Observable session state. Token and profile track the persisted keys.
    pub(crate) fn session(&self) -> &watch::Sender<AuthState> {
        &self.session
    }

    fn mirror(&self, token: Option<String>, profile: Option<UserProfile>) {
        self.session.send_modify(|s| {
            s.token = token;
            s.profile = profile;
        });
    }

    pub async fn token(&self) -> Result<Option<String>, ApiError> {
        Ok(self
            .storage
            .get(AUTH_TOKEN_KEY)
            .await?
            .filter(|t| !t.is_empty()))
    }

    /// Like `token`, but a missing token is `AuthRequired`.
    pub async fn require_token(&self) -> Result<String, ApiError> {
        self.token().await?.ok_or(ApiError::AuthRequired)
    }

    pub async fn profile(&self) -> Result<Option<UserProfile>, ApiError> {
        match self.storage.get(USER_INFO_KEY).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| ApiError::Deserialization(format!("{USER_INFO_KEY}: {e}"))),
            None => Ok(None),
        }
    }

    /// Read token and profile, and publish them as the current session.
    pub async fn load(&self) -> Result<CredentialRecord, ApiError> {
        let _guard = self.write_lock.lock().await;
        let record = CredentialRecord {
            token: self.token().await?,
            profile: self.profile().await?,
        };
        self.mirror(record.token.clone(), record.profile.clone());
        Ok(record)
    }

    /// Persist token and profile together. If the profile write fails the
    /// previous token is put back, so either both keys change or neither does.
    pub async fn save(&self, token: &str, profile: &UserProfile) -> Result<(), ApiError> {
        let blob = serde_json::to_string(profile).map_err(|e| ApiError::Serialization(e.to_string()))?;
        let _guard = self.write_lock.lock().await;

        let previous_token = self.storage.get(AUTH_TOKEN_KEY).await?;
        self.storage.set(AUTH_TOKEN_KEY, token).await?;
        if let Err(e) = self.storage.set(USER_INFO_KEY, &blob).await {
            let restored = match &previous_token {
                Some(prev) => self.storage.set(AUTH_TOKEN_KEY, prev).await,
                None => self.storage.delete(AUTH_TOKEN_KEY).await,
            };
            if let Err(restore_err) = restored {
                warn!(error = %restore_err, "failed to restore previous auth token");
            }
            return Err(e);
        }
        self.mirror(Some(token.to_string()), Some(profile.clone()));
        debug!("credentials saved");
        Ok(())
    }

    /// Read-modify-write the persisted profile as one unit. Returns the new
    /// profile, or `None` when no profile is stored (nothing is written).
    pub async fn update_profile<F>(&self, edit: F) -> Result<Option<UserProfile>, ApiError>
    where
        F: FnOnce(&mut UserProfile) + Send,
    {
        let _guard = self.write_lock.lock().await;
        let Some(mut profile) = self.profile().await? else {
            return Ok(None);
        };
        edit(&mut profile);
        let blob = serde_json::to_string(&profile).map_err(|e| ApiError::Serialization(e.to_string()))?;
        self.storage.set(USER_INFO_KEY, &blob).await?;
        let published = profile.clone();
        self.session.send_modify(|s| s.profile = Some(published));
        Ok(Some(profile))
    }

    /// Regenerate the profile's embedded pet list from `pets`.
    pub async fn replace_pets(&self, pets: &[Pet]) -> Result<Option<UserProfile>, ApiError> {
        let pets = pets.to_vec();
        self.update_profile(move |profile| profile.pets = pets).await
    }

    /// Delete every persisted key. Missing keys are fine.
    pub async fn clear(&self) -> Result<(), ApiError> {
        let _guard = self.write_lock.lock().await;
        self.storage.delete(AUTH_TOKEN_KEY).await?;
        self.storage.delete(USER_INFO_KEY).await?;
        self.storage.delete(SELECTED_PET_KEY).await?;
        self.mirror(None, None);
        Ok(())
    }

    pub async fn selected_pet_id(&self) -> Result<Option<i64>, ApiError> {
        let Some(raw) = self.storage.get(SELECTED_PET_KEY).await? else {
            return Ok(None);
        };
        match raw.trim().parse() {
            Ok(id) => Ok(Some(id)),
            Err(_) => {
                warn!(value = %raw, "ignoring malformed {SELECTED_PET_KEY}");
                Ok(None)
            }
        }
    }

    pub async fn set_selected_pet_id(&self, pet_id: Option<i64>) -> Result<(), ApiError> {
        let _guard = self.write_lock.lock().await;
        match pet_id {
            Some(id) => self.storage.set(SELECTED_PET_KEY, &id.to_string()).await,
            None => self.storage.delete(SELECTED_PET_KEY).await,
        }
    }
}
