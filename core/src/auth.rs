//! Auth store: session state plus the account endpoints.
//!
//! # Design
//! Sign-in is all-or-nothing. The login token is only used in memory until
//! the profile request made with it has succeeded; then token and profile are
//! handed to `CredentialStore::save`, which writes both or neither. A failure
//! at any step leaves the persisted record exactly as it was.
//!
//! Token and profile in `AuthState` are published by `CredentialStore` after
//! each successful write, including the pet store's snapshot rewrites. This
//! store only drives `loading` and `error` on the same channel.
//!
//! The user's identity is the JWT `sub` claim. It is read without verifying
//! the signature: the server verifies every request anyway, and the client
//! has no key.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::adapter::HttpAdapter;
use crate::error::ApiError;
use crate::types::{
    require, Comment, ImageUpload, LoginRequest, Post, ProfileUpdate, RegisterRequest, UserProfile,
};

/// Observable session state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthState {
    pub token: Option<String>,
    pub profile: Option<UserProfile>,
    pub loading: bool,
    pub error: Option<ApiError>,
}

impl AuthState {
    pub fn is_signed_in(&self) -> bool {
        self.token.is_some()
    }
}

pub struct AuthStore {
    adapter: Arc<HttpAdapter>,
    in_flight: AtomicUsize,
}

struct Busy<'a>(&'a AuthStore);

impl Drop for Busy<'_> {
    fn drop(&mut self) {
        let in_flight = &self.0.in_flight;
        self.0.state().send_modify(|s| {
            s.loading = in_flight.fetch_sub(1, Ordering::SeqCst) > 1;
        });
    }
}

impl AuthStore {
    pub fn new(adapter: Arc<HttpAdapter>) -> Self {
        Self {
            adapter,
            in_flight: AtomicUsize::new(0),
        }
    }

    fn state(&self) -> &watch::Sender<AuthState> {
        self.adapter.credentials().session()
    }

    pub fn snapshot(&self) -> AuthState {
        self.state().borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state().subscribe()
    }

    fn busy(&self) -> Busy<'_> {
        let in_flight = &self.in_flight;
        self.state().send_modify(|s| {
            in_flight.fetch_add(1, Ordering::SeqCst);
            s.loading = true;
            s.error = None;
        });
        Busy(self)
    }

    fn settle<R>(&self, result: Result<R, ApiError>) -> Result<R, ApiError> {
        result.map_err(|err| {
            let stored = err.clone();
            self.state().send_modify(|s| s.error = Some(stored));
            err
        })
    }

    /// Log in, fetch the profile and persist both.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<UserProfile, ApiError> {
        let _busy = self.busy();
        let result = async {
            require("email", email)?;
            require("password", password)?;
            let client = self.adapter.client();
            let login = client.build_login(&LoginRequest {
                email: email.trim().to_string(),
                password: password.to_string(),
            })?;
            let token = client.parse_login(self.adapter.send(login).await?)?;
            let subject = token_subject(&token)?;

            let response = self
                .adapter
                .send_with_token(client.build_get_profile(&subject), &token)
                .await?;
            let profile = client.parse_profile(response)?;

            self.adapter.credentials().save(&token, &profile).await?;
            info!(user = %subject, "signed in");
            Ok(profile)
        }
        .await;
        self.settle(result)
    }

    /// Load the persisted session into memory. Never touches the network.
    pub async fn check_auth(&self) -> Result<AuthState, ApiError> {
        let _busy = self.busy();
        let result = self.adapter.credentials().load().await;
        self.settle(result)?;
        Ok(self.snapshot())
    }

    /// Replace the persisted session with `token` and `profile`.
    pub async fn set_user(&self, token: &str, profile: UserProfile) -> Result<(), ApiError> {
        let result = self.adapter.credentials().save(token, &profile).await;
        self.settle(result)
    }

    /// Forget the session. Safe to call when already signed out.
    pub async fn sign_out(&self) -> Result<(), ApiError> {
        let result = self.adapter.credentials().clear().await;
        self.settle(result)?;
        info!("signed out");
        Ok(())
    }

    pub async fn register(&self, input: RegisterRequest) -> Result<(), ApiError> {
        let _busy = self.busy();
        let result = async {
            require("username", &input.username)?;
            require("email", &input.email)?;
            require("password", &input.password)?;
            let created_at = OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .map_err(|e| ApiError::Serialization(e.to_string()))?;
            let client = self.adapter.client();
            let response = self
                .adapter
                .send(client.build_register(&input, &created_at)?)
                .await?;
            client.parse_empty(response)?;
            info!(email = %input.email, "registered");
            Ok(())
        }
        .await;
        self.settle(result)
    }

    /// Whether `email` is already taken. Sent without credentials.
    pub async fn check_email_duplicate(&self, email: &str) -> Result<bool, ApiError> {
        require("email", email)?;
        let client = self.adapter.client();
        let response = self
            .adapter
            .send_optional_auth(client.build_check_email(email.trim()))
            .await?;
        Ok(client.parse_check_email(response)?.is_duplicate)
    }

    /// Send profile edits, then merge them into the persisted profile.
    pub async fn update_profile(&self, patch: ProfileUpdate) -> Result<UserProfile, ApiError> {
        let _busy = self.busy();
        let result = async {
            if patch.username.as_deref().is_some_and(|u| u.trim().is_empty()) {
                return Err(ApiError::validation("username is required"));
            }
            let client = self.adapter.client();
            let response = self.adapter.send(client.build_update_profile(&patch)?).await?;
            client.parse_empty(response)?;
            self.merge_profile(move |p| patch.apply_to(p)).await
        }
        .await;
        self.settle(result)
    }

    /// Upload a new avatar and store the URL the server hands back.
    pub async fn upload_profile_image(&self, image: ImageUpload) -> Result<String, ApiError> {
        let _busy = self.busy();
        let result = async {
            let client = self.adapter.client();
            let response = self
                .adapter
                .send(client.build_upload_profile_image(&image))
                .await?;
            let url = client.parse_profile_image_url(response)?;
            let stored = url.clone();
            self.merge_profile(move |p| p.profile_image_url = Some(stored))
                .await?;
            Ok(url)
        }
        .await;
        self.settle(result)
    }

    async fn merge_profile<F>(&self, edit: F) -> Result<UserProfile, ApiError>
    where
        F: FnOnce(&mut UserProfile) + Send,
    {
        let Some(profile) = self.adapter.credentials().update_profile(edit).await? else {
            warn!("profile edit without a stored profile");
            return Err(ApiError::AuthRequired);
        };
        Ok(profile)
    }

    pub async fn my_posts(&self) -> Result<Vec<Post>, ApiError> {
        let client = self.adapter.client();
        let response = self.adapter.send(client.build_my_posts()).await?;
        client.parse_posts(response)
    }

    pub async fn my_comments(&self) -> Result<Vec<Comment>, ApiError> {
        let client = self.adapter.client();
        let response = self.adapter.send(client.build_my_comments()).await?;
        client.parse_comments(response)
    }
}

/// The `sub` claim of a JWT, read without checking the signature.
pub fn token_subject(token: &str) -> Result<String, ApiError> {
    #[derive(Deserialize)]
    struct Claims {
        sub: String,
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims.sub)
        .map_err(|e| ApiError::Deserialization(format!("auth token: {e}")))
}
