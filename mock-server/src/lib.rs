//! In-memory stand-in for the pet diary REST API.
//!
//! Serves users, pets and their record categories, todos, calendar events
//! and the community feed. Everything but login, registration and the email
//! check requires `Authorization: Bearer <jwt>`; the token's `sub` claim is
//! the user's email.

pub mod model;
mod routes;

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    Router,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::{Date, OffsetDateTime};
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::trace::TraceLayer;
use tracing::debug;

pub use model::Db;

pub const DEFAULT_SECRET: &str = "mock-server-secret";

/// Token lifetime in seconds.
const TOKEN_TTL: u64 = 24 * 60 * 60;

pub type Rejection = (StatusCode, String);
pub type HandlerResult<T> = Result<T, Rejection>;

pub fn reject(status: StatusCode, msg: impl Into<String>) -> Rejection {
    (status, msg.into())
}

pub fn not_found(what: &str) -> Rejection {
    reject(StatusCode::NOT_FOUND, format!("{what} not found"))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: u64,
    pub exp: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<RwLock<Db>>,
    keys: Arc<Keys>,
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl AppState {
    pub fn new(secret: &str) -> Self {
        Self {
            db: Arc::new(RwLock::new(Db::default())),
            keys: Arc::new(Keys {
                encoding: EncodingKey::from_secret(secret.as_bytes()),
                decoding: DecodingKey::from_secret(secret.as_bytes()),
            }),
        }
    }

    pub fn sign(&self, email: &str) -> anyhow::Result<String> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
        let claims = Claims {
            sub: email.to_string(),
            iat: now,
            exp: now + TOKEN_TTL,
        };
        let token = encode(&Header::default(), &claims, &self.keys.encoding)?;
        debug!(user = %email, "jwt signed");
        Ok(token)
    }

    fn verify(&self, token: &str) -> Option<Claims> {
        decode::<Claims>(token, &self.keys.decoding, &Validation::default())
            .ok()
            .map(|data| data.claims)
    }
}

/// The caller, resolved from the bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub email: String,
    pub username: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Rejection;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(reject(StatusCode::UNAUTHORIZED, "missing Authorization header"))?;
        let token = auth
            .strip_prefix("Bearer ")
            .ok_or(reject(StatusCode::UNAUTHORIZED, "invalid auth scheme"))?;
        let claims = state
            .verify(token)
            .ok_or(reject(StatusCode::UNAUTHORIZED, "invalid or expired token"))?;

        let db = state.db.read().await;
        let user = db
            .user_by_email(&claims.sub)
            .ok_or(reject(StatusCode::UNAUTHORIZED, "unknown user"))?;
        Ok(AuthUser {
            user_id: user.user_id,
            email: user.email.clone(),
            username: user.username.clone(),
        })
    }
}

/// RFC 3339 timestamp for `created_at` style fields.
pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}

/// `YYYY-MM-DD`, the prefix every datetime field starts with.
pub fn iso_date(date: Date) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), u8::from(date.month()), date.day())
}

pub fn app() -> Router {
    app_with_state(AppState::new(DEFAULT_SECRET))
}

pub fn app_with_state(state: AppState) -> Router {
    routes::router().with_state(state).layer(TraceLayer::new_for_http())
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}
