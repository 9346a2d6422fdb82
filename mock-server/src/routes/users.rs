use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::model::{Login, Profile, ProfilePatch, Registration, User};
use crate::{now_rfc3339, reject, AppState, AuthUser, HandlerResult};

#[derive(Deserialize)]
pub struct EmailQuery {
    pub email: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<Registration>,
) -> HandlerResult<(StatusCode, Json<Value>)> {
    if input.email.trim().is_empty() || input.password.is_empty() || input.username.trim().is_empty() {
        return Err(reject(StatusCode::BAD_REQUEST, "username, email and password are required"));
    }
    let mut db = state.db.write().await;
    if db.user_by_email(&input.email).is_some() {
        return Err(reject(StatusCode::CONFLICT, "email already registered"));
    }
    let user_id = db.next_id();
    let created_at = if input.created_at.is_empty() {
        now_rfc3339()
    } else {
        input.created_at
    };
    db.users.push(User {
        user_id,
        username: input.username,
        email: input.email,
        password: input.password,
        gender: input.gender,
        date_of_birth: input.date_of_birth,
        phone_number: None,
        phone_country: None,
        bio: None,
        profile_image_url: None,
        created_at,
        is_active: input.is_active,
    });
    info!(user_id, "user registered");
    Ok((StatusCode::CREATED, Json(json!({ "user_id": user_id }))))
}

/// Answers with the bare JWT as plain text.
pub async fn login(State(state): State<AppState>, Json(input): Json<Login>) -> HandlerResult<String> {
    let db = state.db.read().await;
    let user = db
        .user_by_email(&input.email)
        .filter(|u| u.password == input.password)
        .ok_or(reject(StatusCode::UNAUTHORIZED, "invalid email or password"))?;
    state
        .sign(&user.email)
        .map_err(|e| reject(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

pub async fn check_email(State(state): State<AppState>, Query(q): Query<EmailQuery>) -> Json<Value> {
    let db = state.db.read().await;
    Json(json!({ "isDuplicate": db.user_by_email(&q.email).is_some() }))
}

pub async fn profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(q): Query<EmailQuery>,
) -> HandlerResult<Json<Value>> {
    if q.email != auth.email {
        return Err(reject(StatusCode::FORBIDDEN, "not your profile"));
    }
    let db = state.db.read().await;
    profile_json(&db, &auth.email)
}

pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(patch): Json<ProfilePatch>,
) -> HandlerResult<Json<Value>> {
    let mut db = state.db.write().await;
    let user = db
        .users
        .iter_mut()
        .find(|u| u.user_id == auth.user_id)
        .ok_or(reject(StatusCode::UNAUTHORIZED, "unknown user"))?;
    if let Some(v) = patch.username {
        user.username = v;
    }
    if let Some(v) = patch.gender {
        user.gender = v;
    }
    if let Some(v) = patch.date_of_birth {
        user.date_of_birth = v;
    }
    user.phone_number = patch.phone_number.or(user.phone_number.take());
    user.phone_country = patch.phone_country.or(user.phone_country.take());
    user.bio = patch.bio.or(user.bio.take());
    profile_json(&db, &auth.email)
}

/// Stores nothing but the name; answers with the new image URL as text.
pub async fn upload_image(
    State(state): State<AppState>,
    auth: AuthUser,
    mut form: Multipart,
) -> HandlerResult<String> {
    let mut file_name = None;
    while let Some(field) = form
        .next_field()
        .await
        .map_err(|e| reject(StatusCode::BAD_REQUEST, e.to_string()))?
    {
        if field.name() == Some("file") {
            file_name = field.file_name().map(str::to_string);
            field
                .bytes()
                .await
                .map_err(|e| reject(StatusCode::BAD_REQUEST, e.to_string()))?;
        }
    }
    let file_name = file_name.ok_or(reject(StatusCode::BAD_REQUEST, "missing file part"))?;
    let url = format!("http://mock/images/{}-{file_name}", Uuid::new_v4());

    let mut db = state.db.write().await;
    if let Some(user) = db.users.iter_mut().find(|u| u.user_id == auth.user_id) {
        user.profile_image_url = Some(url.clone());
    }
    Ok(url)
}

fn profile_json(db: &crate::Db, email: &str) -> HandlerResult<Json<Value>> {
    let user = db
        .user_by_email(email)
        .ok_or(reject(StatusCode::UNAUTHORIZED, "unknown user"))?;
    let pets = db.pets.iter().filter(|p| p.owner == user.user_id).collect();
    serde_json::to_value(Profile { user, pets })
        .map(Json)
        .map_err(|e| reject(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}
