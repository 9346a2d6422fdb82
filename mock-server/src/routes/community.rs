use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::model::{Comment, CommentBody, Post, PostPatch};
use crate::{not_found, now_rfc3339, reject, AppState, AuthUser, HandlerResult};

pub async fn list_posts(State(state): State<AppState>) -> Json<Vec<Post>> {
    let db = state.db.read().await;
    Json(db.posts.clone())
}

/// The detail view names the id `id` rather than `postId`.
pub async fn get_post(State(state): State<AppState>, Path(post_id): Path<i64>) -> HandlerResult<Json<Value>> {
    let db = state.db.read().await;
    let post = db
        .posts
        .iter()
        .find(|p| p.post_id == post_id)
        .ok_or(not_found("post"))?;
    let mut body = serde_json::to_value(post).map_err(|e| reject(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    if let Some(fields) = body.as_object_mut() {
        if let Some(id) = fields.remove("postId") {
            fields.insert("id".to_string(), id);
        }
    }
    Ok(Json(body))
}

/// Multipart form: `title`, `category`, `content`, `tags` (a JSON array)
/// and an optional `file`.
pub async fn create_post(
    State(state): State<AppState>,
    auth: AuthUser,
    mut form: Multipart,
) -> HandlerResult<(StatusCode, Json<Post>)> {
    let mut title = String::new();
    let mut category = String::new();
    let mut content = String::new();
    let mut tags = Vec::new();
    let mut image_url = None;

    while let Some(field) = form
        .next_field()
        .await
        .map_err(|e| reject(StatusCode::BAD_REQUEST, e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            field
                .bytes()
                .await
                .map_err(|e| reject(StatusCode::BAD_REQUEST, e.to_string()))?;
            image_url = Some(format!("http://mock/images/{}-{file_name}", Uuid::new_v4()));
            continue;
        }
        let text = field
            .text()
            .await
            .map_err(|e| reject(StatusCode::BAD_REQUEST, e.to_string()))?;
        match name.as_str() {
            "title" => title = text,
            "category" => category = text,
            "content" => content = text,
            "tags" => {
                tags = serde_json::from_str(&text)
                    .map_err(|e| reject(StatusCode::BAD_REQUEST, format!("tags: {e}")))?
            }
            _ => {}
        }
    }
    if title.trim().is_empty() || content.trim().is_empty() {
        return Err(reject(StatusCode::BAD_REQUEST, "title and content are required"));
    }

    let mut db = state.db.write().await;
    let post = Post {
        post_id: db.next_id(),
        title,
        content,
        category,
        tags,
        username: auth.username,
        image_url,
        created_at: now_rfc3339(),
        updated_at: None,
    };
    db.posts.push(post.clone());
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn update_post(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(post_id): Path<i64>,
    Json(patch): Json<PostPatch>,
) -> HandlerResult<Json<Post>> {
    let mut db = state.db.write().await;
    let post = own_post(&mut db.posts, post_id, &auth)?;
    if let Some(title) = patch.title {
        post.title = title;
    }
    if let Some(category) = patch.category {
        post.category = category;
    }
    if let Some(content) = patch.content {
        post.content = content;
    }
    if let Some(tags) = patch.tags {
        post.tags = tags;
    }
    post.updated_at = Some(now_rfc3339());
    Ok(Json(post.clone()))
}

pub async fn delete_post(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(post_id): Path<i64>,
) -> HandlerResult<StatusCode> {
    let mut db = state.db.write().await;
    own_post(&mut db.posts, post_id, &auth)?;
    db.posts.retain(|p| p.post_id != post_id);
    db.comments.retain(|c| c.post_id != post_id);
    Ok(StatusCode::NO_CONTENT)
}

fn own_post<'a>(posts: &'a mut [Post], post_id: i64, auth: &AuthUser) -> HandlerResult<&'a mut Post> {
    let post = posts
        .iter_mut()
        .find(|p| p.post_id == post_id)
        .ok_or(not_found("post"))?;
    if post.username != auth.username {
        return Err(reject(StatusCode::FORBIDDEN, "not your post"));
    }
    Ok(post)
}

pub async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> HandlerResult<Json<Vec<Comment>>> {
    let db = state.db.read().await;
    if !db.posts.iter().any(|p| p.post_id == post_id) {
        return Err(not_found("post"));
    }
    Ok(Json(db.comments.iter().filter(|c| c.post_id == post_id).cloned().collect()))
}

pub async fn add_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(post_id): Path<i64>,
    Json(body): Json<CommentBody>,
) -> HandlerResult<(StatusCode, Json<Comment>)> {
    if body.content.trim().is_empty() {
        return Err(reject(StatusCode::BAD_REQUEST, "content is required"));
    }
    let mut db = state.db.write().await;
    if !db.posts.iter().any(|p| p.post_id == post_id) {
        return Err(not_found("post"));
    }
    let comment = Comment {
        id: db.next_id(),
        post_id,
        comment: body.content,
        username: auth.username,
        created_at: now_rfc3339(),
        updated_at: None,
    };
    db.comments.push(comment.clone());
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn edit_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((post_id, id)): Path<(i64, i64)>,
    Json(body): Json<CommentBody>,
) -> HandlerResult<Json<Comment>> {
    let mut db = state.db.write().await;
    let comment = own_comment(&mut db.comments, post_id, id, &auth)?;
    comment.comment = body.content;
    comment.updated_at = Some(now_rfc3339());
    Ok(Json(comment.clone()))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((post_id, id)): Path<(i64, i64)>,
) -> HandlerResult<StatusCode> {
    let mut db = state.db.write().await;
    own_comment(&mut db.comments, post_id, id, &auth)?;
    db.comments.retain(|c| c.id != id);
    Ok(StatusCode::NO_CONTENT)
}

fn own_comment<'a>(
    comments: &'a mut [Comment],
    post_id: i64,
    id: i64,
    auth: &AuthUser,
) -> HandlerResult<&'a mut Comment> {
    let comment = comments
        .iter_mut()
        .find(|c| c.post_id == post_id && c.id == id)
        .ok_or(not_found("comment"))?;
    if comment.username != auth.username {
        return Err(reject(StatusCode::FORBIDDEN, "not your comment"));
    }
    Ok(comment)
}

pub async fn current_user(auth: AuthUser) -> Json<Value> {
    Json(json!({ "username": auth.username }))
}

pub async fn my_posts(State(state): State<AppState>, auth: AuthUser) -> Json<Vec<Post>> {
    let db = state.db.read().await;
    Json(
        db.posts
            .iter()
            .filter(|p| p.username == auth.username)
            .cloned()
            .collect(),
    )
}

pub async fn my_comments(State(state): State<AppState>, auth: AuthUser) -> Json<Vec<Comment>> {
    let db = state.db.read().await;
    Json(
        db.comments
            .iter()
            .filter(|c| c.username == auth.username)
            .cloned()
            .collect(),
    )
}
