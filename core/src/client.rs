//! Stateless HTTP request builder and response parser for the pet diary API.
//!
//! # Design
//! `ApiClient` holds only a `base_url` and carries no mutable state between
//! calls. Each endpoint is split into a `build_*` method that produces an
//! `HttpRequest` and a `parse_*` method that consumes an `HttpResponse`.
//! Requests are built without an `Authorization` header; attaching the bearer
//! token is the adapter's job, since only the adapter knows the stored token
//! and the unauthenticated allow-list.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::http::{HttpBody, HttpMethod, HttpRequest, HttpResponse, MultipartPart, PartContent};
use crate::types::{
    Comment, CommunityUser, EmailCheck, EventPatch, EventRange, GraphHistory, GraphPoint,
    GraphPointUpdate, ImageUpload, LoginRequest, NewEvent, NewTodo, PetCreated, PetDraft,
    PetUpdate, PhotoHistory, Post, PostDraft, PostUpdate, ProfileUpdate, Record, RecordDraft,
    RegisterRequest, TodoPatch, UserProfile,
};
use crate::types::{Event, Pet, Todo};

pub const LOGIN_PATH: &str = "/users/login";
pub const REGISTER_PATH: &str = "/users/register";
pub const CHECK_EMAIL_PATH: &str = "/users/check-email";

/// Wire body of `POST /users/register`.
#[derive(Serialize)]
struct RegisterBody<'a> {
    #[serde(flatten)]
    form: &'a RegisterRequest,
    created_at: &'a str,
    is_active: bool,
}

#[derive(Serialize)]
struct CommentBody<'a> {
    content: &'a str,
}

/// Synchronous, stateless client for the pet diary API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: HttpMethod, path: String, query: &[(&str, String)]) -> HttpRequest {
        let mut url = format!("{}{path}", self.base_url);
        for (i, (key, value)) in query.iter().enumerate() {
            url.push(if i == 0 { '?' } else { '&' });
            url.push_str(key);
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }
        HttpRequest {
            method,
            path,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    fn json_request<T: Serialize + ?Sized>(
        &self,
        method: HttpMethod,
        path: String,
        query: &[(&str, String)],
        input: &T,
    ) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(input).map_err(|e| ApiError::Serialization(e.to_string()))?;
        let mut req = self.request(method, path, query);
        req.headers
            .push(("content-type".to_string(), "application/json".to_string()));
        req.body = Some(HttpBody::Json(body));
        Ok(req)
    }

    fn multipart_request(&self, method: HttpMethod, path: String, parts: Vec<MultipartPart>) -> HttpRequest {
        let mut req = self.request(method, path, &[]);
        req.body = Some(HttpBody::Multipart(parts));
        req
    }

    // -----------------------------------------------------------------------
    // Users
    // -----------------------------------------------------------------------

    pub fn build_login(&self, input: &LoginRequest) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, LOGIN_PATH.to_string(), &[], input)
    }

    /// `created_at` is an RFC 3339 timestamp supplied by the caller so the
    /// builder stays deterministic.
    pub fn build_register(&self, input: &RegisterRequest, created_at: &str) -> Result<HttpRequest, ApiError> {
        let body = RegisterBody {
            form: input,
            created_at,
            is_active: true,
        };
        self.json_request(HttpMethod::Post, REGISTER_PATH.to_string(), &[], &body)
    }

    pub fn build_check_email(&self, email: &str) -> HttpRequest {
        self.request(HttpMethod::Get, CHECK_EMAIL_PATH.to_string(), &[("email", email.to_string())])
    }

    pub fn build_get_profile(&self, email: &str) -> HttpRequest {
        self.request(HttpMethod::Get, "/users/profile".to_string(), &[("email", email.to_string())])
    }

    pub fn build_update_profile(&self, input: &ProfileUpdate) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Patch, "/users/profile".to_string(), &[], input)
    }

    pub fn build_upload_profile_image(&self, image: &ImageUpload) -> HttpRequest {
        self.multipart_request(
            HttpMethod::Patch,
            "/users/profile/image".to_string(),
            vec![file_part(image)],
        )
    }

    pub fn build_my_posts(&self) -> HttpRequest {
        self.request(HttpMethod::Get, "/users/posts".to_string(), &[])
    }

    pub fn build_my_comments(&self) -> HttpRequest {
        self.request(HttpMethod::Get, "/users/comments".to_string(), &[])
    }

    /// The login endpoint answers with the bare JWT, either as plain text, as
    /// a JSON string, or wrapped in `{"token": ...}`.
    pub fn parse_login(&self, response: HttpResponse) -> Result<String, ApiError> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum LoginBody {
            Bare(String),
            Wrapped { token: String },
        }

        check_status(&response)?;
        let raw = response.body.trim();
        let token = if raw.starts_with('"') || raw.starts_with('{') {
            match serde_json::from_str(raw).map_err(|e| ApiError::Deserialization(e.to_string()))? {
                LoginBody::Bare(token) | LoginBody::Wrapped { token } => token,
            }
        } else {
            raw.to_string()
        };
        if token.is_empty() {
            return Err(ApiError::Deserialization("empty token".to_string()));
        }
        Ok(token)
    }

    pub fn parse_check_email(&self, response: HttpResponse) -> Result<EmailCheck, ApiError> {
        self.parse_json(response)
    }

    pub fn parse_profile(&self, response: HttpResponse) -> Result<UserProfile, ApiError> {
        self.parse_json(response)
    }

    /// The image endpoint answers with the new URL, as text or JSON string.
    pub fn parse_profile_image_url(&self, response: HttpResponse) -> Result<String, ApiError> {
        check_status(&response)?;
        let raw = response.body.trim();
        if raw.starts_with('"') {
            return serde_json::from_str(raw).map_err(|e| ApiError::Deserialization(e.to_string()));
        }
        Ok(raw.to_string())
    }

    // -----------------------------------------------------------------------
    // Pets and record categories
    // -----------------------------------------------------------------------

    pub fn build_list_pets(&self) -> HttpRequest {
        self.request(HttpMethod::Get, "/users/pets".to_string(), &[])
    }

    pub fn build_create_pet(&self, draft: &PetDraft) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, "/users/pets".to_string(), &[], draft)
    }

    pub fn build_update_pet(&self, pet_id: i64, input: &PetUpdate) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Patch, format!("/users/pets/{pet_id}"), &[], input)
    }

    pub fn build_delete_pet(&self, pet_id: i64) -> HttpRequest {
        self.request(HttpMethod::Delete, format!("/users/pets/{pet_id}"), &[])
    }

    pub fn build_create_record(&self, pet_id: i64, draft: &RecordDraft) -> Result<HttpRequest, ApiError> {
        self.json_request(
            HttpMethod::Post,
            "/records/category".to_string(),
            &[("pet_id", pet_id.to_string())],
            draft,
        )
    }

    pub fn build_delete_record(&self, record_id: i64) -> HttpRequest {
        self.request(HttpMethod::Delete, format!("/records/{record_id}"), &[])
    }

    pub fn build_graph_history(&self, record_id: i64) -> HttpRequest {
        self.request(HttpMethod::Get, format!("/records/graph/{record_id}"), &[])
    }

    pub fn build_photo_history(&self, record_id: i64) -> HttpRequest {
        self.request(HttpMethod::Get, format!("/records/photo/{record_id}"), &[])
    }

    pub fn build_update_graph_point(
        &self,
        record_id: i64,
        data_id: i64,
        input: &GraphPointUpdate,
    ) -> Result<HttpRequest, ApiError> {
        self.json_request(
            HttpMethod::Patch,
            format!("/records/graph/{record_id}/{data_id}"),
            &[],
            input,
        )
    }

    pub fn build_delete_graph_point(&self, record_id: i64, data_id: i64) -> HttpRequest {
        self.request(HttpMethod::Delete, format!("/records/graph/{record_id}/{data_id}"), &[])
    }

    pub fn parse_pets(&self, response: HttpResponse) -> Result<Vec<Pet>, ApiError> {
        self.parse_json(response)
    }

    pub fn parse_create_pet(&self, response: HttpResponse) -> Result<PetCreated, ApiError> {
        self.parse_json(response)
    }

    pub fn parse_record(&self, response: HttpResponse) -> Result<Record, ApiError> {
        self.parse_json(response)
    }

    pub fn parse_graph_history(&self, response: HttpResponse) -> Result<GraphHistory, ApiError> {
        self.parse_json(response)
    }

    pub fn parse_photo_history(&self, response: HttpResponse) -> Result<PhotoHistory, ApiError> {
        self.parse_json(response)
    }

    pub fn parse_graph_point(&self, response: HttpResponse) -> Result<GraphPoint, ApiError> {
        self.parse_json(response)
    }

    // -----------------------------------------------------------------------
    // Todos
    // -----------------------------------------------------------------------

    pub fn build_list_todos(&self, user_id: i64) -> HttpRequest {
        self.request(HttpMethod::Get, format!("/todolists/user/{user_id}"), &[])
    }

    pub fn build_get_todo(&self, todo_id: i64) -> HttpRequest {
        self.request(HttpMethod::Get, format!("/todolists/{todo_id}"), &[])
    }

    pub fn build_create_todo(&self, input: &NewTodo) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, "/todolists".to_string(), &[], input)
    }

    pub fn build_update_todo(&self, todo_id: i64, input: &TodoPatch) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Put, format!("/todolists/{todo_id}"), &[], input)
    }

    pub fn build_delete_todo(&self, todo_id: i64) -> HttpRequest {
        self.request(HttpMethod::Delete, format!("/todolists/{todo_id}"), &[])
    }

    pub fn build_complete_todo(&self, todo_id: i64, is_completed: bool) -> HttpRequest {
        self.request(
            HttpMethod::Patch,
            format!("/todolists/{todo_id}/complete"),
            &[("isCompleted", is_completed.to_string())],
        )
    }

    pub fn parse_todo(&self, response: HttpResponse) -> Result<Todo, ApiError> {
        self.parse_json(response)
    }

    pub fn parse_todos(&self, response: HttpResponse) -> Result<Vec<Todo>, ApiError> {
        self.parse_json(response)
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    pub fn build_list_events(&self) -> HttpRequest {
        self.request(HttpMethod::Get, "/events".to_string(), &[])
    }

    pub fn build_get_event(&self, event_id: i64) -> HttpRequest {
        self.request(HttpMethod::Get, format!("/events/{event_id}"), &[])
    }

    pub fn build_event_range(&self, range: EventRange) -> HttpRequest {
        self.request(
            HttpMethod::Get,
            format!("/events/events/{}", range.as_path_segment()),
            &[],
        )
    }

    pub fn build_create_event(&self, input: &NewEvent) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, "/events".to_string(), &[], input)
    }

    pub fn build_update_event(&self, event_id: i64, input: &EventPatch) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Put, format!("/events/{event_id}"), &[], input)
    }

    pub fn build_delete_event(&self, event_id: i64) -> HttpRequest {
        self.request(HttpMethod::Delete, format!("/events/{event_id}"), &[])
    }

    pub fn parse_event(&self, response: HttpResponse) -> Result<Event, ApiError> {
        self.parse_json(response)
    }

    pub fn parse_events(&self, response: HttpResponse) -> Result<Vec<Event>, ApiError> {
        self.parse_json(response)
    }

    // -----------------------------------------------------------------------
    // Community
    // -----------------------------------------------------------------------

    pub fn build_list_posts(&self) -> HttpRequest {
        self.request(HttpMethod::Get, "/community/posts".to_string(), &[])
    }

    pub fn build_get_post(&self, post_id: i64) -> HttpRequest {
        self.request(HttpMethod::Get, format!("/community/{post_id}"), &[])
    }

    pub fn build_create_post(&self, draft: &PostDraft) -> Result<HttpRequest, ApiError> {
        let tags = serde_json::to_string(&draft.tags).map_err(|e| ApiError::Serialization(e.to_string()))?;
        let mut parts = vec![
            MultipartPart::text("title", draft.title.as_str()),
            MultipartPart::text("category", draft.category.as_str()),
            MultipartPart::text("content", draft.content.as_str()),
            MultipartPart::text("tags", tags),
        ];
        if let Some(image) = &draft.image {
            parts.push(file_part(image));
        }
        Ok(self.multipart_request(HttpMethod::Post, "/community/posts".to_string(), parts))
    }

    pub fn build_update_post(&self, post_id: i64, input: &PostUpdate) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Patch, format!("/community/{post_id}"), &[], input)
    }

    pub fn build_delete_post(&self, post_id: i64) -> HttpRequest {
        self.request(HttpMethod::Delete, format!("/community/{post_id}"), &[])
    }

    pub fn build_list_comments(&self, post_id: i64) -> HttpRequest {
        self.request(HttpMethod::Get, format!("/community/{post_id}/comments"), &[])
    }

    pub fn build_add_comment(&self, post_id: i64, content: &str) -> Result<HttpRequest, ApiError> {
        self.json_request(
            HttpMethod::Post,
            format!("/community/{post_id}/comments"),
            &[],
            &CommentBody { content },
        )
    }

    pub fn build_edit_comment(&self, post_id: i64, comment_id: i64, content: &str) -> Result<HttpRequest, ApiError> {
        self.json_request(
            HttpMethod::Patch,
            format!("/community/{post_id}/comments/{comment_id}"),
            &[],
            &CommentBody { content },
        )
    }

    pub fn build_delete_comment(&self, post_id: i64, comment_id: i64) -> HttpRequest {
        self.request(
            HttpMethod::Delete,
            format!("/community/{post_id}/comments/{comment_id}"),
            &[],
        )
    }

    pub fn build_current_user(&self) -> HttpRequest {
        self.request(HttpMethod::Get, "/community/auth/user".to_string(), &[])
    }

    pub fn parse_post(&self, response: HttpResponse) -> Result<Post, ApiError> {
        self.parse_json(response)
    }

    pub fn parse_posts(&self, response: HttpResponse) -> Result<Vec<Post>, ApiError> {
        self.parse_json(response)
    }

    pub fn parse_comment(&self, response: HttpResponse) -> Result<Comment, ApiError> {
        self.parse_json(response)
    }

    pub fn parse_comments(&self, response: HttpResponse) -> Result<Vec<Comment>, ApiError> {
        self.parse_json(response)
    }

    pub fn parse_current_user(&self, response: HttpResponse) -> Result<CommunityUser, ApiError> {
        self.parse_json(response)
    }

    // -----------------------------------------------------------------------
    // Generic
    // -----------------------------------------------------------------------

    /// Check for a 2xx status and deserialize the JSON body.
    pub fn parse_json<T: DeserializeOwned>(&self, response: HttpResponse) -> Result<T, ApiError> {
        check_status(&response)?;
        serde_json::from_str(&response.body).map_err(|e| ApiError::Deserialization(e.to_string()))
    }

    /// Check for a 2xx status and ignore the body.
    pub fn parse_empty(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }
}

fn file_part(image: &ImageUpload) -> MultipartPart {
    MultipartPart {
        name: "file".to_string(),
        content: PartContent::File {
            file_name: image.file_name.clone(),
            content_type: image.content_type.clone(),
            bytes: image.bytes.clone(),
        },
    }
}

/// Map non-2xx status codes to `ApiError::Http`.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    Err(ApiError::Http {
        status: response.status,
        body: response.body.clone(),
    })
}
