//! Domain DTOs for the pet diary API.
//!
//! # Design
//! Field names are Rust snake_case; the server's mixed camelCase/snake_case
//! wire names are mapped with `#[serde(rename)]`. Types that the server
//! assigns an id to come in pairs: a draft without the id (what the client
//! sends) and the persisted entity with a required id (what the server
//! returns). A draft therefore cannot be referenced by id anywhere.
//!
//! Patch types carry only `Option` fields and omit `None` from the JSON, so
//! the server leaves those fields unchanged.

mod community;
mod pet;
mod schedule;
mod user;

pub use community::{Comment, CommunityUser, Post, PostDraft, PostUpdate};
pub use pet::{
    GraphHistory, GraphPoint, GraphPointUpdate, Pet, PetCreated, PetDraft, PetUpdate, PhotoEntry,
    PhotoHistory, Record, RecordDraft, RecordType,
};
pub use schedule::{Event, EventPatch, EventRange, NewEvent, NewTodo, Todo, TodoPatch};
pub use user::{EmailCheck, LoginRequest, ProfileUpdate, RegisterRequest, UserProfile};

/// An image picked on the device, uploaded as a multipart `file` part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Guess the content type from the file extension, `image/<ext>`.
    pub fn from_file_name(file_name: &str, bytes: Vec<u8>) -> Self {
        let content_type = match file_name.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => format!("image/{}", ext.to_ascii_lowercase()),
            _ => "image".to_string(),
        };
        Self {
            file_name: file_name.to_string(),
            content_type,
            bytes,
        }
    }
}

pub(crate) fn require(field: &str, value: &str) -> Result<(), crate::ApiError> {
    if value.trim().is_empty() {
        return Err(crate::ApiError::validation(format!("{field} is required")));
    }
    Ok(())
}
