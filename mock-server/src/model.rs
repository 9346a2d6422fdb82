//! Wire types and the in-memory database.
//!
//! Field names follow the pet diary REST API as the mobile app sees it, mixed
//! casing included. Rows live in `Vec`s so list endpoints answer in insertion
//! order.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub date_of_birth: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(rename = "profileImageUrl", skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Deserialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub date_of_birth: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Deserialize)]
pub struct Login {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ProfilePatch {
    pub username: Option<String>,
    pub phone_number: Option<String>,
    pub phone_country: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<String>,
    pub bio: Option<String>,
}

/// `GET /users/profile` body: the user plus their pets.
#[derive(Serialize)]
pub struct Profile<'a> {
    #[serde(flatten)]
    pub user: &'a User,
    pub pets: Vec<&'a Pet>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "recordId")]
    pub record_id: i64,
    pub title: String,
    #[serde(rename = "recordType")]
    pub record_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(rename = "categoryColor", skip_serializing_if = "Option::is_none")]
    pub category_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoticon: Option<String>,
}

#[derive(Deserialize)]
pub struct NewRecord {
    pub title: String,
    #[serde(rename = "recordType")]
    pub record_type: String,
    pub unit: Option<String>,
    pub value: Option<String>,
    #[serde(rename = "categoryColor")]
    pub category_color: Option<String>,
    pub emoticon: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pet {
    #[serde(rename = "petId")]
    pub pet_id: i64,
    #[serde(skip)]
    pub owner: i64,
    pub pet_name: String,
    pub species: String,
    pub pet_registration_number: String,
    pub date_of_birth: String,
    pub gender: String,
    pub breed: String,
    pub neutering: String,
    #[serde(rename = "imageUrl", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub records: Vec<Record>,
}

#[derive(Deserialize)]
pub struct NewPet {
    pub pet_name: String,
    pub species: String,
    #[serde(default)]
    pub pet_registration_number: String,
    #[serde(default)]
    pub date_of_birth: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub breed: String,
    #[serde(default)]
    pub neutering: String,
    #[serde(rename = "imageUrl")]
    pub image_url: Option<String>,
}

#[derive(Deserialize)]
pub struct PetPatch {
    pub pet_name: Option<String>,
    pub species: Option<String>,
    pub pet_registration_number: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub breed: Option<String>,
    pub neutering: Option<String>,
    #[serde(rename = "imageUrl")]
    pub image_url: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GraphData {
    #[serde(rename = "graphDataId")]
    pub graph_data_id: i64,
    #[serde(rename = "recordId")]
    pub record_id: i64,
    pub graph_data: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[derive(Deserialize)]
pub struct NewGraphData {
    pub graph_data: f64,
    pub graph_date: Option<String>,
    pub graph_time: Option<String>,
}

#[derive(Deserialize)]
pub struct GraphPatch {
    pub graph_data: f64,
    pub graph_time: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PhotoData {
    #[serde(rename = "photoDataId")]
    pub photo_data_id: i64,
    #[serde(rename = "recordId")]
    pub record_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_time: Option<String>,
    #[serde(rename = "photoUrl", skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Todo {
    pub todolist_id: i64,
    #[serde(skip)]
    pub owner: i64,
    pub title: String,
    #[serde(rename = "startDatetime")]
    pub start_datetime: String,
    #[serde(rename = "endDatetime", skip_serializing_if = "Option::is_none")]
    pub end_datetime: Option<String>,
    #[serde(rename = "isRecurring")]
    pub is_recurring: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<bool>,
    pub completed: bool,
    #[serde(rename = "allDay", skip_serializing_if = "Option::is_none")]
    pub all_day: Option<bool>,
}

#[derive(Deserialize)]
pub struct NewTodo {
    pub title: String,
    #[serde(rename = "startDatetime")]
    pub start_datetime: String,
    #[serde(rename = "endDatetime")]
    pub end_datetime: Option<String>,
    #[serde(rename = "isRecurring", default)]
    pub is_recurring: String,
    pub category: Option<String>,
    pub memo: Option<String>,
    pub notification: Option<bool>,
    #[serde(default)]
    pub completed: bool,
    #[serde(rename = "allDay")]
    pub all_day: Option<bool>,
}

#[derive(Deserialize)]
pub struct TodoPatch {
    pub title: Option<String>,
    #[serde(rename = "startDatetime")]
    pub start_datetime: Option<String>,
    #[serde(rename = "endDatetime")]
    pub end_datetime: Option<String>,
    #[serde(rename = "isRecurring")]
    pub is_recurring: Option<String>,
    pub category: Option<String>,
    pub memo: Option<String>,
    pub notification: Option<bool>,
    pub completed: Option<bool>,
    #[serde(rename = "allDay")]
    pub all_day: Option<bool>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    pub event_id: i64,
    #[serde(skip)]
    pub owner: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoticon: Option<String>,
    #[serde(rename = "startDatetime")]
    pub start_datetime: String,
    #[serde(rename = "endDatetime")]
    pub end_datetime: String,
    #[serde(rename = "isRecurring")]
    pub is_recurring: String,
    pub memo: String,
    pub category: String,
    #[serde(rename = "allDay")]
    pub all_day: bool,
}

#[derive(Deserialize)]
pub struct NewEvent {
    pub title: String,
    pub emoticon: Option<String>,
    #[serde(rename = "startDatetime")]
    pub start_datetime: String,
    #[serde(rename = "endDatetime")]
    pub end_datetime: String,
    #[serde(rename = "isRecurring", default)]
    pub is_recurring: String,
    #[serde(default)]
    pub memo: String,
    #[serde(default)]
    pub category: String,
    #[serde(rename = "allDay", default)]
    pub all_day: bool,
}

#[derive(Deserialize)]
pub struct EventPatch {
    pub title: Option<String>,
    pub emoticon: Option<String>,
    #[serde(rename = "startDatetime")]
    pub start_datetime: Option<String>,
    #[serde(rename = "endDatetime")]
    pub end_datetime: Option<String>,
    #[serde(rename = "isRecurring")]
    pub is_recurring: Option<String>,
    pub memo: Option<String>,
    pub category: Option<String>,
    #[serde(rename = "allDay")]
    pub all_day: Option<bool>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Post {
    #[serde(rename = "postId")]
    pub post_id: i64,
    pub title: String,
    pub content: String,
    pub category: String,
    pub tags: Vec<String>,
    pub username: String,
    #[serde(rename = "imageUrl", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "updatedAt", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Deserialize)]
pub struct PostPatch {
    pub title: Option<String>,
    pub category: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    #[serde(skip)]
    pub post_id: i64,
    pub comment: String,
    pub username: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "updatedAt", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Deserialize)]
pub struct CommentBody {
    pub content: String,
}

#[derive(Default)]
pub struct Db {
    next_id: i64,
    pub users: Vec<User>,
    pub pets: Vec<Pet>,
    pub graph_data: Vec<GraphData>,
    pub photo_data: Vec<PhotoData>,
    pub todos: Vec<Todo>,
    pub events: Vec<Event>,
    pub posts: Vec<Post>,
    pub comments: Vec<Comment>,
}

impl Db {
    /// Ids are unique across every table, which keeps test output readable.
    pub fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn user_by_email(&self, email: &str) -> Option<&User> {
        self.users.iter().find(|u| u.email == email)
    }

    /// The pet owning `record_id`, if it belongs to `owner`.
    pub fn record_owner(&self, record_id: i64, owner: i64) -> Option<&Pet> {
        self.pets
            .iter()
            .find(|p| p.owner == owner && p.records.iter().any(|r| r.record_id == record_id))
    }
}
