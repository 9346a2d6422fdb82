use serde::{Deserialize, Serialize};

use super::require;
use crate::error::ApiError;

/// A to-do entry on the schedule tab.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Todo {
    pub todolist_id: i64,
    pub title: String,
    #[serde(rename = "startDatetime")]
    pub start_datetime: String,
    #[serde(rename = "endDatetime", skip_serializing_if = "Option::is_none")]
    pub end_datetime: Option<String>,
    #[serde(rename = "isRecurring", default)]
    pub is_recurring: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<bool>,
    #[serde(default)]
    pub completed: bool,
    #[serde(rename = "allDay", skip_serializing_if = "Option::is_none")]
    pub all_day: Option<bool>,
}

/// A to-do entry before the server assigned its `todolist_id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewTodo {
    pub title: String,
    #[serde(rename = "startDatetime")]
    pub start_datetime: String,
    #[serde(rename = "endDatetime", skip_serializing_if = "Option::is_none")]
    pub end_datetime: Option<String>,
    #[serde(rename = "isRecurring", default)]
    pub is_recurring: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<bool>,
    #[serde(default)]
    pub completed: bool,
    #[serde(rename = "allDay", skip_serializing_if = "Option::is_none")]
    pub all_day: Option<bool>,
}

impl NewTodo {
    pub fn validate(&self) -> Result<(), ApiError> {
        require("title", &self.title)?;
        require("start time", &self.start_datetime)
    }
}

/// Partial to-do edit sent with `PUT /todolists/:id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TodoPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "startDatetime", skip_serializing_if = "Option::is_none")]
    pub start_datetime: Option<String>,
    #[serde(rename = "endDatetime", skip_serializing_if = "Option::is_none")]
    pub end_datetime: Option<String>,
    #[serde(rename = "isRecurring", skip_serializing_if = "Option::is_none")]
    pub is_recurring: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(rename = "allDay", skip_serializing_if = "Option::is_none")]
    pub all_day: Option<bool>,
}

/// A calendar event on the schedule tab.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    pub event_id: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoticon: Option<String>,
    #[serde(rename = "startDatetime")]
    pub start_datetime: String,
    #[serde(rename = "endDatetime", default)]
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

/// A calendar event before the server assigned its `event_id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewEvent {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
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

impl NewEvent {
    pub fn validate(&self) -> Result<(), ApiError> {
        require("title", &self.title)?;
        require("start time", &self.start_datetime)?;
        require("end time", &self.end_datetime)
    }
}

/// Partial event edit sent with `PUT /events/:id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoticon: Option<String>,
    #[serde(rename = "startDatetime", skip_serializing_if = "Option::is_none")]
    pub start_datetime: Option<String>,
    #[serde(rename = "endDatetime", skip_serializing_if = "Option::is_none")]
    pub end_datetime: Option<String>,
    #[serde(rename = "isRecurring", skip_serializing_if = "Option::is_none")]
    pub is_recurring: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(rename = "allDay", skip_serializing_if = "Option::is_none")]
    pub all_day: Option<bool>,
}

/// Calendar window for `GET /events/events/{range}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventRange {
    Day,
    Week,
    Month,
}

impl EventRange {
    pub fn as_path_segment(&self) -> &'static str {
        match self {
            EventRange::Day => "day",
            EventRange::Week => "week",
            EventRange::Month => "month",
        }
    }
}
