use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use time::{Duration, OffsetDateTime};

use crate::model::{Event, EventPatch, NewEvent, NewTodo, Todo, TodoPatch};
use crate::{iso_date, not_found, reject, AppState, AuthUser, HandlerResult};

#[derive(Deserialize)]
pub struct CompleteQuery {
    #[serde(rename = "isCompleted")]
    pub is_completed: bool,
}

pub async fn create_todo(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<NewTodo>,
) -> HandlerResult<(StatusCode, Json<Todo>)> {
    if input.title.trim().is_empty() {
        return Err(reject(StatusCode::BAD_REQUEST, "title is required"));
    }
    let mut db = state.db.write().await;
    let todo = Todo {
        todolist_id: db.next_id(),
        owner: auth.user_id,
        title: input.title,
        start_datetime: input.start_datetime,
        end_datetime: input.end_datetime,
        is_recurring: input.is_recurring,
        category: input.category,
        memo: input.memo,
        notification: input.notification,
        completed: input.completed,
        all_day: input.all_day,
    };
    db.todos.push(todo.clone());
    Ok((StatusCode::CREATED, Json(todo)))
}

/// Only the caller's own list is visible.
pub async fn list_todos(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<i64>,
) -> HandlerResult<Json<Vec<Todo>>> {
    if user_id != auth.user_id {
        return Err(reject(StatusCode::FORBIDDEN, "not your todo list"));
    }
    let db = state.db.read().await;
    Ok(Json(db.todos.iter().filter(|t| t.owner == user_id).cloned().collect()))
}

pub async fn get_todo(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> HandlerResult<Json<Todo>> {
    let db = state.db.read().await;
    db.todos
        .iter()
        .find(|t| t.todolist_id == id && t.owner == auth.user_id)
        .cloned()
        .map(Json)
        .ok_or(not_found("todo"))
}

pub async fn update_todo(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(patch): Json<TodoPatch>,
) -> HandlerResult<Json<Todo>> {
    let mut db = state.db.write().await;
    let todo = owned_todo(&mut db.todos, id, auth.user_id)?;
    if let Some(title) = patch.title {
        todo.title = title;
    }
    if let Some(start) = patch.start_datetime {
        todo.start_datetime = start;
    }
    if let Some(recurring) = patch.is_recurring {
        todo.is_recurring = recurring;
    }
    if let Some(completed) = patch.completed {
        todo.completed = completed;
    }
    todo.end_datetime = patch.end_datetime.or(todo.end_datetime.take());
    todo.category = patch.category.or(todo.category.take());
    todo.memo = patch.memo.or(todo.memo.take());
    todo.notification = patch.notification.or(todo.notification);
    todo.all_day = patch.all_day.or(todo.all_day);
    Ok(Json(todo.clone()))
}

pub async fn delete_todo(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> HandlerResult<StatusCode> {
    let mut db = state.db.write().await;
    let before = db.todos.len();
    db.todos.retain(|t| !(t.todolist_id == id && t.owner == auth.user_id));
    if db.todos.len() == before {
        return Err(not_found("todo"));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn complete_todo(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Query(q): Query<CompleteQuery>,
) -> HandlerResult<Json<Todo>> {
    let mut db = state.db.write().await;
    let todo = owned_todo(&mut db.todos, id, auth.user_id)?;
    todo.completed = q.is_completed;
    Ok(Json(todo.clone()))
}

fn owned_todo(todos: &mut [Todo], id: i64, owner: i64) -> HandlerResult<&mut Todo> {
    todos
        .iter_mut()
        .find(|t| t.todolist_id == id && t.owner == owner)
        .ok_or(not_found("todo"))
}

pub async fn list_events(State(state): State<AppState>, auth: AuthUser) -> Json<Vec<Event>> {
    let db = state.db.read().await;
    Json(db.events.iter().filter(|e| e.owner == auth.user_id).cloned().collect())
}

pub async fn create_event(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<NewEvent>,
) -> HandlerResult<(StatusCode, Json<Event>)> {
    if input.title.trim().is_empty() || input.start_datetime.is_empty() || input.end_datetime.is_empty() {
        return Err(reject(StatusCode::BAD_REQUEST, "title, start and end are required"));
    }
    let mut db = state.db.write().await;
    let event = Event {
        event_id: db.next_id(),
        owner: auth.user_id,
        title: input.title,
        emoticon: input.emoticon,
        start_datetime: input.start_datetime,
        end_datetime: input.end_datetime,
        is_recurring: input.is_recurring,
        memo: input.memo,
        category: input.category,
        all_day: input.all_day,
    };
    db.events.push(event.clone());
    Ok((StatusCode::CREATED, Json(event)))
}

/// Events starting today, this week (Monday to Sunday) or this month, by
/// comparing the `YYYY-MM-DD` prefix of `startDatetime`.
pub async fn event_range(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(range): Path<String>,
) -> HandlerResult<Json<Vec<Event>>> {
    let today = OffsetDateTime::now_utc().date();
    let (from, to) = match range.as_str() {
        "day" => (iso_date(today), iso_date(today)),
        "week" => {
            let monday = today - Duration::days(i64::from(today.weekday().number_days_from_monday()));
            (iso_date(monday), iso_date(monday + Duration::days(6)))
        }
        "month" => {
            let month = iso_date(today);
            (format!("{}-01", &month[..7]), format!("{}-31", &month[..7]))
        }
        other => return Err(reject(StatusCode::BAD_REQUEST, format!("unknown range {other}"))),
    };

    let db = state.db.read().await;
    let events = db
        .events
        .iter()
        .filter(|e| e.owner == auth.user_id)
        .filter(|e| {
            let day = e.start_datetime.get(..10).unwrap_or(&e.start_datetime);
            from.as_str() <= day && day <= to.as_str()
        })
        .cloned()
        .collect();
    Ok(Json(events))
}

pub async fn get_event(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> HandlerResult<Json<Event>> {
    let db = state.db.read().await;
    db.events
        .iter()
        .find(|e| e.event_id == id && e.owner == auth.user_id)
        .cloned()
        .map(Json)
        .ok_or(not_found("event"))
}

pub async fn update_event(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(patch): Json<EventPatch>,
) -> HandlerResult<Json<Event>> {
    let mut db = state.db.write().await;
    let event = db
        .events
        .iter_mut()
        .find(|e| e.event_id == id && e.owner == auth.user_id)
        .ok_or(not_found("event"))?;
    let fields = [
        (patch.title, &mut event.title),
        (patch.start_datetime, &mut event.start_datetime),
        (patch.end_datetime, &mut event.end_datetime),
        (patch.is_recurring, &mut event.is_recurring),
        (patch.memo, &mut event.memo),
        (patch.category, &mut event.category),
    ];
    for (value, target) in fields {
        if let Some(value) = value {
            *target = value;
        }
    }
    event.emoticon = patch.emoticon.or(event.emoticon.take());
    if let Some(all_day) = patch.all_day {
        event.all_day = all_day;
    }
    Ok(Json(event.clone()))
}

pub async fn delete_event(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> HandlerResult<StatusCode> {
    let mut db = state.db.write().await;
    let before = db.events.len();
    db.events.retain(|e| !(e.event_id == id && e.owner == auth.user_id));
    if db.events.len() == before {
        return Err(not_found("event"));
    }
    Ok(StatusCode::NO_CONTENT)
}
