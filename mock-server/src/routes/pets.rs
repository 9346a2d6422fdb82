use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::model::{GraphData, GraphPatch, NewGraphData, NewPet, NewRecord, Pet, PetPatch, Record};
use crate::{not_found, reject, AppState, AuthUser, HandlerResult};

#[derive(Deserialize)]
pub struct PetQuery {
    pub pet_id: i64,
}

pub async fn list(State(state): State<AppState>, auth: AuthUser) -> Json<Vec<Pet>> {
    let db = state.db.read().await;
    Json(db.pets.iter().filter(|p| p.owner == auth.user_id).cloned().collect())
}

/// Answers with the assigned id only.
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<NewPet>,
) -> HandlerResult<(StatusCode, Json<Value>)> {
    if input.pet_name.trim().is_empty() || input.species.trim().is_empty() {
        return Err(reject(StatusCode::BAD_REQUEST, "pet_name and species are required"));
    }
    let mut db = state.db.write().await;
    let pet_id = db.next_id();
    db.pets.push(Pet {
        pet_id,
        owner: auth.user_id,
        pet_name: input.pet_name,
        species: input.species,
        pet_registration_number: input.pet_registration_number,
        date_of_birth: input.date_of_birth,
        gender: input.gender,
        breed: input.breed,
        neutering: input.neutering,
        image_url: input.image_url,
        records: Vec::new(),
    });
    Ok((StatusCode::CREATED, Json(json!({ "petId": pet_id }))))
}

pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(patch): Json<PetPatch>,
) -> HandlerResult<Json<Pet>> {
    let mut db = state.db.write().await;
    let pet = db
        .pets
        .iter_mut()
        .find(|p| p.pet_id == id && p.owner == auth.user_id)
        .ok_or(not_found("pet"))?;
    let fields = [
        (patch.pet_name, &mut pet.pet_name),
        (patch.species, &mut pet.species),
        (patch.pet_registration_number, &mut pet.pet_registration_number),
        (patch.date_of_birth, &mut pet.date_of_birth),
        (patch.gender, &mut pet.gender),
        (patch.breed, &mut pet.breed),
        (patch.neutering, &mut pet.neutering),
    ];
    for (value, target) in fields {
        if let Some(value) = value {
            *target = value;
        }
    }
    if patch.image_url.is_some() {
        pet.image_url = patch.image_url;
    }
    Ok(Json(pet.clone()))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> HandlerResult<StatusCode> {
    let mut db = state.db.write().await;
    let index = db
        .pets
        .iter()
        .position(|p| p.pet_id == id && p.owner == auth.user_id)
        .ok_or(not_found("pet"))?;
    let pet = db.pets.remove(index);
    let record_ids: Vec<i64> = pet.records.iter().map(|r| r.record_id).collect();
    db.graph_data.retain(|g| !record_ids.contains(&g.record_id));
    db.photo_data.retain(|p| !record_ids.contains(&p.record_id));
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_record(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(q): Query<PetQuery>,
    Json(input): Json<NewRecord>,
) -> HandlerResult<(StatusCode, Json<Record>)> {
    if input.title.trim().is_empty() {
        return Err(reject(StatusCode::BAD_REQUEST, "title is required"));
    }
    if input.record_type != "GRAPH" && input.record_type != "PHOTO" {
        return Err(reject(StatusCode::BAD_REQUEST, "recordType must be GRAPH or PHOTO"));
    }
    let mut db = state.db.write().await;
    let record_id = db.next_id();
    let pet = db
        .pets
        .iter_mut()
        .find(|p| p.pet_id == q.pet_id && p.owner == auth.user_id)
        .ok_or(not_found("pet"))?;
    let record = Record {
        record_id,
        title: input.title,
        record_type: input.record_type,
        unit: input.unit,
        value: input.value,
        category_color: input.category_color,
        date: None,
        emoticon: input.emoticon,
    };
    pet.records.push(record.clone());
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn delete_record(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> HandlerResult<StatusCode> {
    let mut db = state.db.write().await;
    let pet = db
        .pets
        .iter_mut()
        .find(|p| p.owner == auth.user_id && p.records.iter().any(|r| r.record_id == id))
        .ok_or(not_found("record"))?;
    pet.records.retain(|r| r.record_id != id);
    db.graph_data.retain(|g| g.record_id != id);
    db.photo_data.retain(|p| p.record_id != id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn graph_history(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> HandlerResult<Json<Value>> {
    let db = state.db.read().await;
    db.record_owner(id, auth.user_id).ok_or(not_found("record"))?;
    let points: Vec<&GraphData> = db.graph_data.iter().filter(|g| g.record_id == id).collect();
    Ok(Json(json!({ "graphDataList": points })))
}

/// Log one measurement. The app has no screen for this; tests use it to
/// seed history.
pub async fn add_graph_data(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(input): Json<NewGraphData>,
) -> HandlerResult<(StatusCode, Json<GraphData>)> {
    let mut db = state.db.write().await;
    let unit = db
        .record_owner(id, auth.user_id)
        .and_then(|pet| pet.records.iter().find(|r| r.record_id == id))
        .ok_or(not_found("record"))?
        .unit
        .clone();
    let point = GraphData {
        graph_data_id: db.next_id(),
        record_id: id,
        graph_data: input.graph_data,
        graph_date: input.graph_date,
        graph_time: input.graph_time,
        unit,
    };
    db.graph_data.push(point.clone());
    Ok((StatusCode::CREATED, Json(point)))
}

pub async fn update_graph_data(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, data_id)): Path<(i64, i64)>,
    Json(patch): Json<GraphPatch>,
) -> HandlerResult<Json<GraphData>> {
    let mut db = state.db.write().await;
    db.record_owner(id, auth.user_id).ok_or(not_found("record"))?;
    let point = db
        .graph_data
        .iter_mut()
        .find(|g| g.record_id == id && g.graph_data_id == data_id)
        .ok_or(not_found("graph data"))?;
    point.graph_data = patch.graph_data;
    point.graph_time = patch.graph_time;
    Ok(Json(point.clone()))
}

pub async fn delete_graph_data(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, data_id)): Path<(i64, i64)>,
) -> HandlerResult<StatusCode> {
    let mut db = state.db.write().await;
    db.record_owner(id, auth.user_id).ok_or(not_found("record"))?;
    let before = db.graph_data.len();
    db.graph_data
        .retain(|g| !(g.record_id == id && g.graph_data_id == data_id));
    if db.graph_data.len() == before {
        return Err(not_found("graph data"));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn photo_history(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> HandlerResult<Json<Value>> {
    let db = state.db.read().await;
    db.record_owner(id, auth.user_id).ok_or(not_found("record"))?;
    let entries: Vec<_> = db.photo_data.iter().filter(|p| p.record_id == id).collect();
    Ok(Json(json!({ "photoDataList": entries })))
}
