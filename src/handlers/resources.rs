//! Reference resource handlers, generic over the resource type: list, get, create, update, delete.

use crate::error::AppError;
use crate::model::{ListQuery, Resource};
use crate::response::{created, success_many, success_one_ok};
use crate::service::ResourceService;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::collections::HashMap;

fn parse_id(id_str: &str) -> Result<i64, AppError> {
    id_str
        .trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("invalid id '{}'", id_str)))
}

fn body<R>(body: Result<Json<R>, JsonRejection>) -> Result<R, AppError> {
    body.map(|Json(r)| r).map_err(|e| AppError::BadRequest(e.body_text()))
}

/// GET /api/<Resource>?<filters>
pub async fn list<R: Resource>(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let query = ListQuery::from_params(R::entity(), &params);
    let rows = ResourceService::list::<R>(state.store.as_ref(), &query).await?;
    Ok(success_many(rows))
}

/// GET /api/<Resource>/:id
pub async fn read<R: Resource>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id)?;
    let row = ResourceService::get::<R>(state.store.as_ref(), id).await?;
    Ok(success_one_ok(row))
}

/// POST /api/<Resource>: 201 with Location.
pub async fn create<R: Resource>(
    State(state): State<AppState>,
    payload: Result<Json<R>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let input = body(payload)?;
    let created_row = ResourceService::create(state.store.as_ref(), input).await?;
    let location = match created_row.id() {
        Some(id) => format!("{}/{}", R::entity().path, id),
        None => R::entity().path.to_string(),
    };
    Ok(created(location, created_row))
}

/// PUT /api/<Resource>/:id. A body id, when present, must match the path.
pub async fn update<R: Resource>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<R>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id)?;
    let input = body(payload)?;
    if let Some(body_id) = input.id() {
        if body_id != id {
            return Err(AppError::BadRequest(format!(
                "id in body ({}) does not match id in path ({})",
                body_id, id
            )));
        }
    }
    let updated = ResourceService::update(state.store.as_ref(), id, input).await?;
    Ok(success_one_ok(updated))
}

/// DELETE /api/<Resource>/:id: 204.
pub async fn delete<R: Resource>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_id(&id)?;
    ResourceService::delete::<R>(state.store.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
