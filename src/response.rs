//! Standard response envelope helpers.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Serialize)]
pub struct SuccessOne<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

#[derive(Serialize)]
pub struct SuccessMany<T> {
    pub data: Vec<T>,
    pub meta: MetaCount,
}

#[derive(Serialize)]
pub struct MetaCount {
    pub count: u64,
}

/// 201 with a `Location` header pointing at the new resource.
pub fn created<T: Serialize>(location: String, data: T) -> Response {
    (
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(SuccessOne { data, meta: None }),
    )
        .into_response()
}

pub fn success_one_ok<T: Serialize>(data: T) -> (StatusCode, Json<SuccessOne<T>>) {
    (
        StatusCode::OK,
        Json(SuccessOne {
            data,
            meta: None,
        }),
    )
}

pub fn success_many<T: Serialize>(data: Vec<T>) -> (StatusCode, Json<SuccessMany<T>>) {
    let count = data.len() as u64;
    (
        StatusCode::OK,
        Json(SuccessMany {
            data,
            meta: MetaCount { count },
        }),
    )
}
