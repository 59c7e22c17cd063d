//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// SQLSTATE raised when a row is still referenced by a foreign key.
const FOREIGN_KEY_VIOLATION: &str = "23503";
/// SQLSTATE raised by a unique index.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {var}: '{value}' ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error("unknown store backend '{0}' (expected postgres or memory)")]
    UnknownStore(String),
}

/// Field-level validation messages keyed by API field name.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// `Ok(())` when nothing was recorded, otherwise a validation error carrying every message.
    pub fn into_result(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("one or more validation errors occurred")]
    Validation(FieldErrors),
    #[error("{message}")]
    Duplicate { field: String, message: String },
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization: {0}")]
    Json(#[from] serde_json::Error),
    #[error("internal: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.add(field, message);
        AppError::Validation(errors)
    }

    pub fn status(&self) -> StatusCode {
        self.status_and_code().0
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            AppError::Duplicate { .. } => (StatusCode::CONFLICT, "duplicate"),
            AppError::Db(e) => match e {
                sqlx::Error::RowNotFound => (StatusCode::NOT_FOUND, "not_found"),
                sqlx::Error::Database(db)
                    if matches!(db.code().as_deref(), Some(FOREIGN_KEY_VIOLATION) | Some(UNIQUE_VIOLATION)) =>
                {
                    (StatusCode::CONFLICT, "conflict")
                }
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            },
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error"),
            AppError::Json(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        }
    }

    fn public_message(&self) -> String {
        match self {
            AppError::Db(sqlx::Error::Database(db)) if db.code().as_deref() == Some(FOREIGN_KEY_VIOLATION) => {
                "the record is referenced by other records and cannot be changed".into()
            }
            AppError::Db(sqlx::Error::Database(db)) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                "a record with the same unique value already exists".into()
            }
            _ => self.to_string(),
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let details = match &self {
            AppError::Validation(errors) => serde_json::to_value(errors).ok(),
            AppError::Duplicate { field, message } => {
                let mut map = serde_json::Map::new();
                map.insert(field.clone(), serde_json::json!([message]));
                Some(serde_json::Value::Object(map))
            }
            _ => None,
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.public_message(),
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}
