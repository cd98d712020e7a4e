// error.rs
use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Field-keyed validation messages, rendered as
/// `{ "message": ..., "errors": { "field": ["msg", ...] } }`.
#[derive(Debug, Default, Clone, Serialize)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn of(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthenticated")]
    Unauthorized,

    #[error("Unauthorized action")]
    Forbidden,

    #[error("Not found")]
    NotFound,

    #[error("The given data was invalid")]
    Validation(FieldErrors),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                json!({ "message": self.to_string() }),
            ),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                json!({ "message": self.to_string() }),
            ),
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                json!({ "message": self.to_string() }),
            ),
            ApiError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "message": self.to_string(), "errors": errors }),
            ),
            ApiError::Storage(e) => {
                tracing::error!("storage failure: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "message": "Internal server error" }),
                )
            }
            ApiError::Database(sqlx::Error::RowNotFound) => (
                StatusCode::NOT_FOUND,
                json!({ "message": "Not found" }),
            ),
            ApiError::Database(e) => {
                tracing::error!("database failure: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "message": "Internal server error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_errors_accumulate_per_key() {
        let mut errors = FieldErrors::new();
        errors.add("title", "The title field is required");
        errors.add("title", "The title must be a string");
        errors.add("questions[0].type", "Invalid question type");

        assert!(!errors.is_empty());
        assert!(errors.contains("title"));
        let value = serde_json::to_value(&errors).unwrap();
        assert_eq!(value["title"].as_array().unwrap().len(), 2);
        assert_eq!(
            value["questions[0].type"][0],
            "Invalid question type"
        );
    }
}
