//! Club API error types.

use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::permissions::PermissionError;

/// Validation messages keyed by the offending field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    /// A single message for a single field.
    #[must_use]
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

impl From<validator::ValidationErrors> for FieldErrors {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut out = Self::default();
        for (field, errs) in errors.field_errors() {
            for err in errs {
                let message = err
                    .message
                    .as_ref()
                    .map_or_else(|| format!("Invalid value ({})", err.code), ToString::to_string);
                out.add(&field, message);
            }
        }
        out
    }
}

/// Errors returned by club-scoped endpoints.
#[derive(Debug, Error)]
pub enum ClubError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Permission(#[from] PermissionError),

    #[error("Invalid input: {0}")]
    Validation(FieldErrors),

    #[error("Export failed: {0}")]
    Export(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl ClubError {
    /// Shorthand for a validation error on one field.
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        Self::Validation(FieldErrors::single(field, message))
    }
}

impl From<validator::ValidationErrors> for ClubError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.into())
    }
}

impl IntoResponse for ClubError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string()),
            Self::Permission(PermissionError::Unauthenticated) => (
                StatusCode::UNAUTHORIZED,
                "MISSING_AUTH",
                self.to_string(),
            ),
            Self::Permission(e) => (StatusCode::FORBIDDEN, "PERMISSION_DENIED", e.to_string()),
            Self::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                self.to_string(),
            ),
            Self::Export(msg) => {
                tracing::error!(error = %msg, "Spreadsheet export failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Export failed".to_string(),
                )
            }
            Self::Database(err) => {
                tracing::error!(%err, "Club endpoint database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Database error".to_string(),
                )
            }
        };

        let body = match &self {
            Self::Validation(fields) => {
                serde_json::json!({ "error": code, "message": message, "fields": fields })
            }
            _ => serde_json::json!({ "error": code, "message": message }),
        };

        (status, Json(body)).into_response()
    }
}
