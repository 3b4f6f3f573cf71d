//! Spreadsheet exports and saved reports.

pub mod format;
pub mod reports;
pub mod xlsx;

use axum::{
    http::header,
    response::{IntoResponse, Response},
    routing::{delete, get},
    Router,
};

use crate::api::AppState;
use crate::clubs::ClubError;

pub use format::{Cell, ExportSchema, FieldKind, Formatter, Table};
pub use reports::{export_filename, should_save_report, Report};

/// Format records with `schema` and render them as an `.xlsx` download.
pub fn xlsx_download(
    schema: &ExportSchema,
    records: &[serde_json::Map<String, serde_json::Value>],
    filename: &str,
) -> Result<Response, ClubError> {
    let table = Formatter::new(schema).format_records(records);
    let bytes = xlsx::write_workbook(&table).map_err(|e| ClubError::Export(e.to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, xlsx::CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// Turn serializable rows into ordered JSON records.
pub fn to_records<T: serde::Serialize>(
    rows: &[T],
) -> Result<Vec<serde_json::Map<String, serde_json::Value>>, ClubError> {
    rows.iter()
        .map(|row| match serde_json::to_value(row) {
            Ok(serde_json::Value::Object(map)) => Ok(map),
            Ok(_) => Err(ClubError::Export("row did not serialize to an object".into())),
            Err(e) => Err(ClubError::Export(e.to_string())),
        })
        .collect()
}

/// Saved report routes, nested at `/api/reports`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(reports::list_reports))
        .route("/{id}", delete(reports::delete_report))
}
