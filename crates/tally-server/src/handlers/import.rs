//! CSV upload handler

use std::io::{BufReader, Write};
use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use tempfile::NamedTempFile;
use tracing::info;

use super::expenses::DataResponse;
use crate::{AppError, AppState, Owner, MAX_UPLOAD_SIZE};
use tally_core::import::parse_expenses_csv;
use tally_core::Expense;

/// POST /expense/upload-expenses-csv - Import a CSV file of expenses
///
/// The `file` field is spooled to a temporary file, parsed, and stored in a
/// single transaction. If any row is invalid nothing is stored and every bad
/// row is listed in the response.
pub async fn upload_expenses_csv(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<DataResponse<Vec<Expense>>>), AppError> {
    let mut multipart = multipart.map_err(|e| {
        AppError::bad_request(&format!("Expected a multipart form upload: {}", e.body_text()))
    })?;
    let mut upload: Option<NamedTempFile> = None;

    // Extract fields from multipart form
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(&format!("Failed to read form field: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let mut spool = NamedTempFile::new()?;
        let mut total_size: usize = 0;

        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|_| AppError::bad_request("Failed to read file data"))?
        {
            total_size += chunk.len();

            // Check file size limit
            if total_size > MAX_UPLOAD_SIZE {
                return Err(AppError::bad_request(&format!(
                    "File too large. Maximum size is {} MB",
                    MAX_UPLOAD_SIZE / 1024 / 1024
                )));
            }

            spool.write_all(&chunk)?;
        }

        spool.flush()?;
        upload = Some(spool);
    }

    let upload = upload.ok_or_else(|| AppError::bad_request("Please upload a CSV file"))?;

    let expenses = parse_expenses_csv(BufReader::new(upload.reopen()?), Utc::now())?;
    let inserted = state.db.insert_expenses(&owner, &expenses)?;

    upload.close()?;

    info!(owner = %owner, count = inserted.len(), "Imported expenses from CSV");

    state.audit(
        &owner,
        "import",
        None,
        Some(&format!("imported={}", inserted.len())),
    );

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            message: Some("Expenses uploaded successfully"),
            data: inserted,
        }),
    ))
}
