//! Spending statistics handlers

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::{AppError, AppState, Owner};
use tally_core::MonthlyCategoryTotal;

/// GET /expense/statistics - Monthly totals per category for the caller
pub async fn expense_statistics(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
) -> Result<Json<Vec<MonthlyCategoryTotal>>, AppError> {
    let totals = state.db.monthly_statistics(&owner)?;

    // Audit log - read access
    state.audit(
        &owner,
        "statistics",
        None,
        Some(&format!("groups={}", totals.len())),
    );

    Ok(Json(totals))
}
