//! Expense handlers

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Path, Query, Request, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{AppError, AppState, Owner};
use tally_core::models::{
    parse_timestamp, AmountInput, Expense, ExpensePage, ExpensePatch, NewExpense, Pagination,
};
use tally_core::{ExpenseFilter, SortField, SortOrder};

/// Largest JSON body accepted by the expense endpoints
const MAX_JSON_BODY: usize = 64 * 1024;

/// Response carrying a single record or a list of them
#[derive(Serialize)]
pub struct DataResponse<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub data: T,
}

/// Response carrying only a message
#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Response for a bulk delete
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteResponse {
    pub message: &'static str,
    pub deleted_count: usize,
}

/// Path IDs that aren't integers can't name an expense
fn parse_expense_id(raw: &str) -> Result<i64, AppError> {
    raw.parse()
        .map_err(|_| AppError::not_found("Expense not found"))
}

async fn read_json<T: serde::de::DeserializeOwned>(request: Request) -> Result<T, AppError> {
    let bytes = axum::body::to_bytes(request.into_body(), MAX_JSON_BODY)
        .await
        .map_err(|_| AppError::bad_request("Invalid request body"))?;
    serde_json::from_slice(&bytes).map_err(|_| AppError::bad_request("Invalid JSON"))
}

/// Request body for creating an expense
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExpenseRequest {
    pub title: Option<String>,
    pub amount: Option<AmountInput>,
    pub category: Option<String>,
    pub payment_method: Option<String>,
    /// Defaults to now
    pub date: Option<String>,
}

/// POST /expense/create - Create an expense owned by the caller
pub async fn create_expense(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    request: Request,
) -> Result<(StatusCode, Json<DataResponse<Expense>>), AppError> {
    let req: CreateExpenseRequest = read_json(request).await?;

    let present = |s: &Option<String>| s.as_deref().is_some_and(|v| !v.trim().is_empty());
    let (Some(amount), true, true) = (
        req.amount.as_ref(),
        present(&req.category),
        present(&req.payment_method),
    ) else {
        return Err(AppError::bad_request(
            "Amount, category, and payment method are required",
        ));
    };

    let date = match req.date.as_deref().filter(|d| !d.trim().is_empty()) {
        Some(d) => parse_timestamp(d)?,
        None => Utc::now(),
    };

    let new_expense = NewExpense {
        title: req.title,
        amount: amount.resolve()?,
        category: req.category.unwrap_or_default(),
        payment_method: req.payment_method.unwrap_or_default(),
        date,
    };
    let expense = state.db.insert_expense(&owner, &new_expense)?;

    state.audit(
        &owner,
        "create",
        Some(expense.id),
        Some(&format!(
            "amount={}, category={}",
            expense.amount, expense.category
        )),
    );

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            message: Some("Expense created successfully"),
            data: expense,
        }),
    ))
}

/// Query parameters for listing expenses
///
/// Everything arrives as text so malformed numbers fall back to defaults
/// instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseQuery {
    pub category: Option<String>,
    pub payment_method: Option<String>,
    /// Inclusive lower bound on date
    pub start_date: Option<String>,
    /// Inclusive upper bound on date
    pub end_date: Option<String>,
    pub sort_by: Option<String>,
    /// `asc` or `desc` (default)
    pub sort_order: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// GET /expense/all - List the caller's expenses (admin role required)
pub async fn list_expenses(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    query: Result<Query<ExpenseQuery>, QueryRejection>,
) -> Result<Json<ExpensePage>, AppError> {
    let Query(params) = query.map_err(|e| {
        AppError::bad_request(&format!("Invalid query parameters: {}", e.body_text()))
    })?;
    let sort_field = non_blank(&params.sort_by)
        .map(str::parse::<SortField>)
        .transpose()?
        .unwrap_or_default();
    let sort_order = SortOrder::from_param(params.sort_order.as_deref());
    let start_date = non_blank(&params.start_date)
        .map(parse_timestamp)
        .transpose()?;
    let end_date = non_blank(&params.end_date)
        .map(parse_timestamp)
        .transpose()?;

    // Input validation: clamp pagination parameters
    let pagination = Pagination::from_params(params.page.as_deref(), params.limit.as_deref());

    let filter = ExpenseFilter::new(&owner)
        .category(params.category.as_deref())
        .payment_method(params.payment_method.as_deref())
        .start_date(start_date)
        .end_date(end_date)
        .sort(sort_field, sort_order);

    let page = state.db.search_expenses(&filter, pagination)?;

    // Audit log - read access
    state.audit(
        &owner,
        "list",
        None,
        Some(&format!(
            "page={}, limit={}, category={:?}, payment_method={:?}, start={:?}, end={:?}, returned={}",
            pagination.page,
            pagination.limit,
            params.category,
            params.payment_method,
            params.start_date,
            params.end_date,
            page.expenses.len()
        )),
    );

    Ok(Json(page))
}

/// GET /expense/:id - Get one of the caller's expenses
pub async fn get_expense(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<Expense>>, AppError> {
    let id = parse_expense_id(&id)?;

    let expense = state
        .db
        .get_expense(&owner, id)?
        .ok_or_else(|| AppError::not_found("Expense not found"))?;

    state.audit(&owner, "view", Some(id), None);

    Ok(Json(DataResponse {
        message: None,
        data: expense,
    }))
}

/// PUT /expense/:id - Partially update one of the caller's expenses
pub async fn update_expense(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
    request: Request,
) -> Result<Json<DataResponse<Expense>>, AppError> {
    let id = parse_expense_id(&id)?;
    let patch: ExpensePatch = read_json(request).await?;

    let expense = if patch.is_empty() {
        state.db.get_expense(&owner, id)?
    } else {
        state.db.update_expense(&owner, id, &patch)?
    }
    .ok_or_else(|| AppError::not_found("Expense not found"))?;

    state.audit(
        &owner,
        "update",
        Some(id),
        Some(&format!("{:?}", patch)),
    );

    Ok(Json(DataResponse {
        message: Some("Expense updated successfully"),
        data: expense,
    }))
}

/// DELETE /expense/:id - Delete one of the caller's expenses
pub async fn delete_expense(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = parse_expense_id(&id)?;

    if !state.db.delete_expense(&owner, id)? {
        return Err(AppError::not_found("Expense not found"));
    }

    state.audit(&owner, "delete", Some(id), None);

    Ok(Json(MessageResponse {
        message: "Expense deleted successfully",
    }))
}

/// Request body for a bulk delete
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteRequest {
    #[serde(default)]
    pub expense_ids: Vec<i64>,
}

/// DELETE /expense/bulk-delete - Delete several of the caller's expenses
///
/// IDs that don't belong to the caller are skipped.
pub async fn bulk_delete_expenses(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    request: Request,
) -> Result<Json<BulkDeleteResponse>, AppError> {
    let req: BulkDeleteRequest = read_json(request).await?;

    let deleted = state.db.delete_expenses(&owner, &req.expense_ids)?;
    if deleted == 0 {
        return Err(AppError::not_found("No expenses found to delete"));
    }

    state.audit(
        &owner,
        "bulk_delete",
        None,
        Some(&format!(
            "requested={}, deleted={}",
            req.expense_ids.len(),
            deleted
        )),
    );

    Ok(Json(BulkDeleteResponse {
        message: "Expenses deleted successfully",
        deleted_count: deleted,
    }))
}
