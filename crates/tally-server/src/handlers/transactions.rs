//! Transaction handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::{AppError, AppState, AuthUser, MAX_PAGE_LIMIT};
use tally_core::aggregate::parse_month_key;
use tally_core::models::Transaction;
use tally_core::{Classification, TransactionFilter};

/// Query parameters for listing transactions
#[derive(Debug, Deserialize)]
pub struct TransactionQuery {
    /// Month (YYYY-MM)
    pub month: Option<String>,
    /// Display category, case-insensitive
    pub category: Option<String>,
    /// Aggregator account id
    pub account_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// A transaction with the classification every view agrees on
#[derive(Serialize)]
pub struct TransactionView {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub classification: Classification,
}

#[derive(Serialize)]
pub struct TransactionResponse {
    pub transactions: Vec<TransactionView>,
    pub limit: i64,
    pub offset: i64,
}

/// Treat `?month=` and friends like an absent filter
fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// GET /api/transactions - List transactions newest first
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<TransactionQuery>,
) -> Result<Json<TransactionResponse>, AppError> {
    // Input validation: clamp pagination parameters
    let limit = params.limit.clamp(1, MAX_PAGE_LIMIT);
    let offset = params.offset.max(0);

    let month = non_empty(params.month);
    if let Some(month) = &month {
        parse_month_key(month)?;
    }

    let filter = TransactionFilter::new()
        .month(month)
        .category(non_empty(params.category))
        .account_id(non_empty(params.account_id))
        .limit(Some(limit))
        .offset(offset);

    let transactions = state
        .db
        .list_transactions(user.id, &filter, &state.classifier)?
        .into_iter()
        .map(|transaction| TransactionView {
            classification: state.classifier.classify(&transaction),
            transaction,
        })
        .collect::<Vec<_>>();

    state.db.log_audit(
        &user.email,
        "list",
        Some("transaction"),
        None,
        Some(&format!(
            "count={}, limit={}, offset={}",
            transactions.len(),
            limit,
            offset
        )),
    )?;

    Ok(Json(TransactionResponse {
        transactions,
        limit,
        offset,
    }))
}

/// Request body for replacing tags
#[derive(Debug, Deserialize)]
pub struct SetTagsRequest {
    pub tags: Vec<String>,
}

/// PUT /api/transactions/:id/tags - Replace a transaction's tags
pub async fn set_transaction_tags(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(req): Json<SetTagsRequest>,
) -> Result<Json<Transaction>, AppError> {
    let tx = state.db.set_transaction_tags(user.id, id, &req.tags)?;

    state.db.log_audit(
        &user.email,
        "update_tags",
        Some("transaction"),
        Some(id),
        Some(&tx.tags.join(",")),
    )?;

    Ok(Json(tx))
}

/// Request body for the recurring flag
#[derive(Debug, Deserialize)]
pub struct SetRecurringRequest {
    pub is_recurring: bool,
}

/// PUT /api/transactions/:id/recurring - Manually flag a transaction recurring
pub async fn set_transaction_recurring(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(req): Json<SetRecurringRequest>,
) -> Result<Json<Transaction>, AppError> {
    let tx = state
        .db
        .set_transaction_recurring(user.id, id, req.is_recurring)?;

    state.db.log_audit(
        &user.email,
        "update_recurring",
        Some("transaction"),
        Some(id),
        Some(&format!("is_recurring={}", req.is_recurring)),
    )?;

    Ok(Json(tx))
}

/// GET /api/transactions/:id/classification - Flow and display category
pub async fn get_transaction_classification(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<Classification>, AppError> {
    let tx = state
        .db
        .get_transaction(user.id, id)?
        .ok_or_else(|| AppError::not_found(&format!("Transaction {} not found", id)))?;

    Ok(Json(state.classifier.classify(&tx)))
}
