//! Account and bank link handlers

use std::sync::Arc;

use axum::{extract::State, Extension, Json};
use tracing::info;

use crate::{AppError, AppState, AuthUser};
use tally_core::models::{Account, BankLink};
use tally_core::{SyncPayload, SyncResult, UnlinkResult};

/// GET /api/accounts - List the caller's linked accounts
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Account>>, AppError> {
    let accounts = state.db.list_accounts(user.id)?;

    // Audit log - read access
    state.db.log_audit(
        &user.email,
        "list",
        Some("account"),
        None,
        Some(&format!("count={}", accounts.len())),
    )?;

    Ok(Json(accounts))
}

/// POST /api/bank/sync - Apply a bank aggregator sync payload
pub async fn sync_bank(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<SyncPayload>,
) -> Result<Json<SyncResult>, AppError> {
    let result = state.db.apply_sync(user.id, payload, &state.classifier)?;

    state.db.log_audit(
        &user.email,
        "sync",
        Some("bank_link"),
        None,
        Some(&format!(
            "accounts={}, added={}, modified={}, removed={}",
            result.accounts, result.added, result.modified, result.removed
        )),
    )?;
    info!(
        user_id = user.id,
        accounts = result.accounts,
        added = result.added,
        modified = result.modified,
        removed = result.removed,
        "Bank sync applied"
    );

    Ok(Json(result))
}

/// GET /api/bank/link - Get the caller's bank link
pub async fn get_bank_link(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<BankLink>, AppError> {
    let link = state
        .db
        .get_bank_link(user.id)?
        .ok_or_else(|| AppError::not_found("No bank linked"))?;

    Ok(Json(link))
}

/// DELETE /api/bank/link - Unlink the bank and remove its accounts and transactions
pub async fn unlink_bank(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UnlinkResult>, AppError> {
    let removed = state
        .db
        .delete_bank_link(user.id)?
        .ok_or_else(|| AppError::not_found("No bank linked"))?;

    state.db.log_audit(
        &user.email,
        "delete",
        Some("bank_link"),
        None,
        Some(&format!(
            "accounts={}, transactions={}",
            removed.accounts, removed.transactions
        )),
    )?;
    info!(user_id = user.id, accounts = removed.accounts, "Bank unlinked");

    Ok(Json(removed))
}
