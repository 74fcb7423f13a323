//! Export handlers

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, Response, StatusCode},
    Extension,
};
use serde::Deserialize;
use tracing::info;

use crate::{AppError, AppState, AuthUser};
use tally_core::aggregate::{month_key, parse_month_key};
use tally_core::export::transactions_to_csv_string;

/// Query parameters for transaction export
#[derive(Debug, Deserialize)]
pub struct TransactionExportQuery {
    /// Output format (default: csv)
    #[serde(default = "default_format")]
    pub format: String,
    /// Only this month (YYYY-MM)
    pub month: Option<String>,
}

fn default_format() -> String {
    "csv".to_string()
}

/// GET /api/export/transactions - Export transactions to CSV or JSON
pub async fn export_transactions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<TransactionExportQuery>,
) -> Result<Response<Body>, AppError> {
    let month = params
        .month
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(|m| parse_month_key(m).map(month_key))
        .transpose()?;

    let mut txs = state.db.all_transactions(user.id)?;
    if let Some(month) = &month {
        txs.retain(|t| &month_key(t.date) == month);
    }

    // Audit log
    state.db.log_audit(
        &user.email,
        "export_transactions",
        Some("transaction"),
        None,
        Some(&format!(
            "format={}, month={:?}, count={}",
            params.format,
            month,
            txs.len()
        )),
    )?;

    match params.format.as_str() {
        "csv" => {
            let csv = transactions_to_csv_string(&txs, &state.classifier)?;
            info!("Exported {} transactions to CSV", txs.len());

            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/csv; charset=utf-8")
                .header(
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"transactions.csv\"",
                )
                .body(Body::from(csv))
                .map_err(|e| AppError::internal(&e.to_string()))
        }
        "json" => {
            let json = serde_json::to_string_pretty(&txs)
                .map_err(|e| AppError::internal(&e.to_string()))?;
            info!("Exported {} transactions to JSON", txs.len());

            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "application/json")
                .header(
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"transactions.json\"",
                )
                .body(Body::from(json))
                .map_err(|e| AppError::internal(&e.to_string()))
        }
        _ => Err(AppError::bad_request("Invalid format. Use 'csv' or 'json'")),
    }
}
