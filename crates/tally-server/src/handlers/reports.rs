//! Report handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use super::today;
use crate::{AppError, AppState, AuthUser};
use tally_core::aggregate::{aggregate_by_category, in_month, month_key, parse_month_key, recent_cashflow};
use tally_core::models::{CategoryTotal, MonthlyCashflow, NetWorthReport};
use tally_core::{build_insights, reconstruct_net_worth, InsightsReport};

/// Most months a cashflow report can cover
const MAX_CASHFLOW_MONTHS: u32 = 60;

/// Most categories a breakdown can return
const MAX_TOP_CATEGORIES: usize = 50;

/// Query parameters for the cashflow report
#[derive(Debug, Deserialize)]
pub struct CashflowQuery {
    #[serde(default = "default_months")]
    pub months: u32,
}

fn default_months() -> u32 {
    6
}

/// GET /api/reports/cashflow - Inflow and outflow for the last N months
pub async fn report_cashflow(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<CashflowQuery>,
) -> Result<Json<Vec<MonthlyCashflow>>, AppError> {
    let months = params.months.clamp(1, MAX_CASHFLOW_MONTHS);

    let txs = state.db.all_transactions(user.id)?;
    let report = recent_cashflow(&txs, today(), months, &state.classifier);

    state.db.log_audit(
        &user.email,
        "report",
        Some("cashflow"),
        None,
        Some(&format!("months={}", months)),
    )?;

    Ok(Json(report))
}

/// Query parameters for the category breakdown
#[derive(Debug, Deserialize)]
pub struct CategoryQuery {
    /// Month (YYYY-MM), defaults to the current month
    pub month: Option<String>,
    #[serde(default = "default_top")]
    pub top: usize,
}

fn default_top() -> usize {
    5
}

#[derive(Serialize)]
pub struct CategoryReport {
    pub month: String,
    pub categories: Vec<CategoryTotal>,
}

/// GET /api/reports/categories - Top spending categories for a month
pub async fn report_categories(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<CategoryQuery>,
) -> Result<Json<CategoryReport>, AppError> {
    let month = match params.month.filter(|m| !m.trim().is_empty()) {
        Some(m) => month_key(parse_month_key(m.trim())?),
        None => month_key(today()),
    };
    let top = params.top.min(MAX_TOP_CATEGORIES);

    let txs = state.db.all_transactions(user.id)?;
    let categories = aggregate_by_category(in_month(&txs, &month), top, &state.classifier);

    state.db.log_audit(
        &user.email,
        "report",
        Some("categories"),
        None,
        Some(&format!("month={}, top={}", month, top)),
    )?;

    Ok(Json(CategoryReport { month, categories }))
}

/// GET /api/reports/net-worth - Current net worth and month-end history
pub async fn report_net_worth(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<NetWorthReport>, AppError> {
    let accounts = state.db.list_accounts(user.id)?;
    let txs = state.db.all_transactions(user.id)?;

    let report = reconstruct_net_worth(&accounts, &txs, today(), &state.classifier);

    state.db.log_audit(
        &user.email,
        "report",
        Some("net_worth"),
        None,
        Some(&format!("months={}", report.history.len())),
    )?;

    Ok(Json(report))
}

/// GET /api/insights - This month's figures and tips
pub async fn get_insights(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<InsightsReport>, AppError> {
    let txs = state.db.all_transactions(user.id)?;
    let goals = state.db.list_goals(user.id)?;

    let report = build_insights(&txs, &goals, today(), &state.classifier);

    state.db.log_audit(
        &user.email,
        "report",
        Some("insights"),
        None,
        Some(&format!("tips={}", report.tips.len())),
    )?;

    Ok(Json(report))
}
