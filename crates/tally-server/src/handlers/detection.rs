//! Anomaly and recurring-charge detection handlers

use std::sync::Arc;

use axum::{extract::State, Extension, Json};
use serde::Serialize;
use tracing::info;

use crate::{AppError, AppState, AuthUser};
use tally_core::models::Transaction;

/// Number of flags a detection run changed
#[derive(Serialize)]
pub struct DetectionResponse {
    pub changed: usize,
}

/// GET /api/anomalies - Transactions currently flagged anomalous
pub async fn list_anomalies(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    let anomalies = state.db.list_anomalies(user.id)?;

    state.db.log_audit(
        &user.email,
        "list",
        Some("anomaly"),
        None,
        Some(&format!("count={}", anomalies.len())),
    )?;

    Ok(Json(anomalies))
}

/// POST /api/anomalies/detect - Recompute anomaly flags
pub async fn detect_anomalies(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<DetectionResponse>, AppError> {
    let changed = state.db.detect_anomalies(user.id)?;

    state.db.log_audit(
        &user.email,
        "detect",
        Some("anomaly"),
        None,
        Some(&format!("changed={}", changed)),
    )?;
    info!(user_id = user.id, changed, "Anomaly detection requested");

    Ok(Json(DetectionResponse { changed }))
}

/// POST /api/recurring/detect - Recompute recurring flags
pub async fn detect_recurring(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<DetectionResponse>, AppError> {
    let changed = state.db.detect_recurring(user.id, &state.classifier)?;

    state.db.log_audit(
        &user.email,
        "detect",
        Some("recurring"),
        None,
        Some(&format!("changed={}", changed)),
    )?;
    info!(user_id = user.id, changed, "Recurring detection requested");

    Ok(Json(DetectionResponse { changed }))
}
