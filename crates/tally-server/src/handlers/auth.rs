//! Authentication-related handlers

use std::sync::Arc;

use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{AppError, AppState, AuthUser};
use tally_core::models::User;

/// Request body for register and login
#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub pin: String,
}

/// Session issued on register or login
#[derive(Serialize)]
pub struct SessionResponse {
    /// Bearer token; absent when the server runs without authentication
    pub token: Option<String>,
    pub user: User,
}

fn issue_session(state: &AppState, user: User) -> Result<SessionResponse, AppError> {
    let token = match &state.signer {
        Some(signer) => Some(signer.issue(&user, chrono::Utc::now())?),
        None if state.config.require_auth => {
            return Err(AppError::internal("Session signing is not configured"))
        }
        None => None,
    };
    Ok(SessionResponse { token, user })
}

/// POST /api/auth/register - Create a user and start a session
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let user = state.db.create_user(&req.email, &req.pin)?;

    state
        .db
        .log_audit(&user.email, "register", Some("user"), Some(user.id), None)?;
    info!(user_id = user.id, "User registered");

    Ok(Json(issue_session(&state, user)?))
}

/// POST /api/auth/login - Verify a PIN and start a session
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let user = state.db.authenticate(&req.email, &req.pin)?;

    state
        .db
        .log_audit(&user.email, "login", Some("user"), Some(user.id), None)?;

    Ok(Json(issue_session(&state, user)?))
}

/// GET /api/auth/me - Get the currently authenticated user
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<User>, AppError> {
    let user = state
        .db
        .get_user(user.id)?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    Ok(Json(user))
}
