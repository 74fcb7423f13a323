//! Savings goal handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use super::today;
use crate::{AppError, AppState, AuthUser, SuccessResponse};
use tally_core::models::{Goal, GoalUpdate, NewGoal};
use tally_core::{project_goal, GoalProjection};

/// A goal with its current projection
#[derive(Serialize)]
pub struct GoalView {
    #[serde(flatten)]
    pub goal: Goal,
    pub projection: GoalProjection,
}

impl GoalView {
    fn new(goal: Goal) -> Self {
        let projection = project_goal(&goal, today());
        Self { goal, projection }
    }
}

/// GET /api/goals - List goals with projections
pub async fn list_goals(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<GoalView>>, AppError> {
    let goals = state.db.list_goals(user.id)?;

    state.db.log_audit(
        &user.email,
        "list",
        Some("goal"),
        None,
        Some(&format!("count={}", goals.len())),
    )?;

    Ok(Json(goals.into_iter().map(GoalView::new).collect()))
}

/// POST /api/goals - Create a goal
pub async fn create_goal(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<NewGoal>,
) -> Result<Json<GoalView>, AppError> {
    let goal = state.db.create_goal(user.id, &req)?;

    state.db.log_audit(
        &user.email,
        "create",
        Some("goal"),
        Some(goal.id),
        Some(&goal.name),
    )?;

    Ok(Json(GoalView::new(goal)))
}

fn require_goal(state: &AppState, user: &AuthUser, id: i64) -> Result<Goal, AppError> {
    state
        .db
        .get_goal(user.id, id)?
        .ok_or_else(|| AppError::not_found(&format!("Goal {} not found", id)))
}

/// GET /api/goals/:id - Get a goal
pub async fn get_goal(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<GoalView>, AppError> {
    let goal = require_goal(&state, &user, id)?;

    state
        .db
        .log_audit(&user.email, "get", Some("goal"), Some(id), None)?;

    Ok(Json(GoalView::new(goal)))
}

/// PATCH /api/goals/:id - Update a goal
pub async fn update_goal(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(req): Json<GoalUpdate>,
) -> Result<Json<GoalView>, AppError> {
    let goal = state.db.update_goal(user.id, id, req)?;

    state.db.log_audit(
        &user.email,
        "update",
        Some("goal"),
        Some(id),
        Some(&format!("status={}", goal.status)),
    )?;

    Ok(Json(GoalView::new(goal)))
}

/// DELETE /api/goals/:id - Delete a goal
pub async fn delete_goal(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    if !state.db.delete_goal(user.id, id)? {
        return Err(AppError::not_found(&format!("Goal {} not found", id)));
    }

    state
        .db
        .log_audit(&user.email, "delete", Some("goal"), Some(id), None)?;

    Ok(Json(SuccessResponse { success: true }))
}

/// Request body for a contribution
#[derive(Debug, Deserialize)]
pub struct ContributeRequest {
    pub amount: f64,
}

/// POST /api/goals/:id/contribute - Add money to a goal
pub async fn contribute_to_goal(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(req): Json<ContributeRequest>,
) -> Result<Json<GoalView>, AppError> {
    let goal = state.db.contribute_to_goal(user.id, id, req.amount)?;

    state.db.log_audit(
        &user.email,
        "contribute",
        Some("goal"),
        Some(id),
        Some(&format!("amount={:.2}", req.amount)),
    )?;

    Ok(Json(GoalView::new(goal)))
}

/// GET /api/goals/:id/projection - Projection for one goal
pub async fn get_goal_projection(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<GoalProjection>, AppError> {
    let goal = require_goal(&state, &user, id)?;
    Ok(Json(project_goal(&goal, today())))
}
