//! Application submission and review.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use axum_extra::extract::WithRejection;
use ssfi_core::{ApplicationId, Role};
use ssfi_registration::{ApplicationRecord, ApprovalOutcome, Decision, Submission};
use std::sync::Arc;

use super::JsonBody;
use crate::auth::{AppState, RequireAuth};
use crate::error::ApiError;

/// Roles that may read applications inside their scope.
const REVIEWERS: &[Role] = &[
    Role::GlobalAdmin,
    Role::StateSecretary,
    Role::DistrictSecretary,
];

type PathKey = WithRejection<Path<String>, ApiError>;

/// Public submission; only accepted while the category's window is open.
pub async fn submit(
    State(state): State<Arc<AppState>>,
    WithRejection(Json(submission), _): JsonBody<Submission>,
) -> Result<(StatusCode, Json<ApplicationRecord>), ApiError> {
    let record = state.applications.submit(submission).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    RequireAuth(caller): RequireAuth,
    WithRejection(Path(key), _): PathKey,
) -> Result<Json<ApplicationRecord>, ApiError> {
    let id: ApplicationId = key.parse()?;
    caller.require_role(REVIEWERS)?;
    let record = state.applications.get(id).await?;
    state
        .access
        .require_own_scope(caller.identity(), caller.scope(), record.target())
        .await?;
    Ok(Json(record))
}

/// Approves or rejects a pending application.
pub async fn transition(
    State(state): State<Arc<AppState>>,
    RequireAuth(caller): RequireAuth,
    WithRejection(Path(key), _): PathKey,
    WithRejection(Json(decision), _): JsonBody<Decision>,
) -> Result<Json<ApprovalOutcome>, ApiError> {
    let id: ApplicationId = key.parse()?;
    caller.require_role(&[Role::GlobalAdmin])?;
    let record = state.applications.get(id).await?;
    state
        .access
        .require_own_scope(caller.identity(), caller.scope(), record.target())
        .await?;
    Ok(Json(
        state.approvals.transition(id, decision, caller.id()).await?,
    ))
}
