//! Caller introspection.

use axum::{
    Json,
    extract::{Path, State},
};
use axum_extra::extract::WithRejection;
use serde::Serialize;
use ssfi_core::ErrorKind;
use ssfi_platform_access::{CallerScope, Identity, LifecycleState, ScopeTarget};
use std::sync::Arc;

use crate::auth::{AppState, RequireAuth};
use crate::error::ApiError;

#[derive(Serialize)]
pub struct CallerSummary {
    identity: Identity,
    lifecycle: LifecycleState,
    scope: CallerScope,
}

/// The caller's identity and resolved scope.
pub async fn me(RequireAuth(caller): RequireAuth) -> Json<CallerSummary> {
    Json(CallerSummary {
        lifecycle: caller.identity().lifecycle(),
        scope: caller.scope().clone(),
        identity: caller.identity().clone(),
    })
}

#[derive(Serialize)]
pub struct ScopeCheck {
    target: ScopeTarget,
    allowed: bool,
}

/// Succeeds when the node `{kind}/{id}` is inside the caller's scope.
pub async fn check_scope(
    State(state): State<Arc<AppState>>,
    RequireAuth(caller): RequireAuth,
    WithRejection(Path((kind, id)), _): WithRejection<Path<(String, i64)>, ApiError>,
) -> Result<Json<ScopeCheck>, ApiError> {
    let target = ScopeTarget::from_parts(&kind, id).ok_or_else(|| {
        ApiError::new(
            ErrorKind::Validation,
            format!("unknown hierarchy level {kind}"),
        )
    })?;
    state
        .access
        .require_own_scope(caller.identity(), caller.scope(), target)
        .await?;
    Ok(Json(ScopeCheck {
        target,
        allowed: true,
    }))
}
