//! Registration window management.
//!
//! Creating, editing, deleting and listing windows is reserved for the
//! global admin. Whether a category is open is public.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use ssfi_core::WindowId;
use ssfi_registration::{NewWindow, RegistrationCategory, RegistrationWindow, WindowUpdate};
use std::sync::Arc;

use super::JsonBody;
use crate::auth::{AppState, RequireAdmin};
use crate::error::ApiError;

type PathKey = WithRejection<Path<String>, ApiError>;

#[derive(Deserialize)]
pub struct ListQuery {
    category: String,
}

/// Whether a category accepts submissions, and through which window.
#[derive(Serialize)]
pub struct OpenStatus {
    category: RegistrationCategory,
    open: bool,
    window: Option<RegistrationWindow>,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    RequireAdmin(caller): RequireAdmin,
    WithRejection(Json(request), _): JsonBody<NewWindow>,
) -> Result<(StatusCode, Json<RegistrationWindow>), ApiError> {
    let window = state.gate.create(request, caller.id()).await?;
    Ok((StatusCode::CREATED, Json(window)))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    RequireAdmin(_): RequireAdmin,
    WithRejection(Path(key), _): PathKey,
    WithRejection(Json(update), _): JsonBody<WindowUpdate>,
) -> Result<Json<RegistrationWindow>, ApiError> {
    let id: WindowId = key.parse()?;
    Ok(Json(state.gate.update(id, update).await?))
}

/// Soft-deletes a window; it stops counting towards openness at once.
pub async fn delete(
    State(state): State<Arc<AppState>>,
    RequireAdmin(caller): RequireAdmin,
    WithRejection(Path(key), _): PathKey,
) -> Result<Json<RegistrationWindow>, ApiError> {
    let id: WindowId = key.parse()?;
    Ok(Json(state.gate.delete(id, caller.id()).await?))
}

pub async fn open(
    State(state): State<Arc<AppState>>,
    WithRejection(Path(key), _): PathKey,
) -> Result<Json<OpenStatus>, ApiError> {
    let category: RegistrationCategory = key.parse()?;
    let window = state.gate.open_window(category).await?;
    Ok(Json(OpenStatus {
        category,
        open: window.is_some(),
        window,
    }))
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    RequireAdmin(_): RequireAdmin,
    WithRejection(Query(query), _): WithRejection<Query<ListQuery>, ApiError>,
) -> Result<Json<Vec<RegistrationWindow>>, ApiError> {
    let category: RegistrationCategory = query.category.parse()?;
    Ok(Json(state.gate.list(category).await?))
}
