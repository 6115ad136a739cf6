//! Authentication routes: registration, codes, login, refresh, logout and
//! password management.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::{
    WithRejection,
    cookie::{Cookie, CookieJar, SameSite},
};
use serde::Deserialize;
use ssfi_core::ErrorKind;
use ssfi_platform_access::{AccessToken, CodeReceipt, Registration, TokenPair};
use std::fmt;
use std::sync::Arc;
use time::Duration as TimeDuration;

use super::{AppState, RequireAuth};
use crate::error::ApiError;

/// Refresh cookie name.
pub const REFRESH_COOKIE: &str = "refresh_token";

/// The refresh cookie is only sent to the auth routes.
const REFRESH_COOKIE_PATH: &str = "/auth";

type JsonBody<T> = WithRejection<Json<T>, ApiError>;

#[derive(Debug, Deserialize)]
pub struct PhoneRequest {
    phone: String,
}

#[derive(Deserialize)]
pub struct CodeRequest {
    phone: String,
    code: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    phone: String,
    password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("phone", &self.phone)
            .finish_non_exhaustive()
    }
}

#[derive(Default, Deserialize)]
pub struct RefreshRequest {
    refresh_token: Option<String>,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    current_password: String,
    new_password: String,
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    phone: String,
    code: String,
    new_password: String,
}

/// Creates an unverified identity and texts it a code.
pub async fn register(
    State(state): State<Arc<AppState>>,
    WithRejection(Json(request), _): JsonBody<Registration>,
) -> Result<(StatusCode, Json<CodeReceipt>), ApiError> {
    let receipt = state.sessions.register(request).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// Confirms phone ownership.
pub async fn verify(
    State(state): State<Arc<AppState>>,
    WithRejection(Json(request), _): JsonBody<CodeRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .sessions
        .verify_code(&request.phone, &request.code)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Issues a fresh verification code, subject to the cooldown.
pub async fn resend(
    State(state): State<Arc<AppState>>,
    WithRejection(Json(request), _): JsonBody<PhoneRequest>,
) -> Result<Json<CodeReceipt>, ApiError> {
    Ok(Json(state.sessions.resend_code(&request.phone).await?))
}

/// Returns the token pair and sets the refresh token as an HttpOnly cookie.
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    WithRejection(Json(request), _): JsonBody<LoginRequest>,
) -> Result<(CookieJar, Json<TokenPair>), ApiError> {
    let tokens = state
        .sessions
        .login(&request.phone, &request.password)
        .await?;

    let cookie = Cookie::build((REFRESH_COOKIE, tokens.refresh_token.clone()))
        .path(REFRESH_COOKIE_PATH)
        .http_only(true)
        .secure(state.secure_cookies)
        .same_site(SameSite::Strict)
        .max_age(TimeDuration::seconds(state.refresh_ttl.num_seconds()));

    Ok((jar.add(cookie), Json(tokens)))
}

/// Mints a new access token from the body's refresh token or the cookie.
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    body: Option<Json<RefreshRequest>>,
) -> Result<Json<AccessToken>, ApiError> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let token = request
        .refresh_token
        .or_else(|| jar.get(REFRESH_COOKIE).map(|c| c.value().to_string()))
        .ok_or_else(|| ApiError::new(ErrorKind::Unauthenticated, "missing refresh token"))?;
    Ok(Json(state.sessions.refresh(&token).await?))
}

/// Revokes the caller's refresh token and clears the cookie.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    RequireAuth(caller): RequireAuth,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    state.sessions.logout(caller.id()).await?;

    let remove_refresh = Cookie::build((REFRESH_COOKIE, ""))
        .path(REFRESH_COOKIE_PATH)
        .max_age(TimeDuration::ZERO);

    Ok((jar.add(remove_refresh), StatusCode::NO_CONTENT))
}

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    RequireAuth(caller): RequireAuth,
    WithRejection(Json(request), _): JsonBody<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .sessions
        .change_password(caller.id(), &request.current_password, &request.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    WithRejection(Json(request), _): JsonBody<PhoneRequest>,
) -> Result<Json<CodeReceipt>, ApiError> {
    Ok(Json(
        state.sessions.request_password_reset(&request.phone).await?,
    ))
}

pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    WithRejection(Json(request), _): JsonBody<ResetPasswordRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .sessions
        .reset_password(&request.phone, &request.code, &request.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
