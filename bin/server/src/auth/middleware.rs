//! Authentication extractors for Axum.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use ssfi_core::{ErrorKind, Role};
use ssfi_platform_access::AuthenticatedIdentity;
use std::sync::Arc;

use super::AppState;
use crate::error::ApiError;

/// Extractor for requiring an authenticated identity.
///
/// Reads `Authorization: Bearer <access token>`, reloads the identity and
/// resolves its scope.
pub struct RequireAuth(pub AuthenticatedIdentity);

impl<S> FromRequestParts<S> for RequireAuth
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = Arc::<AppState>::from_ref(state);
        let token = bearer_token(parts)?;

        let (claims, identity) = app_state.sessions.authenticate(token).await?;
        let scope = app_state.access.resolve_scope(&identity).await?;

        Ok(RequireAuth(AuthenticatedIdentity::new(claims, identity, scope)))
    }
}

/// Extractor for requiring the global administrator.
pub struct RequireAdmin(pub AuthenticatedIdentity);

impl<S> FromRequestParts<S> for RequireAdmin
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireAuth(caller) = RequireAuth::from_request_parts(parts, state).await?;
        caller.require_role(&[Role::GlobalAdmin])?;
        Ok(RequireAdmin(caller))
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| ApiError::new(ErrorKind::Unauthenticated, "missing bearer token"))?;
    header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::new(ErrorKind::Unauthenticated, "malformed authorization header"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/me");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn extracts_bearer_token() {
        let parts = parts(Some("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&parts).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn rejects_missing_and_foreign_schemes() {
        for header in [None, Some("Basic dXNlcjpwYXNz"), Some("Bearer ")] {
            let err = bearer_token(&parts(header)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Unauthenticated);
        }
    }
}
