//! Maps domain failures to HTTP responses.
//!
//! Clients only ever see the stable [`ErrorKind`] code and, for expected
//! failures, the domain error's message. Internal faults are logged with
//! their full report and returned as `INTERNAL_ERROR`. The full report text
//! rides along as [`ErrorBody::detail`] only when [`attach_detail`] is
//! layered onto the router, which happens in development.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rootcause::prelude::Report;
use serde::Serialize;
use ssfi_core::{ErrorKind, ParseIdError};
use ssfi_platform_access::{AuthenticationError, AuthorizationError};
use ssfi_registration::RegistrationError;
use std::fmt;

/// Domain errors that classify themselves.
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}

impl Classify for AuthenticationError {
    fn kind(&self) -> ErrorKind {
        AuthenticationError::kind(self)
    }
}

impl Classify for AuthorizationError {
    fn kind(&self) -> ErrorKind {
        AuthorizationError::kind(self)
    }
}

impl Classify for RegistrationError {
    fn kind(&self) -> ErrorKind {
        RegistrationError::kind(self)
    }
}

/// JSON body of every error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Diagnostic text kept out of the body until [`attach_detail`] adds it.
#[derive(Debug, Clone)]
struct ErrorDetail(String);

/// An error on its way to the client.
#[derive(Debug)]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
    detail: String,
}

impl ApiError {
    /// Creates an error whose message is safe to show.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind,
            detail: message.clone(),
            message,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}

impl<E> From<Report<E>> for ApiError
where
    E: Classify + fmt::Display + fmt::Debug + Send + Sync + 'static,
{
    fn from(report: Report<E>) -> Self {
        let context = report.current_context();
        let kind = context.kind();
        let detail = report.to_string();
        if kind.is_expected() {
            tracing::debug!(code = kind.code(), error = %detail, "request rejected");
            Self {
                kind,
                message: context.to_string(),
                detail,
            }
        } else {
            tracing::error!(error = %detail, "request failed");
            Self {
                kind,
                message: "internal error".to_string(),
                detail,
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(ErrorKind::Validation, rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::new(ErrorKind::Validation, rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new(ErrorKind::Validation, rejection.body_text())
    }
}

/// Errors raised at the boundary itself, before any service ran.
impl From<RegistrationError> for ApiError {
    fn from(err: RegistrationError) -> Self {
        let report: Report<RegistrationError> = err.into();
        report.into()
    }
}

impl From<ParseIdError> for ApiError {
    fn from(err: ParseIdError) -> Self {
        Self::new(ErrorKind::Validation, err.to_string())
    }
}

/// HTTP status for each kind.
#[must_use]
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation | ErrorKind::InvalidScope => StatusCode::BAD_REQUEST,
        ErrorKind::DuplicateEntry | ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InvalidCredential | ErrorKind::Expired | ErrorKind::Unauthenticated => {
            StatusCode::UNAUTHORIZED
        }
        ErrorKind::RateLimit => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::Delivery => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.kind.code(),
            message: self.message,
            detail: None,
        };
        let mut response = (status_for(self.kind), Json(body.clone())).into_response();
        response.extensions_mut().insert(body);
        response.extensions_mut().insert(ErrorDetail(self.detail));
        response
    }
}

/// Re-renders error responses with their diagnostic detail.
pub async fn attach_detail(mut response: Response) -> Response {
    let detail = response.extensions_mut().remove::<ErrorDetail>();
    let body = response.extensions_mut().remove::<ErrorBody>();
    match (body, detail) {
        (Some(mut body), Some(ErrorDetail(detail))) => {
            body.detail = Some(detail);
            let status = response.status();
            (status, Json(body)).into_response()
        }
        _ => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn expected_errors_keep_their_message() {
        let report: Report<RegistrationError> = RegistrationError::Validation {
            field: "phone",
            reason: "must be 10-15 digits".to_string(),
        }
        .into();
        let response = ApiError::from(report).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_of(response).await;
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert!(body["message"].as_str().unwrap().contains("phone"));
        assert!(body.get("detail").is_none());
    }

    #[tokio::test]
    async fn internal_errors_hide_storage_text() {
        let report: Report<RegistrationError> = RegistrationError::Storage {
            details: "relation \"applications\" does not exist".to_string(),
        }
        .into();
        let response = ApiError::from(report).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_of(response).await;
        assert_eq!(body["code"], "INTERNAL_ERROR");
        assert_eq!(body["message"], "internal error");
        assert!(!body.to_string().contains("relation"));
    }

    #[tokio::test]
    async fn development_layer_attaches_detail() {
        let report: Report<RegistrationError> = RegistrationError::Storage {
            details: "connection reset".to_string(),
        }
        .into();
        let response = attach_detail(ApiError::from(report).into_response()).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_of(response).await;
        assert!(body["detail"].as_str().unwrap().contains("connection reset"));
    }

    #[test]
    fn statuses_are_stable() {
        assert_eq!(status_for(ErrorKind::RateLimit), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(status_for(ErrorKind::Forbidden), StatusCode::FORBIDDEN);
        assert_eq!(status_for(ErrorKind::DuplicateEntry), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorKind::Unauthenticated), StatusCode::UNAUTHORIZED);
    }
}
