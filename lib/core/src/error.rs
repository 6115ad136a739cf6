//! Error handling foundation for the registry.
//!
//! This module provides the `Result` type alias using rootcause and the
//! [`ErrorKind`] taxonomy every domain error maps into. Each crate defines
//! its own error enums; the HTTP boundary only ever looks at the kind.

use rootcause::Report;
use serde::Serialize;
use std::fmt;

/// A Result type alias using rootcause's Report for error handling.
///
/// Each layer adds its own context as errors propagate.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;

/// Client-visible classification of a failure.
///
/// Stable across releases: clients switch on [`ErrorKind::code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Malformed or out-of-range input.
    Validation,
    /// Unique constraint violated (phone, email, identifier).
    DuplicateEntry,
    /// Referenced entity is absent.
    NotFound,
    /// Bad password or one-time code.
    InvalidCredential,
    /// One-time code, token, or membership past its validity window.
    Expired,
    /// Request repeated too soon.
    RateLimit,
    /// Role or scope check failed.
    Forbidden,
    /// Required hierarchy components missing for a role.
    InvalidScope,
    /// Operation conflicts with current state (already verified, terminal status).
    Conflict,
    /// No usable credentials were presented.
    Unauthenticated,
    /// Outbound notification failed; the caller may retry.
    Delivery,
    /// Anything unexpected.
    Internal,
}

impl ErrorKind {
    /// Returns the machine-readable code sent to clients.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::DuplicateEntry => "DUPLICATE_ENTRY",
            Self::NotFound => "NOT_FOUND",
            Self::InvalidCredential => "INVALID_CREDENTIAL",
            Self::Expired => "EXPIRED",
            Self::RateLimit => "RATE_LIMITED",
            Self::Forbidden => "FORBIDDEN",
            Self::InvalidScope => "INVALID_SCOPE",
            Self::Conflict => "CONFLICT",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Delivery => "DELIVERY_FAILED",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    /// Returns true for kinds the caller caused and may correct.
    #[must_use]
    pub const fn is_expected(&self) -> bool {
        !matches!(self, Self::Internal)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_type_works() {
        let ok: Result<i32> = Ok(42);
        assert_eq!(ok.expect("should be ok"), 42);
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(ErrorKind::Validation.code(), "VALIDATION_ERROR");
        assert_eq!(ErrorKind::RateLimit.code(), "RATE_LIMITED");
        assert_eq!(ErrorKind::Internal.to_string(), "INTERNAL_ERROR");
    }

    #[test]
    fn internal_is_not_expected() {
        assert!(ErrorKind::Forbidden.is_expected());
        assert!(!ErrorKind::Internal.is_expected());
    }

    #[test]
    fn serializes_as_screaming_snake_case() {
        let json = serde_json::to_string(&ErrorKind::DuplicateEntry).expect("serialize");
        assert_eq!(json, "\"DUPLICATE_ENTRY\"");
    }
}
