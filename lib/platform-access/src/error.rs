//! Error types for the platform-access crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `AuthenticationError`: credential, code, token and lifecycle failures
//! - `AuthorizationError`: role and scope check failures
//! - `StoreError`: what store implementations report back
//! - `DeliveryError`: notification transport failures

use ssfi_core::{ErrorKind, IdentityId, Role};
use std::fmt;

/// Errors from storage backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A unique constraint was violated.
    Duplicate { field: String },
    /// The addressed record does not exist.
    NotFound { entity: &'static str, id: String },
    /// The backend failed; details are for logs only.
    Unavailable { details: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duplicate { field } => write!(f, "duplicate value for {field}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Unavailable { details } => write!(f, "store unavailable: {details}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// A notification could not be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryError {
    pub reason: String,
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "notification delivery failed: {}", self.reason)
    }
}

impl std::error::Error for DeliveryError {}

/// Errors from authentication operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationError {
    /// Input failed validation.
    Validation { field: &'static str, reason: String },
    /// Phone or email already bound to an identity.
    DuplicateEntry { field: String },
    /// No identity matches.
    IdentityNotFound,
    /// Wrong password or one-time code.
    InvalidCredentials,
    /// The one-time code has expired.
    CodeExpired,
    /// The identity is already verified.
    AlreadyVerified,
    /// A code was requested again inside the cooldown.
    RateLimited { retry_after_seconds: i64 },
    /// The identity has been deactivated.
    AccountInactive,
    /// The identity has not completed one-time-code verification.
    NotVerified,
    /// The identity has not been approved by an authority.
    NotApproved,
    /// The membership expiry date has passed.
    MembershipExpired,
    /// A bearer or refresh token failed validation.
    InvalidToken { reason: String },
    /// A bearer or refresh token is past its expiry.
    TokenExpired,
    /// The one-time code could not be delivered.
    DeliveryFailed { reason: String },
    /// Storage failed.
    Storage { details: String },
}

impl AuthenticationError {
    /// Returns the client-visible classification.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::DuplicateEntry { .. } => ErrorKind::DuplicateEntry,
            Self::IdentityNotFound => ErrorKind::NotFound,
            Self::InvalidCredentials => ErrorKind::InvalidCredential,
            Self::CodeExpired | Self::MembershipExpired | Self::TokenExpired => ErrorKind::Expired,
            Self::AlreadyVerified => ErrorKind::Conflict,
            Self::RateLimited { .. } => ErrorKind::RateLimit,
            Self::AccountInactive | Self::NotVerified | Self::NotApproved => ErrorKind::Forbidden,
            Self::InvalidToken { .. } => ErrorKind::Unauthenticated,
            Self::DeliveryFailed { .. } => ErrorKind::Delivery,
            Self::Storage { .. } => ErrorKind::Internal,
        }
    }
}

impl fmt::Display for AuthenticationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation { field, reason } => write!(f, "invalid {field}: {reason}"),
            Self::DuplicateEntry { field } => write!(f, "{field} is already registered"),
            Self::IdentityNotFound => write!(f, "identity not found"),
            Self::InvalidCredentials => write!(f, "invalid credentials"),
            Self::CodeExpired => write!(f, "one-time code has expired"),
            Self::AlreadyVerified => write!(f, "identity is already verified"),
            Self::RateLimited {
                retry_after_seconds,
            } => write!(f, "code requested too soon, retry in {retry_after_seconds}s"),
            Self::AccountInactive => write!(f, "account is inactive"),
            Self::NotVerified => write!(f, "account is not verified"),
            Self::NotApproved => write!(f, "account is awaiting approval"),
            Self::MembershipExpired => write!(f, "membership has expired"),
            Self::InvalidToken { reason } => write!(f, "invalid token: {reason}"),
            Self::TokenExpired => write!(f, "token has expired"),
            Self::DeliveryFailed { reason } => write!(f, "code delivery failed: {reason}"),
            Self::Storage { details } => write!(f, "credential store error: {details}"),
        }
    }
}

impl std::error::Error for AuthenticationError {}

impl From<StoreError> for AuthenticationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate { field } => Self::DuplicateEntry { field },
            StoreError::NotFound { .. } => Self::IdentityNotFound,
            StoreError::Unavailable { details } => Self::Storage { details },
        }
    }
}

impl From<DeliveryError> for AuthenticationError {
    fn from(err: DeliveryError) -> Self {
        Self::DeliveryFailed { reason: err.reason }
    }
}

/// Errors from authorization operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    /// Caller is not authenticated.
    NotAuthenticated,
    /// Caller's role is not on the allow-list.
    RoleNotAllowed { role: Role, allowed: Vec<Role> },
    /// Target lies outside the caller's scope.
    OutOfScope {
        identity_id: IdentityId,
        target: String,
    },
    /// A non-admin identity has no role profile to derive scope from.
    ProfileMissing { identity_id: IdentityId },
    /// Directory or profile lookup failed.
    LookupFailed { details: String },
}

impl AuthorizationError {
    /// Returns the client-visible classification.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotAuthenticated => ErrorKind::Unauthenticated,
            Self::RoleNotAllowed { .. } | Self::OutOfScope { .. } | Self::ProfileMissing { .. } => {
                ErrorKind::Forbidden
            }
            Self::LookupFailed { .. } => ErrorKind::Internal,
        }
    }
}

impl fmt::Display for AuthorizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAuthenticated => write!(f, "caller is not authenticated"),
            Self::RoleNotAllowed { role, allowed } => {
                let allowed: Vec<&str> = allowed.iter().map(Role::as_str).collect();
                write!(f, "role {role} is not one of [{}]", allowed.join(", "))
            }
            Self::OutOfScope {
                identity_id,
                target,
            } => write!(f, "{target} is outside the scope of {identity_id}"),
            Self::ProfileMissing { identity_id } => {
                write!(f, "identity {identity_id} has no role profile")
            }
            Self::LookupFailed { details } => write!(f, "scope lookup failed: {details}"),
        }
    }
}

impl std::error::Error for AuthorizationError {}

impl From<StoreError> for AuthorizationError {
    fn from(err: StoreError) -> Self {
        Self::LookupFailed {
            details: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_gates_are_forbidden() {
        for err in [
            AuthenticationError::AccountInactive,
            AuthenticationError::NotVerified,
            AuthenticationError::NotApproved,
        ] {
            assert_eq!(err.kind(), ErrorKind::Forbidden);
        }
    }

    #[test]
    fn expiry_family_maps_to_expired() {
        assert_eq!(AuthenticationError::CodeExpired.kind(), ErrorKind::Expired);
        assert_eq!(AuthenticationError::MembershipExpired.kind(), ErrorKind::Expired);
        assert_eq!(AuthenticationError::TokenExpired.kind(), ErrorKind::Expired);
    }

    #[test]
    fn store_duplicate_becomes_duplicate_entry() {
        let err: AuthenticationError = StoreError::Duplicate {
            field: "phone".to_string(),
        }
        .into();
        assert_eq!(
            err,
            AuthenticationError::DuplicateEntry {
                field: "phone".to_string()
            }
        );
        assert_eq!(err.kind(), ErrorKind::DuplicateEntry);
    }

    #[test]
    fn storage_details_stay_internal() {
        let err: AuthenticationError = StoreError::Unavailable {
            details: "connection reset".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn role_not_allowed_display_lists_roles() {
        let err = AuthorizationError::RoleNotAllowed {
            role: Role::ClubOwner,
            allowed: vec![Role::GlobalAdmin, Role::StateSecretary],
        };
        let text = err.to_string();
        assert!(text.contains("CLUB_OWNER"));
        assert!(text.contains("GLOBAL_ADMIN, STATE_SECRETARY"));
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[test]
    fn out_of_scope_display() {
        let err = AuthorizationError::OutOfScope {
            identity_id: IdentityId::new(),
            target: "district 9".to_string(),
        };
        assert!(err.to_string().contains("district 9"));
    }
}
