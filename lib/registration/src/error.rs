//! Error types for registration windows, applications and approvals.

use crate::application::{ApplicationStatus, RegistrationCategory};
use ssfi_core::{ApplicationId, ErrorKind};
use ssfi_membership::IdentifierError;
use ssfi_platform_access::{AuthenticationError, StoreError};
use std::fmt;

/// Errors from the registration crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// Input failed validation.
    Validation { field: &'static str, reason: String },
    /// The category is not accepting submissions right now.
    WindowClosed { category: RegistrationCategory },
    /// A unique constraint was hit (pending application, phone, uid, ...).
    DuplicateEntry { field: String },
    /// A referenced record does not exist.
    NotFound { entity: &'static str, id: String },
    /// The application already reached a terminal status.
    AlreadyDecided {
        id: ApplicationId,
        status: ApplicationStatus,
    },
    /// Identifier scope or formatting failure.
    Identifier(IdentifierError),
    /// Storage failed.
    Storage { details: String },
}

impl RegistrationError {
    /// Returns the client-visible classification.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::WindowClosed { .. } => ErrorKind::Forbidden,
            Self::DuplicateEntry { .. } => ErrorKind::DuplicateEntry,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyDecided { .. } => ErrorKind::Conflict,
            Self::Identifier(inner) => inner.kind(),
            Self::Storage { .. } => ErrorKind::Internal,
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation { field, reason } => write!(f, "invalid {field}: {reason}"),
            Self::WindowClosed { category } => {
                write!(f, "registration for {category} is closed")
            }
            Self::DuplicateEntry { field } => write!(f, "duplicate {field}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::AlreadyDecided { id, status } => {
                write!(f, "application {id} is already {status}")
            }
            Self::Identifier(inner) => write!(f, "{inner}"),
            Self::Storage { details } => write!(f, "registry store error: {details}"),
        }
    }
}

impl std::error::Error for RegistrationError {}

impl From<StoreError> for RegistrationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate { field } => Self::DuplicateEntry { field },
            StoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            StoreError::Unavailable { details } => Self::Storage { details },
        }
    }
}

impl From<IdentifierError> for RegistrationError {
    fn from(err: IdentifierError) -> Self {
        match err {
            IdentifierError::InvalidCode { reason, .. } => Self::Validation {
                field: "scope code",
                reason: reason.to_string(),
            },
            other => Self::Identifier(other),
        }
    }
}

/// Contact validation reuses the identity rules; only their validation
/// failures can reach here.
impl From<AuthenticationError> for RegistrationError {
    fn from(err: AuthenticationError) -> Self {
        match err {
            AuthenticationError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Storage {
                details: other.to_string(),
            },
        }
    }
}
